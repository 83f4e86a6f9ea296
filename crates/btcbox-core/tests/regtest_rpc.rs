use std::env;
use std::sync::Once;
use std::time::Duration;

use bitcoin::hex::DisplayHex;
use btcbox_core::events::HandlerError;
use btcbox_core::parser::{BlockParser, UnspentParser};
use btcbox_core::{EventSubscriber, NodeClient, ReplyMode, RpcConfig, Topic, TopicHandlers};
use bytes::Bytes;
use serde_json::json;
use tokio::sync::mpsc;

static TRACING_INIT: Once = Once::new();

fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("btcbox_core=debug")),
            )
            .with_target(true)
            .try_init();
    });
}

fn regtest_config() -> RpcConfig {
    let host = env::var("BTCBOX_TEST_RPC_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let port = env::var("BTCBOX_TEST_RPC_PORT")
        .expect("BTCBOX_TEST_RPC_PORT must be set")
        .parse()
        .expect("BTCBOX_TEST_RPC_PORT must be a port number");
    let user = env::var("BTCBOX_TEST_RPC_USER").expect("BTCBOX_TEST_RPC_USER must be set");
    let pass = env::var("BTCBOX_TEST_RPC_PASS").expect("BTCBOX_TEST_RPC_PASS must be set");
    RpcConfig::new(host, Some(port)).with_credentials(user, pass)
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires local regtest bitcoind with a loaded wallet"]
async fn regtest_client_reads_chain_and_wallet() {
    init_tracing();

    let client = NodeClient::new(&regtest_config()).expect("client must construct");
    assert!(client.test_connection().await, "regtest node must answer");

    let address = client
        .get_new_address(ReplyMode::ResultOnly)
        .await
        .expect("getnewaddress must complete")
        .into_result();
    let address = address.as_str().expect("address must be a string").to_owned();

    eprintln!("[itest] mining 101 blocks to {address}");
    client
        .call(
            "generatetoaddress",
            vec![json!(101), json!(address)],
            ReplyMode::ResultOnly,
        )
        .await
        .expect("generatetoaddress must complete");

    let count = client
        .get_block_count(ReplyMode::ResultOnly)
        .await
        .expect("getblockcount must complete")
        .into_result()
        .as_u64()
        .expect("block count must be a number");
    assert!(count >= 101);

    let heights: Vec<u64> = (0..=count).collect();
    let hashes = client
        .get_block_hash_batch(&heights, ReplyMode::WithError)
        .await;
    assert_eq!(hashes.len(), heights.len(), "one hash per height");
    assert!(hashes.iter().all(|reply| reply.error().is_none()));

    let hash_strings: Vec<String> = hashes
        .iter()
        .map(|reply| reply.result().as_str().expect("hash string").to_owned())
        .collect();
    let blocks = client
        .get_block_batch(&hash_strings[hash_strings.len() - 3..], ReplyMode::ResultOnly)
        .await;
    assert_eq!(blocks.len(), 3);

    let tip = client
        .get_block_by_height(count, ReplyMode::ResultOnly)
        .await
        .expect("tip block must be fetched")
        .into_result();
    let parser = BlockParser::new(tip).expect("tip must be a verbosity 2 block");
    assert_eq!(parser.height().expect("height"), count);
    assert_eq!(parser.coinbase_addresses(), vec![address.clone()]);

    let unspent = client
        .list_unspent(&[address.clone()], 1, 999_999, ReplyMode::ResultOnly)
        .await
        .expect("listunspent must complete")
        .into_result();
    let (addresses, amounts) = UnspentParser::new(unspent)
        .expect("listunspent must return an array")
        .addresses_and_amounts()
        .expect("unspent entries must parse");
    assert_eq!(addresses, vec![address]);
    assert!(amounts[0].to_sat() > 0);

    let missing = client
        .get_transaction(&"00".repeat(32), ReplyMode::WithError)
        .await
        .expect("gettransaction must complete");
    assert!(missing.error().is_some(), "unknown txid must carry an RPC error");

    client.close().await;
    assert_eq!(client.get_block_count(ReplyMode::ResultOnly).await, None);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires local regtest bitcoind with -zmqpubhashblock"]
async fn regtest_subscriber_receives_hashblock() {
    init_tracing();

    let endpoint =
        env::var("BTCBOX_TEST_ZMQ_ENDPOINT").expect("BTCBOX_TEST_ZMQ_ENDPOINT must be set");
    let client = NodeClient::new(&regtest_config()).expect("client must construct");

    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    let handlers = TopicHandlers::new().on(Topic::HashBlock, move |body: Bytes| {
        let tx = tx.clone();
        async move {
            tx.send(body)?;
            Ok::<(), HandlerError>(())
        }
    });
    let handle = EventSubscriber::connect(&endpoint, handlers)
        .await
        .expect("subscriber must connect")
        .start();

    // Give the SUB socket time to finish its subscription handshake.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let address = client
        .get_new_address(ReplyMode::ResultOnly)
        .await
        .expect("getnewaddress must complete")
        .into_result();
    let mined = client
        .call(
            "generatetoaddress",
            vec![json!(1), address],
            ReplyMode::ResultOnly,
        )
        .await
        .expect("generatetoaddress must complete")
        .into_result();
    let mined_hash = mined[0].as_str().expect("block hash").to_owned();

    let body = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("hashblock event must arrive")
        .expect("handler channel must stay open");
    assert_eq!(body.as_hex().to_string(), mined_hash);

    handle.shutdown().await.expect("subscriber must stop cleanly");
}
