mod cli;

use std::future::{ready, Ready};

use bitcoin::hex::DisplayHex;
use bitcoin::{Block, Transaction};
use btcbox_core::events::{HandlerError, SequenceEvent};
use btcbox_core::{EventSubscriber, NodeClient, ReplyMode, RpcConfig, Topic, TopicHandlers};
use bytes::Bytes;
use clap::Parser;
use eyre::{eyre, WrapErr};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let config = RpcConfig {
        scheme: args.rpc_scheme,
        host: args.rpc_host,
        port: args.rpc_port,
        user: args.rpc_user,
        password: args.rpc_pass,
        cookie_file: args.rpc_cookie_file,
        requests_per_second: args.rpc_rps,
        chunk_size: args.chunk_size,
        ..RpcConfig::default()
    };

    match args.command {
        Command::Ping => {
            let client = NodeClient::new(&config).wrap_err("build RPC client")?;
            ping(&client).await
        }
        Command::Call { method, params } => {
            let client = NodeClient::new(&config).wrap_err("build RPC client")?;
            call(&client, &method, &params).await
        }
        Command::BlockHashes { from, to } => {
            let client = NodeClient::new(&config).wrap_err("build RPC client")?;
            block_hashes(&client, from, to).await
        }
        Command::Listen {
            zmq_host,
            zmq_port,
            topics,
        } => listen(&format!("tcp://{zmq_host}:{zmq_port}"), &topics).await,
    }
}

// ==============================================================================
// RPC Commands
// ==============================================================================

async fn ping(client: &NodeClient) -> eyre::Result<()> {
    let endpoint = client.dispatcher().transport().endpoint().to_owned();
    let blocks = client
        .dispatcher()
        .execute_single("getblockcount", Vec::new())
        .await
        .and_then(|envelope| envelope.into_result())
        .map_err(|err| eyre!(format_rpc_connect_error(&endpoint, &err.to_string())))
        .wrap_err("while attempting to reach the node RPC")?;

    tracing::info!(endpoint = %endpoint, %blocks, "node is reachable");
    println!("{blocks}");
    client.close().await;
    Ok(())
}

async fn call(client: &NodeClient, method: &str, raw_params: &[String]) -> eyre::Result<()> {
    let params = raw_params.iter().map(|raw| parse_param(raw)).collect();
    let reply = client
        .call(method, params, ReplyMode::WithError)
        .await
        .ok_or_else(|| eyre!("no reply for `{method}`; the request did not complete"))?;
    client.close().await;

    if let Some(error) = reply.error() {
        return Err(eyre!("node returned an error for `{method}`: {error}"));
    }
    println!(
        "{}",
        serde_json::to_string_pretty(reply.result()).wrap_err("format reply")?
    );
    Ok(())
}

/// Parse a command-line parameter as JSON, treating anything that is not
/// valid JSON as a string.
fn parse_param(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_owned()))
}

async fn block_hashes(client: &NodeClient, from: u64, to: u64) -> eyre::Result<()> {
    if from > to {
        return Err(eyre!("--from ({from}) must not exceed --to ({to})"));
    }
    if !client.test_connection().await {
        tracing::warn!("connection probe failed, trying anyway");
    }

    let heights: Vec<u64> = (from..=to).collect();
    let replies = client
        .get_block_hash_batch(&heights, ReplyMode::WithError)
        .await;
    client.close().await;
    if replies.is_empty() {
        return Err(eyre!("batch request for {} block hashes failed", heights.len()));
    }

    for (height, reply) in heights.iter().zip(&replies) {
        match reply.error() {
            Some(error) => tracing::warn!(height, %error, "no block hash"),
            None => println!("{height} {}", reply.result().as_str().unwrap_or("null")),
        }
    }
    Ok(())
}

fn format_rpc_connect_error(endpoint: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("could not reach RPC endpoint `{endpoint}`"),
        format!("RPC error: {source_error}"),
    ];

    if source_error.contains("dns error") {
        lines.push("hint: hostname resolution failed; verify --rpc-host".into());
    } else if source_error.contains("Connection refused") || source_error.contains("tcp connect") {
        lines.push("hint: nothing is listening; verify --rpc-port and that the node runs with -server".into());
    } else if source_error.contains("401") || source_error.contains("403") {
        lines.push(
            "hint: authentication failed; verify --rpc-user/--rpc-pass or --rpc-cookie-file".into(),
        );
    } else if source_error.contains("wallet") {
        lines.push("hint: the node has no wallet loaded".into());
    }

    lines.join("\n")
}

// ==============================================================================
// Event Listener
// ==============================================================================

async fn listen(endpoint: &str, topics: &[Topic]) -> eyre::Result<()> {
    let mut handlers = TopicHandlers::new();
    for &topic in topics {
        handlers = match topic {
            Topic::HashBlock | Topic::HashTx => handlers.on(topic, hash_logger(topic)),
            Topic::RawBlock => handlers.on(topic, log_raw_block),
            Topic::RawTx => handlers.on(topic, log_raw_tx),
            Topic::Sequence => handlers.on(topic, log_sequence),
        };
    }

    let subscriber = EventSubscriber::connect(endpoint, handlers)
        .await
        .wrap_err_with(|| format!("subscribe to events at `{endpoint}`"))?;
    tracing::info!(endpoint, "listening for events; press Ctrl-C to stop");

    let handle = subscriber.start();
    let stop = handle.stop_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupt received, stopping"),
            Err(err) => tracing::error!(error = %err, "cannot listen for Ctrl-C, stopping"),
        }
        stop.cancel();
    });

    handle.join().await.wrap_err("event subscriber failed")?;
    Ok(())
}

fn hash_logger(topic: Topic) -> impl Fn(Bytes) -> Ready<Result<(), HandlerError>> + Send + Sync {
    move |body: Bytes| {
        tracing::info!(%topic, hash = %body.as_hex(), "new hash");
        ready(Ok(()))
    }
}

async fn log_raw_block(body: Bytes) -> Result<(), HandlerError> {
    let block: Block = bitcoin::consensus::deserialize(&body)?;
    tracing::info!(
        hash = %block.block_hash(),
        txs = block.txdata.len(),
        "new block"
    );
    Ok(())
}

async fn log_raw_tx(body: Bytes) -> Result<(), HandlerError> {
    let tx: Transaction = bitcoin::consensus::deserialize(&body)?;
    tracing::info!(
        txid = %tx.compute_txid(),
        inputs = tx.input.len(),
        outputs = tx.output.len(),
        vsize = tx.vsize(),
        "new transaction"
    );
    Ok(())
}

async fn log_sequence(body: Bytes) -> Result<(), HandlerError> {
    match SequenceEvent::parse(&body)? {
        SequenceEvent::BlockConnected(hash) => tracing::info!(%hash, "block connected"),
        SequenceEvent::BlockDisconnected(hash) => tracing::info!(%hash, "block disconnected"),
        SequenceEvent::TxAdded {
            txid,
            mempool_sequence,
        } => tracing::info!(%txid, mempool_sequence, "mempool add"),
        SequenceEvent::TxRemoved {
            txid,
            mempool_sequence,
        } => tracing::info!(%txid, mempool_sequence, "mempool remove"),
    }
    Ok(())
}
