//! Domain-level node client.
//!
//! [`NodeClient`] maps wallet and chain RPC methods onto the
//! [`BatchDispatcher`]. Every method takes a [`ReplyMode`]; single calls
//! return `None` when the exchange itself failed (outcome unknown) and batch
//! calls return an empty list in that case.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bitcoin::Amount;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::RpcConfig;
use crate::error::CoreError;
use crate::parser::UtxoRef;
use crate::rpc::{
    normalize_batch, normalize_single, BatchDispatcher, HttpTransport, Reply, ReplyMode,
    RpcTransport,
};

/// `getblock` verbosity returning fully decoded transactions.
const BLOCK_VERBOSITY: u8 = 2;

pub const DEFAULT_MIN_CONF: u32 = 1;
pub const DEFAULT_MAX_CONF: u32 = 999_999;

/// RPC used to probe reachability. Works on every node, wallet or not.
const PROBE_METHOD: &str = "getblockcount";

pub struct NodeClient {
    dispatcher: BatchDispatcher,
    connected: AtomicBool,
}

impl NodeClient {
    /// Create a client talking HTTP to the endpoint in `config`. No network
    /// traffic happens until the first call.
    pub fn new(config: &RpcConfig) -> Result<Self, CoreError> {
        let transport = HttpTransport::new(config)?;
        let mut dispatcher =
            BatchDispatcher::new(Arc::new(transport)).with_chunk_size(config.chunk_size)?;
        if let Some(limit) = config.requests_per_second {
            dispatcher = dispatcher.with_rate_limit(limit)?;
        }
        Ok(Self::from_dispatcher(dispatcher))
    }

    /// Create a client over any transport.
    pub fn with_transport(
        transport: Arc<dyn RpcTransport>,
        chunk_size: usize,
    ) -> Result<Self, CoreError> {
        let dispatcher = BatchDispatcher::new(transport).with_chunk_size(chunk_size)?;
        Ok(Self::from_dispatcher(dispatcher))
    }

    fn from_dispatcher(dispatcher: BatchDispatcher) -> Self {
        Self {
            dispatcher,
            connected: AtomicBool::new(false),
        }
    }

    pub fn dispatcher(&self) -> &BatchDispatcher {
        &self.dispatcher
    }

    // ==========================================================================
    // Connection
    // ==========================================================================

    /// Probe the node and record whether it answered. Never fails; the
    /// flag is advisory and does not gate other calls.
    pub async fn test_connection(&self) -> bool {
        let endpoint = self.dispatcher.transport().endpoint();
        let connected = match self.dispatcher.execute_single(PROBE_METHOD, Vec::new()).await {
            Ok(_) => {
                debug!(endpoint, "connected to node");
                true
            }
            Err(err) => {
                warn!(endpoint, error = %err, "can't connect to node");
                false
            }
        };
        self.connected.store(connected, Ordering::Relaxed);
        connected
    }

    /// Result of the last [`test_connection`](Self::test_connection).
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Release the HTTP session. Later calls report an unknown outcome.
    pub async fn close(&self) {
        self.dispatcher.transport().close().await;
        self.connected.store(false, Ordering::Relaxed);
    }

    // ==========================================================================
    // Generic Calls
    // ==========================================================================

    pub async fn call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
        mode: ReplyMode,
    ) -> Option<Reply> {
        // Failures are already logged by the dispatcher.
        let response = self.dispatcher.execute_single(method, params).await.ok();
        normalize_single(response, mode)
    }

    pub async fn call_batch(
        &self,
        calls: &[(String, Vec<serde_json::Value>)],
        mode: ReplyMode,
    ) -> Vec<Reply> {
        let responses = self.dispatcher.execute_batch(calls).await.ok();
        normalize_batch(responses, mode)
    }

    async fn batch_of<T>(
        &self,
        method: &str,
        items: impl IntoIterator<Item = T>,
        params: impl Fn(T) -> Vec<serde_json::Value>,
        mode: ReplyMode,
    ) -> Vec<Reply> {
        let calls: Vec<(String, Vec<serde_json::Value>)> = items
            .into_iter()
            .map(|item| (method.to_owned(), params(item)))
            .collect();
        self.call_batch(&calls, mode).await
    }

    // ==========================================================================
    // Blocks
    // ==========================================================================

    pub async fn get_block(&self, block_hash: &str, mode: ReplyMode) -> Option<Reply> {
        self.call("getblock", vec![json!(block_hash), json!(BLOCK_VERBOSITY)], mode)
            .await
    }

    pub async fn get_block_batch(&self, block_hashes: &[String], mode: ReplyMode) -> Vec<Reply> {
        self.batch_of(
            "getblock",
            block_hashes,
            |hash| vec![json!(hash), json!(BLOCK_VERBOSITY)],
            mode,
        )
        .await
    }

    pub async fn get_block_hash(&self, height: u64, mode: ReplyMode) -> Option<Reply> {
        self.call("getblockhash", vec![json!(height)], mode).await
    }

    pub async fn get_block_hash_batch(&self, heights: &[u64], mode: ReplyMode) -> Vec<Reply> {
        self.batch_of("getblockhash", heights, |height| vec![json!(height)], mode)
            .await
    }

    pub async fn get_block_count(&self, mode: ReplyMode) -> Option<Reply> {
        self.call("getblockcount", Vec::new(), mode).await
    }

    /// Resolve `height` to a hash, then fetch that block. `None` when the
    /// hash lookup failed or returned no hash.
    pub async fn get_block_by_height(&self, height: u64, mode: ReplyMode) -> Option<Reply> {
        let hash_reply = self.get_block_hash(height, ReplyMode::ResultOnly).await?;
        let Some(hash) = hash_reply.result().as_str() else {
            debug!(height, "no block hash for height");
            return None;
        };
        self.get_block(hash, mode).await
    }

    pub async fn list_since_block(&self, block_hash: &str, mode: ReplyMode) -> Option<Reply> {
        self.call("listsinceblock", vec![json!(block_hash)], mode)
            .await
    }

    pub async fn get_raw_mempool(&self, mode: ReplyMode) -> Option<Reply> {
        self.call("getrawmempool", Vec::new(), mode).await
    }

    // ==========================================================================
    // Wallet: Addresses
    // ==========================================================================

    pub async fn get_new_address(&self, mode: ReplyMode) -> Option<Reply> {
        self.call("getnewaddress", Vec::new(), mode).await
    }

    pub async fn get_new_address_batch(&self, count: usize, mode: ReplyMode) -> Vec<Reply> {
        self.batch_of("getnewaddress", 0..count, |_| Vec::new(), mode)
            .await
    }

    pub async fn get_received_by_address(&self, address: &str, mode: ReplyMode) -> Option<Reply> {
        self.call("getreceivedbyaddress", vec![json!(address)], mode)
            .await
    }

    pub async fn get_received_by_address_batch(
        &self,
        addresses: &[String],
        mode: ReplyMode,
    ) -> Vec<Reply> {
        self.batch_of(
            "getreceivedbyaddress",
            addresses,
            |address| vec![json!(address)],
            mode,
        )
        .await
    }

    pub async fn list_received_by_address(&self, mode: ReplyMode) -> Option<Reply> {
        self.call("listreceivedbyaddress", Vec::new(), mode).await
    }

    pub async fn get_address_info(&self, address: &str, mode: ReplyMode) -> Option<Reply> {
        self.call("getaddressinfo", vec![json!(address)], mode).await
    }

    // ==========================================================================
    // Wallet: Funds and Transactions
    // ==========================================================================

    /// List unspent outputs with `minconf..=maxconf` confirmations,
    /// optionally restricted to `addresses`.
    pub async fn list_unspent(
        &self,
        addresses: &[String],
        minconf: u32,
        maxconf: u32,
        mode: ReplyMode,
    ) -> Option<Reply> {
        self.call(
            "listunspent",
            vec![json!(minconf), json!(maxconf), json!(addresses)],
            mode,
        )
        .await
    }

    pub async fn get_balance(&self, mode: ReplyMode) -> Option<Reply> {
        self.call("getbalance", Vec::new(), mode).await
    }

    pub async fn list_transactions(&self, count: u32, mode: ReplyMode) -> Option<Reply> {
        self.call("listtransactions", vec![json!("*"), json!(count)], mode)
            .await
    }

    pub async fn get_transaction(&self, txid: &str, mode: ReplyMode) -> Option<Reply> {
        self.call("gettransaction", vec![json!(txid)], mode).await
    }

    pub async fn get_transaction_batch(&self, txids: &[String], mode: ReplyMode) -> Vec<Reply> {
        self.batch_of("gettransaction", txids, |txid| vec![json!(txid)], mode)
            .await
    }

    pub async fn send_to_address(
        &self,
        address: &str,
        amount: Amount,
        mode: ReplyMode,
    ) -> Option<Reply> {
        self.call(
            "sendtoaddress",
            vec![json!(address), json!(amount.to_btc())],
            mode,
        )
        .await
    }

    pub async fn estimate_smart_fee(&self, conf_target: u32, mode: ReplyMode) -> Option<Reply> {
        self.call("estimatesmartfee", vec![json!(conf_target)], mode)
            .await
    }

    // ==========================================================================
    // Raw Transactions
    // ==========================================================================

    /// `outputs` is the address-to-amount (or `data`) object
    /// `createrawtransaction` expects.
    pub async fn create_raw_transaction(
        &self,
        inputs: &[UtxoRef],
        outputs: serde_json::Value,
        mode: ReplyMode,
    ) -> Option<Reply> {
        self.call(
            "createrawtransaction",
            vec![json!(inputs), outputs],
            mode,
        )
        .await
    }

    pub async fn sign_raw_transaction(&self, raw_tx: &str, mode: ReplyMode) -> Option<Reply> {
        self.call("signrawtransactionwithwallet", vec![json!(raw_tx)], mode)
            .await
    }

    pub async fn send_raw_transaction(&self, raw_tx: &str, mode: ReplyMode) -> Option<Reply> {
        self.call("sendrawtransaction", vec![json!(raw_tx)], mode)
            .await
    }
}
