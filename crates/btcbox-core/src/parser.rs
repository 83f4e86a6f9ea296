//! Accessors over already-fetched RPC results.
//!
//! These are pure functions over `serde_json::Value`; nothing here talks to
//! the node.

use std::collections::HashMap;

use bitcoin::{Amount, Txid};
use serde::Serialize;

use crate::error::CoreError;

// ==============================================================================
// getblock (verbosity 2)
// ==============================================================================

/// A `getblock <hash> 2` result.
///
/// Construction fails for lower verbosity levels, where `tx` holds bare
/// txids instead of decoded transactions.
#[derive(Debug, Clone)]
pub struct BlockParser {
    json: serde_json::Value,
}

impl BlockParser {
    pub fn new(json: serde_json::Value) -> Result<Self, CoreError> {
        let verbose = json
            .get("tx")
            .and_then(serde_json::Value::as_array)
            .and_then(|txs| txs.first())
            .is_some_and(|first| first.get("txid").is_some());
        if !verbose {
            return Err(CoreError::Config(
                "only verbosity=2 blocks are supported".to_owned(),
            ));
        }
        Ok(Self { json })
    }

    fn transactions(&self) -> &[serde_json::Value] {
        self.json
            .get("tx")
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn height(&self) -> Result<u64, CoreError> {
        self.json
            .get("height")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| CoreError::Parse("missing block height".to_owned()))
    }

    pub fn transaction_ids(&self) -> Result<Vec<Txid>, CoreError> {
        self.transactions()
            .iter()
            .map(|tx| {
                let txid = tx
                    .get("txid")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| CoreError::Parse("missing txid".to_owned()))?;
                txid.parse()
                    .map_err(|e| CoreError::Parse(format!("invalid txid `{txid}`: {e}")))
            })
            .collect()
    }

    /// Every distinct output address in the block, in first-seen order.
    pub fn unique_output_addresses(&self) -> Vec<String> {
        unique_addresses(self.transactions().iter())
    }

    /// Distinct output addresses of the coinbase transaction.
    pub fn coinbase_addresses(&self) -> Vec<String> {
        unique_addresses(self.transactions().iter().take(1))
    }
}

fn unique_addresses<'a>(txs: impl Iterator<Item = &'a serde_json::Value>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    txs.filter_map(|tx| tx.get("vout").and_then(serde_json::Value::as_array))
        .flatten()
        .filter_map(|vout| vout.get("scriptPubKey").and_then(output_address))
        .filter(|address| seen.insert(address.clone()))
        .collect()
}

/// Address of a `scriptPubKey`. Newer nodes report `address`; older ones a
/// one-element `addresses` array.
fn output_address(script_pub_key: &serde_json::Value) -> Option<String> {
    script_pub_key
        .get("address")
        .and_then(serde_json::Value::as_str)
        .or_else(|| {
            script_pub_key
                .get("addresses")
                .and_then(serde_json::Value::as_array)
                .and_then(|addresses| addresses.first())
                .and_then(serde_json::Value::as_str)
        })
        .map(str::to_owned)
}

// ==============================================================================
// listunspent
// ==============================================================================

/// A `listunspent` result.
#[derive(Debug, Clone)]
pub struct UnspentParser {
    entries: Vec<serde_json::Value>,
}

impl UnspentParser {
    pub fn new(json: serde_json::Value) -> Result<Self, CoreError> {
        match json {
            serde_json::Value::Array(entries) => Ok(Self { entries }),
            other => Err(CoreError::Config(format!(
                "listunspent result must be an array, got: {other}"
            ))),
        }
    }

    /// Total unspent amount per address, in first-seen address order.
    pub fn addresses_and_amounts(&self) -> Result<(Vec<String>, Vec<Amount>), CoreError> {
        let mut addresses: Vec<String> = Vec::new();
        let mut amounts: Vec<Amount> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in &self.entries {
            let address = entry
                .get("address")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| CoreError::Parse("missing address in unspent entry".to_owned()))?;
            let amount = parse_btc_amount(
                entry
                    .get("amount")
                    .ok_or_else(|| CoreError::Parse("missing amount in unspent entry".to_owned()))?,
            )?;

            match index.get(address) {
                Some(&i) => {
                    amounts[i] = amounts[i].checked_add(amount).ok_or_else(|| {
                        CoreError::Parse(format!("unspent total for `{address}` overflows"))
                    })?;
                }
                None => {
                    index.insert(address.to_owned(), addresses.len());
                    addresses.push(address.to_owned());
                    amounts.push(amount);
                }
            }
        }

        Ok((addresses, amounts))
    }

    pub fn utxos(&self) -> Result<Vec<UtxoRef>, CoreError> {
        self.entries.iter().map(UtxoRef::from_unspent).collect()
    }
}

/// The `{txid, vout}` pair `createrawtransaction` expects as an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtxoRef {
    pub txid: Txid,
    pub vout: u32,
}

impl UtxoRef {
    /// Crop a `listunspent` entry down to its outpoint.
    pub fn from_unspent(entry: &serde_json::Value) -> Result<Self, CoreError> {
        let txid = entry
            .get("txid")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CoreError::Parse("missing txid in unspent entry".to_owned()))?;
        let txid = txid
            .parse()
            .map_err(|e| CoreError::Parse(format!("invalid txid `{txid}`: {e}")))?;
        let vout = entry
            .get("vout")
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| CoreError::Parse("missing or invalid vout in unspent entry".to_owned()))?;
        Ok(Self { txid, vout })
    }
}

/// Parse a BTC amount from a JSON value.
///
/// Number values are parsed via `Amount::from_float_in` to support scientific
/// notation, while string values are parsed via `Amount::from_str_in`.
pub fn parse_btc_amount(value: &serde_json::Value) -> Result<Amount, CoreError> {
    match value {
        serde_json::Value::Number(n) => {
            let parsed = n
                .as_f64()
                .ok_or_else(|| CoreError::Parse(format!("invalid BTC amount `{value}`")))?;
            Amount::from_float_in(parsed, bitcoin::Denomination::Bitcoin)
                .map_err(|e| CoreError::Parse(format!("invalid BTC amount `{value}`: {e}")))
        }
        serde_json::Value::String(s) => Amount::from_str_in(s, bitcoin::Denomination::Bitcoin)
            .map_err(|e| CoreError::Parse(format!("invalid BTC amount `{s}`: {e}"))),
        _ => Err(CoreError::Parse(format!(
            "expected numeric BTC amount, got: {value}"
        ))),
    }
}
