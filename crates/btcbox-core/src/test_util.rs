//! Shared test helpers for `btcbox-core` unit tests.
//!
//! Holds a one-shot HTTP stub server for transport tests and JSON fixtures
//! shaped like Bitcoin Core RPC results so parser and client tests share a
//! single source of truth for dummy data.

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// ==============================================================================
// HTTP Stub Server
// ==============================================================================

/// Accept one HTTP request on a random local port and answer it with
/// `status` and a JSON `body`. The join handle yields the raw request text.
pub async fn serve_once(status: &'static str, body: String) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("stub listener must bind");
    let port = listener
        .local_addr()
        .expect("stub listener must have an address")
        .port();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("stub must accept");
        let request = read_http_request(&mut stream).await;

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream
            .write_all(response.as_bytes())
            .await
            .expect("stub must write response");
        stream.shutdown().await.ok();
        request
    });

    (port, handle)
}

async fn read_http_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.expect("stub must read");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// ==============================================================================
// RPC Result Fixtures
// ==============================================================================

/// A `vout` entry carrying a modern `address` field.
pub fn vout_with_address(n: u32, value: f64, address: &str) -> serde_json::Value {
    json!({
        "value": value,
        "n": n,
        "scriptPubKey": {
            "hex": "0014000102030405060708090a0b0c0d0e0f10111213",
            "address": address,
            "type": "witness_v0_keyhash",
        },
    })
}

/// A `vout` entry without any address (e.g. `OP_RETURN`).
pub fn vout_without_address(n: u32) -> serde_json::Value {
    json!({
        "value": 0.0,
        "n": n,
        "scriptPubKey": {"hex": "6a0474657374", "type": "nulldata"},
    })
}

/// Deterministic 64-char hex txid from a single distinguishing byte.
pub fn txid_hex(b: u8) -> String {
    format!("{b:02x}").repeat(32)
}

/// A `getblock <hash> 2` result with the given transactions' outputs.
pub fn verbose_block(height: u64, txs: Vec<(String, Vec<serde_json::Value>)>) -> serde_json::Value {
    let tx: Vec<serde_json::Value> = txs
        .into_iter()
        .map(|(txid, vout)| json!({"txid": txid, "vin": [], "vout": vout}))
        .collect();
    json!({
        "hash": "00".repeat(32),
        "height": height,
        "tx": tx,
    })
}

/// One `listunspent` entry.
pub fn unspent(txid: &str, vout: u32, address: &str, amount: f64) -> serde_json::Value {
    json!({
        "txid": txid,
        "vout": vout,
        "address": address,
        "amount": amount,
        "confirmations": 6,
        "spendable": true,
    })
}
