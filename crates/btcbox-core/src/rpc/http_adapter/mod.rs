//! JSON-RPC transport over HTTP(S).
//!
//! Implements [`RpcTransport`](super::RpcTransport) with `reqwest`: one lazily
//! created, reusable session per transport, basic auth from explicit
//! credentials or a cookie file, and connection-string helpers.

mod connection;
mod session;

pub use connection::make_url;
pub use session::HttpTransport;
