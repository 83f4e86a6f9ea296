use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Url};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::RpcConfig;
use crate::error::{CoreError, RpcError};

use super::super::RpcTransport;
use super::connection::{make_url, parse_connection, resolve_auth};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

enum SessionState {
    Idle,
    Open(reqwest::Client),
    Closed,
}

/// JSON-RPC transport over HTTP(S).
///
/// The underlying `reqwest::Client` is created on first use and reused by
/// every later call until [`RpcTransport::close`] releases it.
pub struct HttpTransport {
    url: Url,
    endpoint: String,
    auth: Option<(String, String)>,
    timeout: Duration,
    session: RwLock<SessionState>,
    sessions_opened: AtomicUsize,
}

impl HttpTransport {
    /// Create a transport for the endpoint described by `config`.
    ///
    /// Authentication precedence:
    /// 1. explicit `user` + `password`
    /// 2. cookie file (`username:password`) from `cookie_file`
    /// 3. no auth
    pub fn new(config: &RpcConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let auth = resolve_auth(
            config.user.as_deref(),
            config.password.as_deref(),
            config.cookie_file.as_deref(),
        )?;
        let endpoint = make_url(&config.host, Some(&config.scheme), None, None, config.port);
        let url = parse_connection(&endpoint)?;

        Ok(Self {
            url,
            endpoint,
            auth,
            timeout: config.timeout,
            session: RwLock::new(SessionState::Idle),
            sessions_opened: AtomicUsize::new(0),
        })
    }

    /// Return the shared HTTP client, creating it on first use.
    pub async fn ensure_session(&self) -> Result<reqwest::Client, RpcError> {
        {
            let state = self.session.read().await;
            match &*state {
                SessionState::Open(client) => return Ok(client.clone()),
                SessionState::Closed => return Err(RpcError::SessionClosed),
                SessionState::Idle => {}
            }
        }

        let mut state = self.session.write().await;
        // Another caller may have opened the session while we waited.
        match &*state {
            SessionState::Open(client) => Ok(client.clone()),
            SessionState::Closed => Err(RpcError::SessionClosed),
            SessionState::Idle => {
                let client = reqwest::Client::builder()
                    .connect_timeout(CONNECT_TIMEOUT)
                    .timeout(self.timeout)
                    .pool_max_idle_per_host(32)
                    .tcp_nodelay(true)
                    .build()?;
                *state = SessionState::Open(client.clone());
                let opened = self.sessions_opened.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    endpoint = %self.endpoint,
                    timeout_secs = self.timeout.as_secs(),
                    sessions_opened = opened,
                    "opened rpc session"
                );
                Ok(client)
            }
        }
    }

    /// Number of HTTP sessions created over this transport's lifetime.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, payload: serde_json::Value) -> Result<serde_json::Value, RpcError> {
        let client = self.ensure_session().await?;

        let mut builder = client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await?;
        let status = response.status();

        // Bitcoin Core answers RPC-level errors with non-2xx statuses and a
        // JSON body, so the body is decoded regardless of status.
        let body = response.text().await?;
        debug!(endpoint = %self.endpoint, %status, body_len = body.len(), "rpc http response");
        trace!(endpoint = %self.endpoint, body = %body, "rpc http response body");

        serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!(
                "decode JSON-RPC response (HTTP {status}): {e}; body={body}"
            ))
        })
    }

    async fn close(&self) {
        let mut state = self.session.write().await;
        if matches!(*state, SessionState::Open(_)) {
            debug!(endpoint = %self.endpoint, "closed rpc session");
        }
        *state = SessionState::Closed;
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
