use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// Maximum number of requests sent in one HTTP batch.
pub const CHUNK_SIZE: usize = 100;

/// Total time budget for one HTTP exchange. Large batches against a busy
/// node can take minutes to answer.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Connection settings for the node's JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Bitcoin Core `.cookie` file, used when no explicit credentials are set.
    pub cookie_file: Option<PathBuf>,
    /// Outbound HTTP requests per second. A batch chunk counts as one request.
    pub requests_per_second: Option<u32>,
    pub chunk_size: usize,
    pub timeout: Duration,
}

impl RpcConfig {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        if self.chunk_size == 0 {
            return Err(CoreError::Config(
                "rpc batch chunk size must be at least 1".to_owned(),
            ));
        }
        if self.requests_per_second == Some(0) {
            return Err(CoreError::Config(
                "requests_per_second must be at least 1".to_owned(),
            ));
        }
        if self.host.is_empty() {
            return Err(CoreError::Config("rpc host must not be empty".to_owned()));
        }
        Ok(())
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_owned(),
            host: "127.0.0.1".to_owned(),
            port: Some(8332),
            user: None,
            password: None,
            cookie_file: None,
            requests_per_second: None,
            chunk_size: CHUNK_SIZE,
            timeout: RPC_TIMEOUT,
        }
    }
}
