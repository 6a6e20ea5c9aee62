use std::time::Duration;

use crate::errors::GeneratorError;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Configuration for the HTTP transport.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Base URL of the LitAgent backend.
    pub base_url: String,
    /// Connect timeout for new connections.
    pub connect_timeout: Duration,
    /// Overall client timeout. `None` leaves long-running streams unbounded;
    /// per-generation timeouts are set on the request instead.
    pub timeout: Option<Duration>,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            timeout: None,
            user_agent: concat!("litagent/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    /// Creates a config for the given backend base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from `LITAGENT_BASE_URL`, falling back to the local
    /// default when unset.
    pub fn from_env() -> Result<Self, GeneratorError> {
        match std::env::var("LITAGENT_BASE_URL") {
            Ok(url) if url.trim().is_empty() => Err(GeneratorError::Config(
                "LITAGENT_BASE_URL is set but empty".into(),
            )),
            Ok(url) => Ok(Self::new(url.trim())),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Overrides the backend base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets an overall client timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn stream_url(&self) -> String {
        format!("{}/stream_generate", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn health_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}
