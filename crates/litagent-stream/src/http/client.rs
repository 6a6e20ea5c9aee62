use futures::StreamExt as _;
use tracing::debug;

use crate::errors::{GeneratorError, TransportError};
use crate::model::{GenerationRequest, TransportId};
use crate::transport::{ByteSource, Transport};

use super::config::HttpConfig;

const HTTP_TRANSPORT: &str = "http";

/// Transport that streams generations from the LitAgent backend over HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit configuration.
    pub fn new(config: HttpConfig) -> Result<Self, GeneratorError> {
        if config.base_url.trim().is_empty() {
            return Err(GeneratorError::Config(
                "HTTP transport base_url must not be empty".into(),
            ));
        }
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GeneratorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport using `LITAGENT_BASE_URL`.
    pub fn from_env() -> Result<Self, GeneratorError> {
        Self::new(HttpConfig::from_env()?)
    }

    /// Returns the transport configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Probes the backend root endpoint and returns its status message.
    pub async fn health(&self) -> Result<String, GeneratorError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| TransportError::request(HTTP_TRANSPORT, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::status(HTTP_TRANSPORT, status.as_u16(), body).into());
        }
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::read(HTTP_TRANSPORT, e.to_string()))?;
        Ok(value
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("ok")
            .to_string())
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    fn id(&self) -> TransportId {
        TransportId::new(HTTP_TRANSPORT)
    }

    async fn open(&self, request: &GenerationRequest) -> Result<ByteSource, TransportError> {
        let url = self.config.stream_url();
        debug!(session_id = %request.session_id, url = %url, "opening generation stream");

        let mut http_req = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&build_request_body(request));
        if let Some(timeout) = request.options.timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req.send().await.map_err(|e| {
            TransportError::request(HTTP_TRANSPORT, format!("generation request failed: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::status(
                HTTP_TRANSPORT,
                status.as_u16(),
                body,
            ));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::read(HTTP_TRANSPORT, e.to_string())));
        Ok(Box::pin(stream))
    }
}

pub(crate) fn build_request_body(request: &GenerationRequest) -> serde_json::Value {
    serde_json::json!({ "topic": request.topic })
}
