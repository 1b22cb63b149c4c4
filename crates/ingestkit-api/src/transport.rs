use async_trait::async_trait;
use ingestkit_core::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status and body of one HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Issues a single GET. Implementations must not retry on their own:
/// retry policy lives in `ApiSource`.
///
/// Transport failures (refused, timeout, DNS) are `IngestError::Request`;
/// any HTTP status, including errors, is a successful `RawResponse`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        params: &[(String, String)],
    ) -> Result<RawResponse>;
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Connect timeout in seconds (default: 10)
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("ingestkit/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// `Transport` backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| IngestError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        params: &[(String, String)],
    ) -> Result<RawResponse> {
        let mut request = self.client.get(url).query(params);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let request_error = |e: reqwest::Error| IngestError::Request {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = request.send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(request_error)?;

        tracing::debug!(url, status, bytes = body.len(), "received response");
        Ok(RawResponse { status, body })
    }
}
