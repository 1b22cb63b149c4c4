use serde::{Deserialize, Serialize};

/// Where and how to call an HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub base_url: String,
    pub endpoint: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub params: Vec<(String, String)>,
}

impl ApiEndpoint {
    pub fn new(base_url: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            endpoint: endpoint.into(),
            headers: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Join base URL and endpoint with a single `/`.
    ///
    /// No slash normalisation happens: `base_url` must not end with `/` and
    /// `endpoint` must not start with one.
    pub fn build_url(&self) -> String {
        format!("{}/{}", self.base_url, self.endpoint)
    }
}
