//! HTTP transport.
//!
//! Every network read in the pipeline goes through [`Transport`], so the
//! collector can run against in-memory fixtures.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::AuditError;

/// Fetch capability: one GET, body as text.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and return the response body. Non-2xx statuses are errors.
    async fn fetch(&self, url: &str) -> Result<String, AuditError>;
}

/// Single-attempt fetch that logs and swallows any failure.
pub async fn fetch_best_effort(transport: &dyn Transport, url: &str) -> Option<String> {
    match transport.fetch(url).await {
        Ok(body) => Some(body),
        Err(e) => {
            debug!(url = %redact_query(url), error = %e, "request failed");
            None
        }
    }
}

/// `url` with its query string masked; queries may carry API keys.
pub fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?[redacted]"),
        None => url.to_string(),
    }
}

/// `reqwest`-backed transport with a fixed timeout and user agent.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, AuditError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<String, AuditError> {
        // reqwest errors embed the full URL, query included
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuditError::Http(e.without_url()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AuditError::Status {
                url: redact_query(url),
                status: status.as_u16(),
            });
        }
        resp.text()
            .await
            .map_err(|e| AuditError::Http(e.without_url()))
    }
}
