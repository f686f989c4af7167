//! Outbound HTTP GET used for certificate downloads and subscription
//! confirmation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

/// Failure of an outbound GET.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} timed out")]
    Timeout { url: String },

    #[error("GET {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Seam for the two outbound calls the endpoint makes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the body. Any non-2xx status is an error.
    async fn get(&self, url: &Url) -> Result<String, FetchError>;
}

/// reqwest-backed transport with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, timeout))
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<String, FetchError> {
        info!(
            url = %url,
            timeout_seconds = self.timeout.as_secs_f64(),
            "http_get_starting"
        );

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            error!(url = %url, status_code = status.as_u16(), "http_get_bad_status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| classify(url, e))?;

        info!(
            url = %url,
            status_code = status.as_u16(),
            body_length = body.len(),
            "http_get_complete"
        );

        Ok(body)
    }
}

fn classify(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        error!(url = %url, error = %e, "http_get_timeout");
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        error!(url = %url, error = %e, "http_get_error");
        FetchError::Request {
            url: url.to_string(),
            source: e,
        }
    }
}
