use super::Error;
use async_trait::async_trait;
use http::StatusCode;

use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw HTTP reply: status plus undecoded body.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply {
            status: StatusCode::OK,
            body: body.into(),
        }
    }
}

/// Single POST exchange with the portal.
///
/// Implementations map anything that prevents a reply from arriving (connect
/// failure, timeout, broken body) to `Error::Transient`; any reply that did
/// arrive is returned as-is for the caller to classify.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, token: &str, body: String) -> Result<Reply, Error>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpTransport { client })
    }
}

fn map_transport_err(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Transient(format!("request timed out: {}", error))
    } else {
        Error::Transient(error.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, token: &str, body: String) -> Result<Reply, Error> {
        let response = self
            .client
            .post(url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::ACCEPT, "application/json")
            .header("token", token)
            .body(body)
            .send()
            .await
            .map_err(map_transport_err)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_err)?;

        log::trace!("url: {}, status: {}, response_text: {}", url, status, body);

        Ok(Reply { status, body })
    }
}
