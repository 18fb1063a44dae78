//! HTTP seam between the fetch/mutation logic and the network.
//!
//! Everything above this module talks to [`HttpTransport`], so tests can
//! swap in a scripted transport and count calls. Timeouts are applied per
//! attempt by the caller through [`with_timeout`], not by the transport.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use std::time::Duration;
use tutorsheet_core::TransportError;

/// Content type for script endpoint POST bodies. The endpoint does not
/// answer CORS preflights, so JSON goes out as plain text.
pub const RPC_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`TransportError::Status`].
    pub fn error_for_status(self, url: &str) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

/// Minimal HTTP client interface.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// `GET url`, following redirects.
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;

    /// `POST url` with a JSON body sent as [`RPC_CONTENT_TYPE`], following redirects.
    async fn post_text(&self, url: &str, body: String) -> Result<HttpResponse, TransportError>;
}

/// Run one network attempt under a deadline.
pub async fn with_timeout<T, F>(url: &str, limit: Duration, attempt: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            url: url.to_string(),
            elapsed: limit,
        }),
    }
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TransportError::Connection {
                url: String::new(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }

    async fn finish(url: &str, response: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| connection_error(url, e))?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| connection_error(url, e))?;
        Self::finish(url, response).await
    }

    async fn post_text(&self, url: &str, body: String) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, RPC_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| connection_error(url, e))?;
        Self::finish(url, response).await
    }
}

fn connection_error(url: &str, err: reqwest::Error) -> TransportError {
    TransportError::Connection {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
