//! Remote image retrieval.
//!
//! The fetch stage only needs a stream of bytes for a URL. [`HttpFetcher`]
//! provides it over HTTP(S); tests substitute their own [`Fetcher`].

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::FetchError;

/// Body of a remote image, delivered in chunks.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, FetchError>>;

/// Trait that all image sources implement.
///
/// Uses `async_trait` so stages can hold an `Arc<dyn Fetcher>`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Open a byte stream for `url`.
    ///
    /// Fails with [`FetchError::Network`] on connection or HTTP failure.
    async fn fetch(&self, url: &str) -> Result<ByteStream, FetchError>;
}

/// HTTP(S) fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with the configured user agent and connect timeout.
    ///
    /// The overall per-download timeout is enforced by the fetch stage.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .map_err(|e| FetchError::Task(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<ByteStream, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network {
                url: url.to_string(),
                message: format!("HTTP {status}"),
                status_code: Some(status.as_u16()),
            });
        }

        if let Some(size) = response.content_length() {
            tracing::trace!("  {url}: {size} bytes announced");
        }

        let url = url.to_string();
        let stream = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| network_error(&url, &e))
            })
            .boxed();
        Ok(stream)
    }
}

/// Map a `reqwest` error, tagging connect and timeout failures so the retry
/// policy can recognize them without a status code.
fn network_error(url: &str, error: &reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connect error: {error}")
    } else {
        error.to_string()
    };
    FetchError::Network {
        url: url.to_string(),
        message,
        status_code: error.status().map(|s| s.as_u16()),
    }
}
