//! `HttpClient` over `reqwest`.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{DownloadStream, HttpClient, HttpRequest},
};
use futures_util::TryStreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streams media bodies straight from the socket into the cache writer.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::with_connect_timeout(CONNECT_TIMEOUT)
    }

    /// Only connecting is bounded; long downloads are not cut off unless
    /// the request sets its own [`HttpRequest::timeout`].
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(4)
            .user_agent(concat!("player-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self { client }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let builder = request
            .headers
            .iter()
            .fold(self.client.get(&request.url), |req, (key, value)| {
                req.header(key, value)
            });

        match request.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    fn map_reqwest_error(e: reqwest::Error) -> BridgeError {
        let e = e.without_url();
        if e.is_timeout() {
            BridgeError::OperationFailed("Request timed out".to_string())
        } else if e.is_connect() {
            BridgeError::OperationFailed(format!("Connection failed: {}", e))
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn download_stream(&self, request: HttpRequest) -> Result<DownloadStream> {
        let response = self
            .build_request(&request)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::OperationFailed(format!("HTTP {}", status)));
        }

        let content_length = response.content_length();
        debug!(?content_length, "Download response received");

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(DownloadStream {
            content_length,
            reader: Box::new(tokio_util::io::StreamReader::new(stream)),
        })
    }
}
