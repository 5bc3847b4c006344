//! Streaming HTTP downloads for the audio cache.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// A `GET` for a resolved stream URL.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    /// Overall deadline for the response headers and body.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Response body of a successful download.
pub struct DownloadStream {
    /// Size announced by the server, when known.
    pub content_length: Option<u64>,
    pub reader: Box<dyn tokio::io::AsyncRead + Send + Unpin>,
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Stream URLs handed to this client are short-lived signed URLs and must
/// not be logged verbatim.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request` and hand back the body as a reader.
    ///
    /// Non-2xx responses are errors. Implementations do not retry; the
    /// cache retries whole downloads.
    async fn download_stream(&self, request: HttpRequest) -> Result<DownloadStream>;
}
