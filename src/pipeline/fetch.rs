//! Content fetching: download a document over HTTP with bounded size and time.
//!
//! The body is consumed as a stream and the size ceiling is checked after
//! every chunk, so an oversized or endless response is abandoned as soon as
//! it crosses the limit instead of being buffered first. A declared
//! `Content-Length` above the ceiling is rejected before any body bytes are
//! read.
//!
//! No retries happen here; see [`crate::retry`] for the caller-side policy.

use crate::config::PaperLensConfig;
use crate::error::FetchError;
use crate::output::RawDocument;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Reusable HTTP client for document downloads.
///
/// Build once per process and share by reference; the inner
/// `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct ContentFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: u64,
}

impl ContentFetcher {
    pub fn new(config: &PaperLensConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::NetworkError {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            timeout_secs: config.fetch_timeout_secs,
            max_bytes: config.max_download_bytes,
        })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Download `url` into memory.
    pub async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        }

        info!("Fetching document from: {}", url);

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Fetch of {} returned HTTP {}", url, status);
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                warn!(
                    "Declared Content-Length {} exceeds limit {} for {}",
                    declared, self.max_bytes, url
                );
                return Err(self.too_large(url));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let capacity = response
            .content_length()
            .map(|n| n as usize)
            .unwrap_or(64 * 1024);
        let mut bytes: Vec<u8> = Vec::with_capacity(capacity);

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(url, e))?;
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                warn!(
                    "Aborting download of {} after {} bytes: limit is {}",
                    url,
                    bytes.len() + chunk.len(),
                    self.max_bytes
                );
                return Err(self.too_large(url));
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(
            "Fetched {} bytes ({}) from {}",
            bytes.len(),
            content_type.as_deref().unwrap_or("no content type"),
            url
        );

        Ok(RawDocument::new(bytes, content_type))
    }

    fn too_large(&self, url: &str) -> FetchError {
        FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        }
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            FetchError::NetworkError {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}
