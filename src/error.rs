//! Error types for the edgequake-paperlens library.
//!
//! Each pipeline stage owns a closed error enum so callers can match on the
//! exact failure kind:
//!
//! * [`FetchError`]    — the document could not be downloaded.
//! * [`ExtractError`]  — the bytes were downloaded but are not usable text.
//! * [`AnalysisError`] — the reasoning model could not produce a result.
//! * [`ParseError`]    — the model replied, but no JSON could be recovered.
//! * [`LedgerError`]   — a usage record could not be stored. Never surfaced
//!   by the analysis operations; the recorder logs and drops it.
//!
//! [`PaperError`] wraps the stage errors for composed operations such as
//! [`crate::ingest::ingest`] and [`crate::analysis::AnalysisClient::analyze_url`].
//!
//! Retry policy belongs to the caller. Every error type exposes
//! `is_retryable()` so an orchestrator can tell a transient network blip from
//! a configuration defect without string matching.

use thiserror::Error;

/// Failure while downloading a document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request did not complete within the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    Timeout { url: String, secs: u64 },

    /// The response body exceeded the size ceiling. The download was aborted
    /// as soon as the ceiling was crossed.
    #[error("Document at '{url}' exceeds the {limit}-byte size limit")]
    TooLarge { url: String, limit: u64 },

    /// The server answered with a non-success status.
    #[error("HTTP {status} while fetching '{url}'")]
    HttpStatus { url: String, status: u16 },

    /// Connection, TLS, or body-read failure.
    #[error("Failed to download '{url}': {reason}")]
    NetworkError { url: String, reason: String },

    /// The input is not an absolute HTTP/HTTPS URL.
    #[error("Invalid URL '{url}': not a valid HTTP/HTTPS URL")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Only transport-level hiccups are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::NetworkError { .. })
    }
}

/// Failure while turning document bytes into text lines.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The document claims to be a PDF but cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptDocument { detail: String },

    /// The bytes are not a PDF at all.
    #[error("Unsupported document format (content type {content_type:?}, first bytes {magic:?})")]
    UnsupportedFormat {
        content_type: Option<String>,
        magic: Vec<u8>,
    },

    /// The document has more pages than the configured limit.
    #[error("Document has {pages} pages, above the limit of {limit}")]
    PageLimitExceeded { pages: usize, limit: usize },
}

impl ExtractError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// The model reply contained no recoverable JSON object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No JSON object found in model reply")]
    NoJsonFound,
}

/// Failure while calling the reasoning model.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No usable credential. Fatal; retrying cannot help.
    #[error("Reasoning model is not configured.\n{hint}")]
    Unconfigured { hint: String },

    /// The provider could not be reached or returned a server error.
    #[error("Reasoning model unreachable: {detail}")]
    Unreachable { detail: String },

    /// The provider throttled the request (HTTP 429).
    #[error("Reasoning model rate limit exceeded: {detail}")]
    RateLimited { detail: String },

    /// The call was billed but the reply could not be parsed.
    #[error("Reasoning model reply was malformed: {0}")]
    Malformed(#[from] ParseError),
}

impl AnalysisError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::RateLimited { .. })
    }
}

/// Failure while appending to the usage ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialise usage event: {0}")]
    Serialise(#[from] serde_json::Error),
}

/// User-facing failure class for a whole pipeline run.
///
/// Presentation layers show [`ErrorCategory::user_message`] instead of the
/// error's `Display`, which may contain provider detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Document,
    Parsing,
    Unconfigured,
}

impl ErrorCategory {
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Network => "We couldn't reach the paper or the analysis service. Please try again shortly.",
            Self::Document => "This document couldn't be read. Make sure the link points to a PDF.",
            Self::Parsing => "The analysis came back in an unexpected format. Please try again.",
            Self::Unconfigured => "Paper analysis is not configured on this server.",
        }
    }
}

/// Errors returned by composed operations.
#[derive(Debug, Error)]
pub enum PaperError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PaperError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::Extract(e) => e.is_retryable(),
            Self::Analysis(e) => e.is_retryable(),
            Self::InvalidConfig(_) => false,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(FetchError::InvalidUrl { .. }) => ErrorCategory::Document,
            Self::Fetch(FetchError::TooLarge { .. }) => ErrorCategory::Document,
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Extract(_) => ErrorCategory::Document,
            Self::Analysis(AnalysisError::Unconfigured { .. }) => ErrorCategory::Unconfigured,
            Self::Analysis(AnalysisError::Malformed(_)) => ErrorCategory::Parsing,
            Self::Analysis(_) => ErrorCategory::Network,
            Self::InvalidConfig(_) => ErrorCategory::Unconfigured,
        }
    }
}
