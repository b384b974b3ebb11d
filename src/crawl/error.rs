//! Error types for the crawl module.

use thiserror::Error;

/// HTTP status the platform answers with when it blocks automated traffic.
pub const BLOCK_STATUS: u16 = 412;

/// Errors that can occur while fetching from the platform.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The body could not be decoded as JSON.
    #[error("invalid response body from {url}: {reason}")]
    InvalidBody {
        /// Requested URL.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// The platform answered with a non-zero application code.
    #[error("platform rejected request with code {code}: {message}")]
    Rejected {
        /// Application-level code from the body.
        code: i64,
        /// Message from the body, if any.
        message: String,
    },
}

impl FetchError {
    /// Whether this error is the platform's bot-block signal.
    #[must_use]
    pub const fn is_block(&self) -> bool {
        matches!(self, Self::HttpStatus { status, .. } if *status == BLOCK_STATUS)
    }

    /// Short kind tag used in log lines.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::HttpStatus { .. } => "http_status",
            Self::InvalidBody { .. } => "invalid_body",
            Self::Network(_) | Self::HttpClient(_) => "network",
            Self::Rejected { .. } => "rejected",
        }
    }
}

/// Errors surfaced by a scan as a whole.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A scan is already running on this crawler.
    #[error("a scan is already running")]
    AlreadyRunning,

    /// The scan request names no keyword.
    #[error("no keywords to scan")]
    NoKeywords,
}
