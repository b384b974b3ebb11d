//! Error types for the judgement providers.

use thiserror::Error;

/// Errors from a judgement call. Callers degrade every variant to a neutral
/// judgement; none of them ends a run.
#[derive(Debug, Error)]
pub enum JudgementError {
    /// The provider needs a credential or endpoint that is missing.
    #[error("missing API key or endpoint for {0}")]
    MissingCredentials(&'static str),

    /// The configured endpoint is not a valid URL.
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// Endpoint as configured.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Transport failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Truncated body.
        body: String,
    },

    /// The response had no usable text.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),

    /// Completion error from Rig.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
}
