use thiserror::Error;

/// Common error type for CMS exporter components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown resource type: {0}")]
    UnknownResource(String),
}

/// Failure reported by a [`MetricFetcher`](crate::scrape::MetricFetcher).
///
/// Any of these skips the affected metric for the current scrape.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The monitoring API answered with an error code.
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// The response envelope could not be decoded.
    #[error("invalid response payload: {0}")]
    Payload(String),
}

impl FetchError {
    /// Create an API error.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using the exporter's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
