//! Error types for wattmon-store.

/// Result type for wattmon-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur talking to the document store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The store URL is not a usable HTTP base URL.
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),

    /// The store is not reachable.
    #[error("Store not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP transport error.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store answered with an error status.
    #[error("Store error {status}: {message}")]
    Api { status: u16, message: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
