#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed (status {status:?}): {detail}")]
    Provider {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Unexpected provider response: {0}")]
    Decode(String),
}

/// Error type at the provider trait seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
