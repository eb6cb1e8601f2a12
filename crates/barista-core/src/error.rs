use thiserror::Error;

/// Top-level error type for the Barista backend.
///
/// Subsystem crates define their own error types and convert from
/// `BaristaError` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BaristaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for BaristaError {
    fn from(err: toml::de::Error) -> Self {
        BaristaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BaristaError {
    fn from(err: toml::ser::Error) -> Self {
        BaristaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BaristaError {
    fn from(err: serde_json::Error) -> Self {
        BaristaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Barista operations.
pub type Result<T> = std::result::Result<T, BaristaError>;
