use thiserror::Error;

/// Top-level error type for the Insurance Chat system.
///
/// Subsystem crates define their own error types and convert from
/// `InsureChatError` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InsureChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Knowledge base error: {0}")]
    Knowledge(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for InsureChatError {
    fn from(err: toml::de::Error) -> Self {
        InsureChatError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for InsureChatError {
    fn from(err: toml::ser::Error) -> Self {
        InsureChatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for InsureChatError {
    fn from(err: serde_json::Error) -> Self {
        InsureChatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Insurance Chat operations.
pub type Result<T> = std::result::Result<T, InsureChatError>;
