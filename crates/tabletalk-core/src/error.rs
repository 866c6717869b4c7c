use thiserror::Error;

/// Top-level error type for the tabletalk system.
///
/// Each variant wraps a subsystem-specific message. Subsystem crates use this
/// enum directly so that the `?` operator works across crate boundaries
/// without a ladder of conversion impls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TabletalkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported file type: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Model error: {0}")]
    Llm(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for TabletalkError {
    fn from(err: toml::de::Error) -> Self {
        TabletalkError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TabletalkError {
    fn from(err: toml::ser::Error) -> Self {
        TabletalkError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TabletalkError {
    fn from(err: serde_json::Error) -> Self {
        TabletalkError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for tabletalk operations.
pub type Result<T> = std::result::Result<T, TabletalkError>;
