use std::io;

/// Errors that can occur while building requests, descriptors and launchers
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid unique id: {0}")]
    InvalidUniqueId(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error("Invalid tag expression '{expression}' at position {position}: {message}")]
    TagExpression {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid engine id: {0}")]
    InvalidEngineId(String),

    #[error("Multiple engines registered with the same id '{0}'")]
    DuplicateEngine(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type alias for trellis operations
pub type Result<T> = std::result::Result<T, Error>;
