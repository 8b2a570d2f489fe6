//! Error types for pagewalk configuration and shared primitives

use thiserror::Error;

/// Result type alias using pagewalk Error
pub type Result<T> = std::result::Result<T, Error>;

/// pagewalk common error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("Invalid resource name: {0}")]
    InvalidName(String),

    #[error("Name space exhausted for prefix '{prefix}' after {attempts} attempts")]
    NamesExhausted { prefix: String, attempts: usize },
}
