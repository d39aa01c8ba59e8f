//! Error handling for the GLS shell

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("GLS profile error: {0}")]
    Profile(#[from] gls_core::GlsError),

    #[error("Session runtime error: {0}")]
    Runtime(#[from] gls_runtime::RuntimeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Usage: {0}")]
    Usage(String),

    #[error("Invalid Command: {0}")]
    UnknownCommand(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Hex decoding error: {0}")]
    HexDecoding(#[from] hex::FromHexError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl CliError {
    pub fn usage<T: Into<String>>(usage: T) -> Self {
        CliError::Usage(usage.into())
    }
}
