//! Error types for relay-core

use thiserror::Error;

/// Main error type for relay-core
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),
}

/// Result type alias for relay-core
pub type Result<T> = std::result::Result<T, Error>;
