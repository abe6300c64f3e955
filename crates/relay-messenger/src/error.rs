//! Error types for relay-messenger

use thiserror::Error;

use crate::message::ValidationError;

/// relay-messenger error type
#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The network call to the Graph API could not complete
    #[error("Graph API request failed: {0}")]
    Transport(String),

    /// The Graph API answered with a non-success status
    #[error("Graph API returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// The Graph API reported an error object in an otherwise successful response
    #[error("{message}")]
    RemoteApi {
        message: String,
        code: Option<i64>,
        error_type: Option<String>,
    },
}

impl MessengerError {
    /// Classification reported to callers of the REST facade
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Transport(_) => "TransportError",
            Self::HttpStatus { .. } => "HttpStatusError",
            Self::RemoteApi { .. } => "RemoteApiError",
        }
    }
}

impl From<reqwest::Error> for MessengerError {
    fn from(err: reqwest::Error) -> Self {
        MessengerError::Transport(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MessengerError>;
