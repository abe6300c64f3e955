//! Error types for relay-api
//!
//! Every failure leaves the facade as `{error, errorType, details}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, warn};

use relay_messenger::{MessengerError, ValidationError};

/// relay-api error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Messenger(#[from] MessengerError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Messenger(MessengerError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Messenger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Messenger(e) => e.kind(),
        }
    }

    fn details(&self) -> Value {
        match self {
            Self::Validation(v) | Self::Messenger(MessengerError::Validation(v)) => json!(v),
            Self::Messenger(MessengerError::HttpStatus { status, message }) => json!({
                "status": status,
                "message": message,
            }),
            Self::Messenger(MessengerError::RemoteApi {
                code, error_type, ..
            }) => json!({
                "code": code,
                "type": error_type,
            }),
            Self::Messenger(MessengerError::Transport(reason)) => json!({
                "reason": reason,
            }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}: {}", self.kind(), self);
        } else {
            warn!("Rejected request: {}", self);
        }

        let body = json!({
            "error": self.to_string(),
            "errorType": self.kind(),
            "details": self.details(),
        });
        (status, Json(body)).into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;
