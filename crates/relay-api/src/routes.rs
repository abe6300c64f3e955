//! Route definitions
//!
//! REST facade endpoints. The webhook routes live in relay-messenger and
//! are merged in by the server.

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{
    conversations, health, insights, mark_seen, profile, send_button_template,
    send_generic_template, send_image, send_list_template, send_message, send_notification,
    send_quick_replies, send_reaction, typing,
};
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Sending
        .route("/api/send-message", post(send_message))
        .route("/api/send-image", post(send_image))
        .route("/api/send-quick-replies", post(send_quick_replies))
        .route("/api/send-button-template", post(send_button_template))
        .route("/api/send-generic-template", post(send_generic_template))
        .route("/api/send-list-template", post(send_list_template))
        .route("/api/send-reaction", post(send_reaction))
        .route("/api/send-notification", post(send_notification))
        // Indicators
        .route("/api/mark-seen", post(mark_seen))
        .route("/api/typing", post(typing))
        // Reads
        .route("/api/profile/{user_id}", get(profile))
        .route("/api/conversations", get(conversations))
        .route("/api/insights", get(insights))
}
