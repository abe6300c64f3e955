//! Webhook endpoint for Messenger and Instagram
//!
//! `GET /webhook` answers the subscription handshake, `POST /webhook`
//! receives event deliveries for both surfaces.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::event::{DeliveryRejection, parse_delivery};
use crate::handler::{BestEffort, DeliveryHandler, EntryOutcome, ReplyOutcome};

/// Body returned for every accepted delivery
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub verify_token: String,
    pub handler: Arc<DeliveryHandler>,
}

/// Create webhook router
pub fn create_webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(handle_verification).post(handle_delivery))
        .with_state(Arc::new(state))
}

/// Handshake query parameters
#[derive(Debug, Default, Deserialize)]
pub struct VerificationQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Terminal state of a handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Echo this challenge with 200
    Verified(String),
    /// Mode or token wrong (403)
    Rejected,
    /// Mode or token absent (400)
    Malformed,
}

impl Verification {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Verified(_) => StatusCode::OK,
            Self::Rejected => StatusCode::FORBIDDEN,
            Self::Malformed => StatusCode::BAD_REQUEST,
        }
    }
}

/// Decide a subscription handshake. Pure; safe to repeat.
pub fn verify_subscription(query: &VerificationQuery, expected_token: &str) -> Verification {
    match (query.mode.as_deref(), query.verify_token.as_deref()) {
        (Some(mode), Some(token)) => {
            if mode == "subscribe" && token == expected_token {
                Verification::Verified(query.challenge.clone().unwrap_or_default())
            } else {
                Verification::Rejected
            }
        }
        _ => Verification::Malformed,
    }
}

async fn handle_verification(
    State(state): State<Arc<WebhookState>>,
    Query(query): Query<VerificationQuery>,
) -> Response {
    let verification = verify_subscription(&query, &state.verify_token);
    match verification {
        Verification::Verified(challenge) => {
            info!("Webhook verified successfully");
            (StatusCode::OK, challenge).into_response()
        }
        Verification::Rejected => {
            warn!("Webhook verification failed: invalid mode or token");
            StatusCode::FORBIDDEN.into_response()
        }
        Verification::Malformed => {
            warn!("Webhook verification request without mode or token");
            StatusCode::BAD_REQUEST.into_response()
        }
    }
}

async fn handle_delivery(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    let (platform, entries) = match parse_delivery(&body) {
        Ok(parsed) => parsed,
        Err(DeliveryRejection::UnknownObject(object)) => {
            warn!("Webhook delivery for unknown object {:?}", object);
            return StatusCode::NOT_FOUND.into_response();
        }
        Err(DeliveryRejection::Malformed(reason)) => {
            error!("Failed to parse webhook body: {}", reason);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    debug!("Received {} webhook entries for {}", entries.len(), platform);

    let outcomes = state.handler.process_entries(platform, &entries).await;
    for outcome in &outcomes {
        log_outcome(outcome);
    }

    (StatusCode::OK, EVENT_RECEIVED).into_response()
}

fn log_best_effort(step: &str, sender_id: &str, result: &BestEffort) {
    if let BestEffort::Ignored(reason) = result {
        warn!("{} for {} failed (ignored): {}", step, sender_id, reason);
    }
}

fn log_outcome(outcome: &EntryOutcome) {
    match outcome {
        EntryOutcome::Skipped => debug!("Skipping entry without messaging events"),
        EntryOutcome::Acknowledged { sender_id, reason } => {
            debug!("Acknowledged event from {} without reply ({})", sender_id, reason)
        }
        EntryOutcome::Processed(event) => {
            log_best_effort("mark_seen", &event.sender_id, &event.seen);
            log_best_effort("typing_on", &event.sender_id, &event.typing_on);
            match &event.reply {
                ReplyOutcome::Sent { rule } => {
                    info!("Replied to {} with rule '{}'", event.sender_id, rule)
                }
                ReplyOutcome::Fallback {
                    rule,
                    error,
                    fallback,
                } => {
                    error!(
                        "Reply to {} failed (rule {:?}): {}",
                        event.sender_id, rule, error
                    );
                    log_best_effort("fallback reply", &event.sender_id, fallback);
                }
            }
            log_best_effort("typing_off", &event.sender_id, &event.typing_off);
        }
    }
}
