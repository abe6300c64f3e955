//! HTTP API handlers
//!
//! Each handler validates its parameters, makes exactly one call on the
//! selected platform client and wraps the raw result as
//! `{success: true, result}`.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use relay_core::{ClientConfig, Config, Platform};
use relay_messenger::{
    Button, MessageTag, MessagingClient, Notification, OutboundMessage, QuickReply,
    ValidationError, require_path_id,
};

use crate::error::Result;
use crate::params::{
    ButtonInput, ElementInput, Fields, QuickReplyInput, into_buttons, into_elements, parse_body,
    platform_or_default,
};
use crate::server::AppState;

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    pub account_id: String,
    pub api_version: String,
}

impl From<&ClientConfig> for PlatformInfo {
    fn from(config: &ClientConfig) -> Self {
        Self {
            account_id: config.account_id.clone(),
            api_version: config.api_version.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Platforms {
    pub messenger: PlatformInfo,
    pub instagram: PlatformInfo,
}

/// Health check payload. Carries no secrets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthInfo {
    pub status: &'static str,
    pub platforms: Platforms,
    pub started_at: DateTime<Utc>,
}

impl HealthInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            status: "ok",
            platforms: Platforms {
                messenger: PlatformInfo::from(&config.messenger),
                instagram: PlatformInfo::from(&config.instagram),
            },
            started_at: Utc::now(),
        }
    }
}

fn success(result: Value) -> Json<Value> {
    Json(json!({ "success": true, "result": result }))
}

/// Client for the `platform` field, after all fields were validated
fn client_for(state: &AppState, platform: Platform) -> &dyn MessagingClient {
    state.clients.get(platform).as_ref()
}

// ============================================================================
// Health
// ============================================================================

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthInfo> {
    Json(state.health.as_ref().clone())
}

// ============================================================================
// Send endpoints
// ============================================================================

/// `POST /api/send-message {userId, message}`
pub async fn send_message(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required_str("userId");
    let message = fields.required_str("message");
    let platform = fields.platform();
    fields.finish()?;

    debug!("send-message to {} on {}", user_id, platform);
    let result = client_for(&state, platform)
        .send_text(&user_id, &message)
        .await?;
    info!("Sent text to {} on {}", user_id, platform);
    Ok(success(result))
}

/// `POST /api/send-image {userId, imageUrl}`
pub async fn send_image(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required_str("userId");
    let image_url = fields.required_str("imageUrl");
    let platform = fields.platform();
    fields.finish()?;

    let result = client_for(&state, platform)
        .send_image(&user_id, &image_url)
        .await?;
    info!("Sent image to {} on {}", user_id, platform);
    Ok(success(result))
}

/// `POST /api/send-quick-replies {userId, text, quickReplies}`
pub async fn send_quick_replies(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required_str("userId");
    let text = fields.required_str("text");
    let replies: Vec<QuickReplyInput> = fields.required_array("quickReplies");
    let platform = fields.platform();
    fields.finish()?;

    let replies: Vec<QuickReply> = replies.into_iter().map(QuickReply::from).collect();
    let message = OutboundMessage::quick_replies(text, replies)?;
    deliver(&state, platform, &user_id, message).await
}

/// `POST /api/send-button-template {userId, text, buttons}`
pub async fn send_button_template(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required_str("userId");
    let text = fields.required_str("text");
    let inputs: Vec<ButtonInput> = fields.required_array("buttons");
    let platform = fields.platform();

    let mut errors = ValidationError::new();
    let buttons = into_buttons(inputs, "buttons", &mut errors);
    fields.extend(errors);
    fields.finish()?;

    let message = OutboundMessage::button_template(text, buttons)?;
    deliver(&state, platform, &user_id, message).await
}

/// `POST /api/send-generic-template {userId, elements}`
pub async fn send_generic_template(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required_str("userId");
    let inputs: Vec<ElementInput> = fields.required_array("elements");
    let platform = fields.platform();

    let mut errors = ValidationError::new();
    let elements = into_elements(inputs, "elements", &mut errors);
    fields.extend(errors);
    fields.finish()?;

    let message = OutboundMessage::generic_template(elements)?;
    deliver(&state, platform, &user_id, message).await
}

/// `POST /api/send-list-template {userId, elements, buttons?}`
pub async fn send_list_template(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required_str("userId");
    let element_inputs: Vec<ElementInput> = fields.required_array("elements");
    let button_inputs: Vec<ButtonInput> = fields.optional_array("buttons");
    let platform = fields.platform();

    let mut errors = ValidationError::new();
    let elements = into_elements(element_inputs, "elements", &mut errors);
    let buttons: Vec<Button> = into_buttons(button_inputs, "buttons", &mut errors);
    fields.extend(errors);
    fields.finish()?;

    let message = OutboundMessage::list_template(elements, buttons)?;
    deliver(&state, platform, &user_id, message).await
}

async fn deliver(
    state: &AppState,
    platform: Platform,
    user_id: &str,
    message: OutboundMessage,
) -> Result<Json<Value>> {
    debug!("Delivering {} to {} on {}", message.kind(), user_id, platform);
    let result = client_for(state, platform)
        .send_message(user_id, &message)
        .await?;
    info!("Sent {} to {} on {}", message.kind(), user_id, platform);
    Ok(success(result))
}

/// `POST /api/send-reaction {userId, messageId, reaction}`
pub async fn send_reaction(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required_str("userId");
    let message_id = fields.required_str("messageId");
    let reaction = fields.required_str("reaction");
    let platform = fields.platform();
    fields.finish()?;

    let result = client_for(&state, platform)
        .send_reaction(&user_id, &message_id, &reaction)
        .await?;
    info!("Reacted to {} from {} on {}", message_id, user_id, platform);
    Ok(success(result))
}

/// `POST /api/send-notification`
///
/// Addressed either by `token` (one-time notification) or by `userId`
/// together with a message `tag`.
pub async fn send_notification(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let text = fields.required_str("message");
    let token = fields.optional_str("token");
    let platform = fields.platform();

    let notification = match token {
        Some(token) => Some(Notification::OneTime { token, text }),
        None => {
            let recipient_id = fields.required_str("userId");
            let tag = fields.required_str("tag");
            if tag.is_empty() {
                None
            } else {
                match tag.parse::<MessageTag>() {
                    Ok(tag) => Some(Notification::Tagged {
                        recipient_id,
                        tag,
                        text,
                    }),
                    Err(e) => {
                        fields.extend(e);
                        None
                    }
                }
            }
        }
    };
    fields.finish()?;
    let Some(notification) = notification else {
        return Err(ValidationError::missing("tag").into());
    };

    let result = client_for(&state, platform)
        .send_notification(&notification)
        .await?;
    info!("Sent notification on {}", platform);
    Ok(success(result))
}

// ============================================================================
// Indicators
// ============================================================================

/// `POST /api/mark-seen {userId}`
pub async fn mark_seen(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required_str("userId");
    let platform = fields.platform();
    fields.finish()?;

    let result = client_for(&state, platform).mark_seen(&user_id).await?;
    Ok(success(result))
}

/// `POST /api/typing {userId, on}`; `on` defaults to true
pub async fn typing(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>> {
    let body = parse_body(&body)?;
    let mut fields = Fields::new(&body);
    let user_id = fields.required_str("userId");
    let on = fields.optional_bool("on").unwrap_or(true);
    let platform = fields.platform();
    fields.finish()?;

    let result = client_for(&state, platform).typing(&user_id, on).await?;
    Ok(success(result))
}

// ============================================================================
// Reads
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ReadQuery {
    pub platform: Option<String>,
    pub fields: Option<String>,
    pub metrics: Option<String>,
    pub period: Option<String>,
}

impl ReadQuery {
    fn platform(&self, errors: &mut ValidationError) -> Platform {
        let platform = self.platform.as_deref().filter(|p| !p.trim().is_empty());
        platform_or_default(platform, errors)
    }

    fn fields(&self) -> Option<&str> {
        self.fields.as_deref().filter(|f| !f.trim().is_empty())
    }
}

/// Unwrap the query string, reporting a malformed one as a validation error
fn read_query(query: std::result::Result<Query<ReadQuery>, QueryRejection>) -> Result<ReadQuery> {
    match query {
        Ok(Query(query)) => Ok(query),
        Err(rejection) => Err(ValidationError::invalid("query", rejection.body_text()).into()),
    }
}

/// `GET /api/profile/{userId}?fields=&platform=`
pub async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: std::result::Result<Query<ReadQuery>, QueryRejection>,
) -> Result<Json<Value>> {
    let query = read_query(query)?;
    let mut errors = ValidationError::new();
    if let Err(e) = require_path_id("userId", &user_id) {
        errors.extend(e);
    }
    let platform = query.platform(&mut errors);
    errors.into_result()?;

    let result = client_for(&state, platform)
        .get_user_profile(&user_id, query.fields())
        .await?;
    Ok(success(result))
}

/// `GET /api/conversations?platform=&fields=`
pub async fn conversations(
    State(state): State<AppState>,
    query: std::result::Result<Query<ReadQuery>, QueryRejection>,
) -> Result<Json<Value>> {
    let query = read_query(query)?;
    let mut errors = ValidationError::new();
    let platform = query.platform(&mut errors);
    errors.into_result()?;

    let result = client_for(&state, platform)
        .get_conversations(query.fields())
        .await?;
    Ok(success(result))
}

/// `GET /api/insights?metrics=a,b&period=&platform=`
pub async fn insights(
    State(state): State<AppState>,
    query: std::result::Result<Query<ReadQuery>, QueryRejection>,
) -> Result<Json<Value>> {
    let query = read_query(query)?;
    let mut errors = ValidationError::new();
    let metrics: Vec<String> = query
        .metrics
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect();
    if metrics.is_empty() {
        errors.add_missing("metrics");
    }
    let platform = query.platform(&mut errors);
    errors.into_result()?;

    let period = query.period.as_deref().filter(|p| !p.trim().is_empty());
    let result = client_for(&state, platform)
        .get_insights(&metrics, period)
        .await?;
    Ok(success(result))
}
