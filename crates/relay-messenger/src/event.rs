//! Inbound webhook payloads

use serde::Deserialize;
use serde_json::Value;

use relay_core::Platform;

/// Top-level delivery body
///
/// `entry` is kept raw so the surface can be checked before the entries
/// are decoded.
#[derive(Debug, Deserialize)]
struct RawDelivery {
    object: Option<String>,
    #[serde(default)]
    entry: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    pub id: Option<String>,
    pub time: Option<i64>,
    pub messaging: Option<Vec<MessagingEvent>>,
}

impl WebhookEntry {
    /// Only the first messaging event of an entry is acted on.
    pub fn first_event(&self) -> Option<&MessagingEvent> {
        self.messaging.as_ref().and_then(|events| events.first())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: Party,
    pub recipient: Option<Party>,
    pub timestamp: Option<i64>,
    pub message: Option<IncomingMessage>,
    pub postback: Option<Postback>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Party {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub mid: Option<String>,
    pub text: Option<String>,
    pub quick_reply: Option<QuickReplyPayload>,
    pub attachments: Option<Vec<IncomingAttachment>>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuickReplyPayload {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingAttachment {
    /// Declared type: image, video, audio, file, ...
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Option<Value>,
}

/// Button tap
#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    pub title: Option<String>,
    pub payload: Option<String>,
}

/// Why a delivery body was turned away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryRejection {
    /// `object` names no known messaging surface
    UnknownObject(Option<String>),
    /// Body or entries could not be decoded
    Malformed(String),
}

/// Decode a delivery body into its surface and typed entries
pub fn parse_delivery(body: &[u8]) -> Result<(Platform, Vec<WebhookEntry>), DeliveryRejection> {
    let raw: RawDelivery =
        serde_json::from_slice(body).map_err(|e| DeliveryRejection::Malformed(e.to_string()))?;

    let platform = match raw.object.as_deref().and_then(Platform::from_webhook_object) {
        Some(platform) => platform,
        None => return Err(DeliveryRejection::UnknownObject(raw.object)),
    };

    let entries: Vec<WebhookEntry> = serde_json::from_value(raw.entry)
        .map_err(|e| DeliveryRejection::Malformed(e.to_string()))?;

    Ok((platform, entries))
}
