//! Outbound message payloads
//!
//! Every kind of message the relay can send is a variant of
//! [`OutboundMessage`]. Constructors validate the variant's required fields
//! against the Graph API limits, and [`OutboundMessage::validate`] re-checks
//! a value before it goes on the wire.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};

/// Maximum text length accepted by the Send API
pub const MAX_TEXT_LEN: usize = 2000;
/// Maximum text length of a button template
pub const MAX_BUTTON_TEMPLATE_TEXT_LEN: usize = 640;
/// Maximum title length for buttons and quick replies
pub const MAX_TITLE_LEN: usize = 20;
pub const MAX_QUICK_REPLIES: usize = 13;
pub const MAX_BUTTONS: usize = 3;
pub const MAX_GENERIC_ELEMENTS: usize = 10;
pub const MIN_LIST_ELEMENTS: usize = 2;
pub const MAX_LIST_ELEMENTS: usize = 4;

// =============================================================================
// Validation
// =============================================================================

/// A field that was present but not acceptable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidField {
    pub field: String,
    pub reason: String,
}

/// Caller input that is missing or malformed, with field-level detail
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationError {
    pub missing: Vec<String>,
    pub invalid: Vec<InvalidField>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing(field: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.add_missing(field);
        err
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.add_invalid(field, reason);
        err
    }

    pub fn add_missing(&mut self, field: impl Into<String>) {
        self.missing.push(field.into());
    }

    pub fn add_invalid(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.invalid.push(InvalidField {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Prefix every recorded field name, e.g. `buttons[0].` + `title`
    pub fn prefixed(mut self, prefix: &str) -> Self {
        for field in &mut self.missing {
            *field = format!("{}{}", prefix, field);
        }
        for invalid in &mut self.invalid {
            invalid.field = format!("{}{}", prefix, invalid.field);
        }
        self
    }

    /// Merge another error's fields into this one
    pub fn extend(&mut self, other: ValidationError) {
        self.missing.extend(other.missing);
        self.invalid.extend(other.invalid);
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("Missing required fields: {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            let invalid = self
                .invalid
                .iter()
                .map(|i| format!("{} ({})", i.field, i.reason))
                .collect::<Vec<_>>()
                .join(", ");
            parts.push(format!("Invalid fields: {}", invalid));
        }
        if parts.is_empty() {
            f.write_str("Validation failed")
        } else {
            f.write_str(&parts.join("; "))
        }
    }
}

impl std::error::Error for ValidationError {}

fn check_text(err: &mut ValidationError, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        err.add_missing(field);
    } else if value.chars().count() > max {
        err.add_invalid(field, format!("must be at most {} characters", max));
    }
}

fn check_count(err: &mut ValidationError, field: &str, len: usize, min: usize, max: usize) {
    if len == 0 && min > 0 {
        err.add_missing(field);
    } else if len < min || len > max {
        err.add_invalid(field, format!("must contain {}..={} items", min, max));
    }
}

// =============================================================================
// Building blocks
// =============================================================================

/// Suggestion chip sent alongside a text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickReply {
    pub title: String,
    pub payload: String,
    pub image_url: Option<String>,
}

impl QuickReply {
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            payload: payload.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();
        check_text(&mut err, "title", &self.title, MAX_TITLE_LEN);
        if self.payload.trim().is_empty() {
            err.add_missing("payload");
        }
        err.into_result()
    }

    fn to_json(&self) -> Value {
        let mut value = json!({
            "content_type": "text",
            "title": self.title,
            "payload": self.payload,
        });
        if let Some(url) = &self.image_url {
            value["image_url"] = json!(url);
        }
        value
    }
}

/// Template button
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Button {
    /// Opens a URL
    WebUrl { title: String, url: String },
    /// Sends `payload` back through the webhook
    Postback { title: String, payload: String },
    /// Dials the number in `payload`
    PhoneNumber { title: String, payload: String },
}

impl Button {
    pub fn web_url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self::WebUrl {
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn postback(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Postback {
            title: title.into(),
            payload: payload.into(),
        }
    }

    pub fn phone_number(title: impl Into<String>, number: impl Into<String>) -> Self {
        Self::PhoneNumber {
            title: title.into(),
            payload: number.into(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::WebUrl { title, .. }
            | Self::Postback { title, .. }
            | Self::PhoneNumber { title, .. } => title,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();
        check_text(&mut err, "title", self.title(), MAX_TITLE_LEN);
        let (field, target) = match self {
            Self::WebUrl { url, .. } => ("url", url),
            Self::Postback { payload, .. } | Self::PhoneNumber { payload, .. } => {
                ("payload", payload)
            }
        };
        if target.trim().is_empty() {
            err.add_missing(field);
        } else if let Self::WebUrl { url, .. } = self {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                err.add_invalid("url", "must be an http(s) URL");
            }
        }
        err.into_result()
    }
}

/// Action taken when an element itself is tapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultAction {
    #[serde(rename = "type")]
    kind: &'static str,
    pub url: String,
}

impl DefaultAction {
    pub fn web_url(url: impl Into<String>) -> Self {
        Self {
            kind: "web_url",
            url: url.into(),
        }
    }
}

/// Card used by generic and list templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_action: Option<DefaultAction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

impl Element {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            image_url: None,
            default_action: None,
            buttons: Vec::new(),
        }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn default_action(mut self, url: impl Into<String>) -> Self {
        self.default_action = Some(DefaultAction::web_url(url));
        self
    }

    pub fn button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }

    fn validate(&self, max_buttons: usize) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();
        if self.title.trim().is_empty() {
            err.add_missing("title");
        }
        if self.buttons.len() > max_buttons {
            err.add_invalid("buttons", format!("must contain at most {} items", max_buttons));
        }
        for (i, button) in self.buttons.iter().enumerate() {
            if let Err(e) = button.validate() {
                err.extend(e.prefixed(&format!("buttons[{}].", i)));
            }
        }
        err.into_result()
    }
}

// =============================================================================
// Outbound message
// =============================================================================

/// A message to deliver to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Image {
        url: String,
    },
    QuickReplies {
        text: String,
        replies: Vec<QuickReply>,
    },
    ButtonTemplate {
        text: String,
        buttons: Vec<Button>,
    },
    GenericTemplate {
        elements: Vec<Element>,
    },
    /// Vertical list; `buttons` holds the optional footer button
    ListTemplate {
        elements: Vec<Element>,
        buttons: Vec<Button>,
    },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Result<Self, ValidationError> {
        Self::Text(text.into()).validated()
    }

    pub fn image(url: impl Into<String>) -> Result<Self, ValidationError> {
        Self::Image { url: url.into() }.validated()
    }

    pub fn quick_replies(
        text: impl Into<String>,
        replies: Vec<QuickReply>,
    ) -> Result<Self, ValidationError> {
        Self::QuickReplies {
            text: text.into(),
            replies,
        }
        .validated()
    }

    pub fn button_template(
        text: impl Into<String>,
        buttons: Vec<Button>,
    ) -> Result<Self, ValidationError> {
        Self::ButtonTemplate {
            text: text.into(),
            buttons,
        }
        .validated()
    }

    pub fn generic_template(elements: Vec<Element>) -> Result<Self, ValidationError> {
        Self::GenericTemplate { elements }.validated()
    }

    pub fn list_template(
        elements: Vec<Element>,
        buttons: Vec<Button>,
    ) -> Result<Self, ValidationError> {
        Self::ListTemplate { elements, buttons }.validated()
    }

    fn validated(self) -> Result<Self, ValidationError> {
        self.validate()?;
        Ok(self)
    }

    /// Short name of the variant, used in logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image { .. } => "image",
            Self::QuickReplies { .. } => "quick_replies",
            Self::ButtonTemplate { .. } => "button_template",
            Self::GenericTemplate { .. } => "generic_template",
            Self::ListTemplate { .. } => "list_template",
        }
    }

    /// Check the variant's required fields and limits
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();
        match self {
            Self::Text(text) => check_text(&mut err, "text", text, MAX_TEXT_LEN),
            Self::Image { url } => {
                if url.trim().is_empty() {
                    err.add_missing("url");
                } else if !(url.starts_with("https://") || url.starts_with("http://")) {
                    err.add_invalid("url", "must be an http(s) URL");
                }
            }
            Self::QuickReplies { text, replies } => {
                check_text(&mut err, "text", text, MAX_TEXT_LEN);
                check_count(&mut err, "quick_replies", replies.len(), 1, MAX_QUICK_REPLIES);
                for (i, reply) in replies.iter().enumerate() {
                    if let Err(e) = reply.validate() {
                        err.extend(e.prefixed(&format!("quick_replies[{}].", i)));
                    }
                }
            }
            Self::ButtonTemplate { text, buttons } => {
                check_text(&mut err, "text", text, MAX_BUTTON_TEMPLATE_TEXT_LEN);
                check_count(&mut err, "buttons", buttons.len(), 1, MAX_BUTTONS);
                for (i, button) in buttons.iter().enumerate() {
                    if let Err(e) = button.validate() {
                        err.extend(e.prefixed(&format!("buttons[{}].", i)));
                    }
                }
            }
            Self::GenericTemplate { elements } => {
                check_count(&mut err, "elements", elements.len(), 1, MAX_GENERIC_ELEMENTS);
                for (i, element) in elements.iter().enumerate() {
                    if let Err(e) = element.validate(MAX_BUTTONS) {
                        err.extend(e.prefixed(&format!("elements[{}].", i)));
                    }
                }
            }
            Self::ListTemplate { elements, buttons } => {
                check_count(
                    &mut err,
                    "elements",
                    elements.len(),
                    MIN_LIST_ELEMENTS,
                    MAX_LIST_ELEMENTS,
                );
                for (i, element) in elements.iter().enumerate() {
                    if let Err(e) = element.validate(1) {
                        err.extend(e.prefixed(&format!("elements[{}].", i)));
                    }
                }
                if buttons.len() > 1 {
                    err.add_invalid("buttons", "must contain at most 1 item");
                }
                for (i, button) in buttons.iter().enumerate() {
                    if let Err(e) = button.validate() {
                        err.extend(e.prefixed(&format!("buttons[{}].", i)));
                    }
                }
            }
        }
        err.into_result()
    }

    /// The Send API `message` object for this variant
    pub fn to_message_json(&self) -> Value {
        match self {
            Self::Text(text) => json!({ "text": text }),
            Self::Image { url } => json!({
                "attachment": {
                    "type": "image",
                    "payload": { "url": url, "is_reusable": true }
                }
            }),
            Self::QuickReplies { text, replies } => json!({
                "text": text,
                "quick_replies": replies.iter().map(QuickReply::to_json).collect::<Vec<_>>(),
            }),
            Self::ButtonTemplate { text, buttons } => template(json!({
                "template_type": "button",
                "text": text,
                "buttons": buttons,
            })),
            Self::GenericTemplate { elements } => template(json!({
                "template_type": "generic",
                "elements": elements,
            })),
            Self::ListTemplate { elements, buttons } => {
                let mut payload = json!({
                    "template_type": "list",
                    "top_element_style": "compact",
                    "elements": elements,
                });
                if !buttons.is_empty() {
                    payload["buttons"] = json!(buttons);
                }
                template(payload)
            }
        }
    }
}

fn template(payload: Value) -> Value {
    json!({
        "attachment": {
            "type": "template",
            "payload": payload,
        }
    })
}

// =============================================================================
// Notifications
// =============================================================================

/// Policy tags that allow messaging outside the 24h window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTag {
    ConfirmedEventUpdate,
    PostPurchaseUpdate,
    AccountUpdate,
    HumanAgent,
}

impl MessageTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmedEventUpdate => "CONFIRMED_EVENT_UPDATE",
            Self::PostPurchaseUpdate => "POST_PURCHASE_UPDATE",
            Self::AccountUpdate => "ACCOUNT_UPDATE",
            Self::HumanAgent => "HUMAN_AGENT",
        }
    }
}

impl FromStr for MessageTag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CONFIRMED_EVENT_UPDATE" => Ok(Self::ConfirmedEventUpdate),
            "POST_PURCHASE_UPDATE" => Ok(Self::PostPurchaseUpdate),
            "ACCOUNT_UPDATE" => Ok(Self::AccountUpdate),
            "HUMAN_AGENT" => Ok(Self::HumanAgent),
            _ => Err(ValidationError::invalid("tag", format!("unknown message tag '{}'", s))),
        }
    }
}

/// Message sent outside the normal session-response window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Addressed by PSID and permitted by a policy tag
    Tagged {
        recipient_id: String,
        tag: MessageTag,
        text: String,
    },
    /// Addressed by a one-time notification token the user opted into
    OneTime { token: String, text: String },
}

impl Notification {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::new();
        match self {
            Self::Tagged {
                recipient_id, text, ..
            } => {
                if recipient_id.trim().is_empty() {
                    err.add_missing("recipient_id");
                }
                check_text(&mut err, "text", text, MAX_TEXT_LEN);
            }
            Self::OneTime { token, text } => {
                if token.trim().is_empty() {
                    err.add_missing("token");
                }
                check_text(&mut err, "text", text, MAX_TEXT_LEN);
            }
        }
        err.into_result()
    }

    /// Full Send API body for this notification
    pub fn to_request_json(&self) -> Value {
        match self {
            Self::Tagged {
                recipient_id,
                tag,
                text,
            } => json!({
                "recipient": { "id": recipient_id },
                "messaging_type": "MESSAGE_TAG",
                "tag": tag.as_str(),
                "message": { "text": text },
            }),
            Self::OneTime { token, text } => json!({
                "recipient": { "one_time_notif_token": token },
                "message": { "text": text },
            }),
        }
    }
}
