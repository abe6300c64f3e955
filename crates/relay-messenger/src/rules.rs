//! Keyword response selection
//!
//! Pure and deterministic: lower-cased text is checked against an ordered
//! rule table by substring containment and the first match wins. Messages
//! that carry attachments instead of text are matched on the first
//! attachment's declared type. Nothing here performs I/O or logs.

use crate::event::{IncomingAttachment, IncomingMessage, MessagingEvent};
use crate::message::{Button, Element, OutboundMessage, QuickReply, ValidationError};

pub const GREETING_TEXT: &str =
    "Hello! 👋 Welcome. Type \"help\" to see what I can do, or \"menu\" for quick options.";
pub const CONTACT_TEXT: &str =
    "You can reach us at support@example.com or +1 555 0100, Monday to Friday 9:00-17:00.";
pub const THANKS_TEXT: &str = "You're welcome! Anything else I can help with?";
pub const GOODBYE_TEXT: &str = "Goodbye! Message us any time. 👋";
pub const FALLBACK_TEXT: &str =
    "Sorry, I didn't quite understand that. Type \"help\" to see what I can do.";

pub const IMAGE_ACK_TEXT: &str = "Thanks for the image! 📷 We'll take a look.";
pub const VIDEO_ACK_TEXT: &str = "Thanks for the video! 🎬 We'll take a look.";
pub const AUDIO_ACK_TEXT: &str = "Thanks for the voice message! 🎧 We'll listen shortly.";
pub const FILE_ACK_TEXT: &str = "Thanks for the file! 📎 We'll review it.";
pub const ATTACHMENT_FALLBACK_TEXT: &str = "Thanks for sharing! We received your attachment.";

const SITE_URL: &str = "https://example.com";
const SAMPLE_IMAGE_URL: &str = "https://example.com/static/welcome.png";

type Build = fn() -> Result<OutboundMessage, ValidationError>;

/// A keyword rule over message text
pub struct TextRule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    build: Build,
}

/// A rule over an attachment's declared type
pub struct AttachmentRule {
    pub name: &'static str,
    pub kind: &'static str,
    build: Build,
}

/// Text rules in match order. Earlier rules shadow later ones.
pub static TEXT_RULES: &[TextRule] = &[
    TextRule { name: "greeting", keywords: &["hello", "hi", "hey"], build: greeting },
    TextRule { name: "help", keywords: &["help", "support"], build: help },
    TextRule { name: "menu", keywords: &["menu", "options"], build: menu },
    TextRule { name: "products", keywords: &["product", "catalog", "shop"], build: products },
    TextRule { name: "pricing", keywords: &["price", "pricing", "cost"], build: pricing },
    TextRule { name: "image", keywords: &["image", "picture", "photo"], build: image },
    TextRule { name: "contact", keywords: &["contact", "phone", "email"], build: contact },
    TextRule { name: "thanks", keywords: &["thank"], build: thanks },
    TextRule { name: "goodbye", keywords: &["bye"], build: goodbye },
];

pub static ATTACHMENT_RULES: &[AttachmentRule] = &[
    AttachmentRule { name: "image", kind: "image", build: image_ack },
    AttachmentRule { name: "video", kind: "video", build: video_ack },
    AttachmentRule { name: "audio", kind: "audio", build: audio_ack },
    AttachmentRule { name: "file", kind: "file", build: file_ack },
];

pub const TEXT_FALLBACK_RULE: &str = "fallback";
pub const ATTACHMENT_FALLBACK_RULE: &str = "attachment_fallback";

/// What the user sent, as far as selection is concerned
#[derive(Debug, Clone, Copy)]
pub enum Inbound<'a> {
    Text(&'a str),
    Attachments(&'a [IncomingAttachment]),
}

impl<'a> Inbound<'a> {
    /// Text wins over attachments; an empty message selects on empty text.
    pub fn from_message(message: &'a IncomingMessage) -> Self {
        match (&message.text, &message.attachments) {
            (Some(text), _) if !text.trim().is_empty() => Inbound::Text(text),
            (_, Some(attachments)) if !attachments.is_empty() => Inbound::Attachments(attachments),
            _ => Inbound::Text(""),
        }
    }

    /// Messages are selected on their content, postbacks on their payload.
    ///
    /// `None` for events that carry neither (delivery and read signals).
    pub fn from_event(event: &'a MessagingEvent) -> Option<Self> {
        if let Some(message) = &event.message {
            return Some(Self::from_message(message));
        }
        event.postback.as_ref().map(|postback| {
            Inbound::Text(
                postback
                    .payload
                    .as_deref()
                    .or(postback.title.as_deref())
                    .unwrap_or(""),
            )
        })
    }
}

/// A selected reply and the rule that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub rule: &'static str,
    pub message: OutboundMessage,
}

/// First text rule whose keyword occurs in `text`, ignoring case
pub fn match_text_rule(text: &str) -> Option<&'static TextRule> {
    let lowered = text.to_lowercase();
    TEXT_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| lowered.contains(k)))
}

/// First attachment rule for the declared type
pub fn match_attachment_rule(kind: &str) -> Option<&'static AttachmentRule> {
    let kind = kind.to_lowercase();
    ATTACHMENT_RULES.iter().find(|rule| rule.kind == kind)
}

/// Pick the reply for an inbound message
pub fn select_reply(inbound: Inbound<'_>) -> Result<Reply, ValidationError> {
    let (rule, build): (&'static str, Build) = match inbound {
        Inbound::Text(text) => match match_text_rule(text) {
            Some(rule) => (rule.name, rule.build),
            None => (TEXT_FALLBACK_RULE, fallback as Build),
        },
        Inbound::Attachments(attachments) => {
            match attachments.first().and_then(|a| match_attachment_rule(&a.kind)) {
                Some(rule) => (rule.name, rule.build),
                None => (ATTACHMENT_FALLBACK_RULE, attachment_fallback as Build),
            }
        }
    };
    Ok(Reply {
        rule,
        message: build()?,
    })
}

// =============================================================================
// Canned replies
// =============================================================================

fn greeting() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(GREETING_TEXT)
}

fn help() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::quick_replies(
        "Here's what I can help with. Pick a topic:",
        vec![
            QuickReply::new("Products", "PRODUCTS"),
            QuickReply::new("Pricing", "PRICING"),
            QuickReply::new("Contact us", "CONTACT"),
        ],
    )
}

fn menu() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::button_template(
        "What would you like to do?",
        vec![
            Button::web_url("Visit our website", SITE_URL),
            Button::postback("Browse products", "PRODUCTS"),
            Button::phone_number("Call us", "+15550100"),
        ],
    )
}

fn products() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::generic_template(vec![
        Element::new("Classic T-Shirt")
            .subtitle("100% cotton, available in 6 colours")
            .image_url("https://example.com/static/tshirt.png")
            .default_action("https://example.com/products/tshirt")
            .button(Button::web_url("View", "https://example.com/products/tshirt"))
            .button(Button::postback("Pricing", "PRICING")),
        Element::new("Canvas Tote")
            .subtitle("Sturdy everyday bag")
            .image_url("https://example.com/static/tote.png")
            .default_action("https://example.com/products/tote")
            .button(Button::web_url("View", "https://example.com/products/tote"))
            .button(Button::postback("Pricing", "PRICING")),
    ])
}

fn pricing() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::list_template(
        vec![
            Element::new("Basic")
                .subtitle("$9 / month")
                .button(Button::postback("Subscribe", "SUBSCRIBE_BASIC")),
            Element::new("Pro")
                .subtitle("$29 / month")
                .button(Button::postback("Subscribe", "SUBSCRIBE_PRO")),
            Element::new("Business")
                .subtitle("Contact us for a quote")
                .button(Button::postback("Contact", "CONTACT")),
        ],
        vec![Button::web_url("Compare plans", "https://example.com/pricing")],
    )
}

fn image() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::image(SAMPLE_IMAGE_URL)
}

fn contact() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(CONTACT_TEXT)
}

fn thanks() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(THANKS_TEXT)
}

fn goodbye() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(GOODBYE_TEXT)
}

fn fallback() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(FALLBACK_TEXT)
}

fn image_ack() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(IMAGE_ACK_TEXT)
}

fn video_ack() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(VIDEO_ACK_TEXT)
}

fn audio_ack() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(AUDIO_ACK_TEXT)
}

fn file_ack() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(FILE_ACK_TEXT)
}

fn attachment_fallback() -> Result<OutboundMessage, ValidationError> {
    OutboundMessage::text(ATTACHMENT_FALLBACK_TEXT)
}
