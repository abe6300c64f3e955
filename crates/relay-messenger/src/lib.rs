//! relay-messenger: Messenger and Instagram messaging for meta-relay
//!
//! Graph API client, webhook handshake and delivery handling, and the
//! keyword rules that pick a reply for each inbound message.

pub mod api;
pub mod error;
pub mod event;
pub mod handler;
pub mod message;
pub mod rules;
pub mod webhook;

pub use api::{GraphApi, MessagingClient, PlatformClients, require_path_id};
pub use error::{MessengerError, Result};
pub use handler::{BestEffort, DeliveryHandler, EntryOutcome, EventOutcome, ReplyOutcome};
pub use message::{
    Button, Element, MessageTag, Notification, OutboundMessage, QuickReply, ValidationError,
};
pub use webhook::{WebhookState, create_webhook_router};
