//! Delivery processing for webhook events
//!
//! For each entry only the first messaging event is handled. The outbound
//! sequence per event is mark seen, typing on, reply, typing off, awaited
//! one after another. Indicator failures never block the reply, and a
//! failed reply falls back to one plain apology text.
//!
//! The handler does not log. It returns an [`EntryOutcome`] per entry so
//! the caller can report what happened.

use relay_core::Platform;

use crate::api::{MessagingClient, PlatformClients};
use crate::error::MessengerError;
use crate::event::{MessagingEvent, WebhookEntry};
use crate::rules::{Inbound, select_reply};

/// Text sent when the selected reply could not be built or delivered
pub const ERROR_FALLBACK_TEXT: &str =
    "Sorry, something went wrong on our side. Please try again in a moment.";

/// Result of a call whose failure is tolerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort {
    Done,
    /// The call failed and the failure was intentionally not propagated
    Ignored(String),
}

impl BestEffort {
    fn from_result<T>(result: Result<T, MessengerError>) -> Self {
        match result {
            Ok(_) => Self::Done,
            Err(e) => Self::Ignored(e.to_string()),
        }
    }
}

/// What happened to the reply step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The selected reply was delivered
    Sent { rule: &'static str },
    /// Selection or delivery failed; the apology text was attempted instead
    Fallback {
        rule: Option<&'static str>,
        error: String,
        fallback: BestEffort,
    },
}

/// Report for one processed messaging event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub sender_id: String,
    pub seen: BestEffort,
    pub typing_on: BestEffort,
    pub reply: ReplyOutcome,
    pub typing_off: BestEffort,
}

/// Report for one webhook entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The entry had no messaging events
    Skipped,
    /// The event needs no reply (echo, delivery or read signal)
    Acknowledged { sender_id: String, reason: &'static str },
    Processed(EventOutcome),
}

/// Turns webhook entries into outbound calls
#[derive(Clone)]
pub struct DeliveryHandler {
    clients: PlatformClients,
}

impl DeliveryHandler {
    /// Create a new delivery handler
    pub fn new(clients: PlatformClients) -> Self {
        Self { clients }
    }

    /// Process every entry of a delivery, in order
    pub async fn process_entries(
        &self,
        platform: Platform,
        entries: &[WebhookEntry],
    ) -> Vec<EntryOutcome> {
        let client = self.clients.get(platform).as_ref();
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(process_entry(client, entry).await);
        }
        outcomes
    }
}

/// Handle the first messaging event of an entry
pub async fn process_entry(client: &dyn MessagingClient, entry: &WebhookEntry) -> EntryOutcome {
    match entry.first_event() {
        Some(event) => process_event(client, event).await,
        None => EntryOutcome::Skipped,
    }
}

/// Handle one messaging event
pub async fn process_event(client: &dyn MessagingClient, event: &MessagingEvent) -> EntryOutcome {
    let sender_id = event.sender.id.as_str();

    if event.message.as_ref().is_some_and(|m| m.is_echo) {
        return EntryOutcome::Acknowledged {
            sender_id: sender_id.to_string(),
            reason: "echo",
        };
    }

    let Some(inbound) = Inbound::from_event(event) else {
        return EntryOutcome::Acknowledged {
            sender_id: sender_id.to_string(),
            reason: "no message",
        };
    };

    let seen = BestEffort::from_result(client.mark_seen(sender_id).await);
    let typing_on = BestEffort::from_result(client.typing(sender_id, true).await);
    let reply = reply(client, sender_id, inbound).await;
    let typing_off = BestEffort::from_result(client.typing(sender_id, false).await);

    EntryOutcome::Processed(EventOutcome {
        sender_id: sender_id.to_string(),
        seen,
        typing_on,
        reply,
        typing_off,
    })
}

async fn reply(client: &dyn MessagingClient, sender_id: &str, inbound: Inbound<'_>) -> ReplyOutcome {
    let (rule, error) = match select_reply(inbound) {
        Ok(selected) => match client.send_message(sender_id, &selected.message).await {
            Ok(_) => return ReplyOutcome::Sent { rule: selected.rule },
            Err(e) => (Some(selected.rule), e.to_string()),
        },
        Err(e) => (None, e.to_string()),
    };

    let fallback = BestEffort::from_result(client.send_text(sender_id, ERROR_FALLBACK_TEXT).await);
    ReplyOutcome::Fallback {
        rule,
        error,
        fallback,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Result;
    use crate::event::parse_delivery;
    use crate::message::{Notification, OutboundMessage};
    use crate::rules::{FALLBACK_TEXT, GREETING_TEXT};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    /// Outbound call as seen by [`RecordingClient`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        MarkSeen(String),
        Typing(String, bool),
        Send(String, OutboundMessage),
        Other(&'static str),
    }

    /// Records calls in order and fails the ones it is told to
    #[derive(Default)]
    pub struct RecordingClient {
        pub calls: Mutex<Vec<Call>>,
        pub fail_indicators: bool,
        /// Number of `send_message` calls to fail before succeeding
        pub fail_sends: Mutex<usize>,
    }

    impl RecordingClient {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn indicator_result(&self) -> Result<Value> {
            if self.fail_indicators {
                Err(MessengerError::Transport("connection reset".to_string()))
            } else {
                Ok(json!({"recipient_id": "42"}))
            }
        }
    }

    #[async_trait]
    impl MessagingClient for RecordingClient {
        fn platform(&self) -> Platform {
            Platform::Messenger
        }

        async fn send_message(&self, recipient_id: &str, message: &OutboundMessage) -> Result<Value> {
            self.record(Call::Send(recipient_id.to_string(), message.clone()));
            let mut remaining = self.fail_sends.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MessengerError::RemoteApi {
                    message: "(#10) Outside of allowed window".to_string(),
                    code: Some(10),
                    error_type: None,
                });
            }
            Ok(json!({"recipient_id": recipient_id, "message_id": "m_1"}))
        }

        async fn send_reaction(&self, _: &str, _: &str, _: &str) -> Result<Value> {
            self.record(Call::Other("send_reaction"));
            Ok(Value::Null)
        }

        async fn send_notification(&self, _: &Notification) -> Result<Value> {
            self.record(Call::Other("send_notification"));
            Ok(Value::Null)
        }

        async fn mark_seen(&self, recipient_id: &str) -> Result<Value> {
            self.record(Call::MarkSeen(recipient_id.to_string()));
            self.indicator_result()
        }

        async fn typing(&self, recipient_id: &str, on: bool) -> Result<Value> {
            self.record(Call::Typing(recipient_id.to_string(), on));
            self.indicator_result()
        }

        async fn get_user_profile(&self, _: &str, _: Option<&str>) -> Result<Value> {
            self.record(Call::Other("get_user_profile"));
            Ok(Value::Null)
        }

        async fn get_conversations(&self, _: Option<&str>) -> Result<Value> {
            self.record(Call::Other("get_conversations"));
            Ok(Value::Null)
        }

        async fn get_insights(&self, _: &[String], _: Option<&str>) -> Result<Value> {
            self.record(Call::Other("get_insights"));
            Ok(Value::Null)
        }
    }

    pub fn handler_with(client: Arc<RecordingClient>) -> DeliveryHandler {
        DeliveryHandler::new(PlatformClients::new(client.clone(), client))
    }

    fn text(s: &str) -> OutboundMessage {
        OutboundMessage::Text(s.to_string())
    }

    #[tokio::test]
    async fn test_greeting_call_sequence() {
        let client = Arc::new(RecordingClient::default());
        let handler = handler_with(client.clone());
        let (platform, entries) = parse_delivery(
            br#"{"object":"page","entry":[{"id":"1","time":1,"messaging":[{"sender":{"id":"42"},"message":{"text":"Hi"}}]}]}"#,
        )
        .unwrap();

        let outcomes = handler.process_entries(platform, &entries).await;

        assert_eq!(
            client.calls(),
            vec![
                Call::MarkSeen("42".into()),
                Call::Typing("42".into(), true),
                Call::Send("42".into(), text(GREETING_TEXT)),
                Call::Typing("42".into(), false),
            ]
        );
        assert_eq!(
            outcomes,
            vec![EntryOutcome::Processed(EventOutcome {
                sender_id: "42".into(),
                seen: BestEffort::Done,
                typing_on: BestEffort::Done,
                reply: ReplyOutcome::Sent { rule: "greeting" },
                typing_off: BestEffort::Done,
            })]
        );
    }

    #[tokio::test]
    async fn test_unmatched_text_sends_exactly_one_fallback() {
        let client = Arc::new(RecordingClient::default());
        let handler = handler_with(client.clone());
        let (platform, entries) = parse_delivery(
            br#"{"object":"page","entry":[{"messaging":[{"sender":{"id":"7"},"message":{"text":"qwerty"}}]}]}"#,
        )
        .unwrap();

        handler.process_entries(platform, &entries).await;

        let sends: Vec<_> = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Send(..)))
            .collect();
        assert_eq!(sends, vec![Call::Send("7".into(), text(FALLBACK_TEXT))]);
    }

    #[tokio::test]
    async fn test_only_first_event_per_entry() {
        let client = Arc::new(RecordingClient::default());
        let handler = handler_with(client.clone());
        let (platform, entries) = parse_delivery(
            br#"{"object":"instagram","entry":[
                {"messaging":[
                    {"sender":{"id":"a"},"message":{"text":"hello"}},
                    {"sender":{"id":"b"},"message":{"text":"hello"}}
                ]},
                {"messaging":[]},
                {"messaging":[{"sender":{"id":"c"},"message":{"text":"bye"}}]}
            ]}"#,
        )
        .unwrap();

        let outcomes = handler.process_entries(platform, &entries).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[1], EntryOutcome::Skipped);
        let senders: Vec<String> = client
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::MarkSeen(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(senders, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_indicator_failures_are_observed_not_raised() {
        let client = Arc::new(RecordingClient {
            fail_indicators: true,
            ..Default::default()
        });
        let handler = handler_with(client.clone());
        let (platform, entries) = parse_delivery(
            br#"{"object":"page","entry":[{"messaging":[{"sender":{"id":"42"},"message":{"text":"thanks"}}]}]}"#,
        )
        .unwrap();

        let outcomes = handler.process_entries(platform, &entries).await;

        let EntryOutcome::Processed(outcome) = &outcomes[0] else {
            panic!("expected a processed event, got {:?}", outcomes[0]);
        };
        assert!(matches!(outcome.seen, BestEffort::Ignored(ref e) if e.contains("connection reset")));
        assert!(matches!(outcome.typing_on, BestEffort::Ignored(_)));
        assert!(matches!(outcome.typing_off, BestEffort::Ignored(_)));
        assert_eq!(outcome.reply, ReplyOutcome::Sent { rule: "thanks" });
        assert_eq!(client.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_reply_sends_fallback_text() {
        let client = Arc::new(RecordingClient {
            fail_sends: Mutex::new(1),
            ..Default::default()
        });
        let handler = handler_with(client.clone());
        let (platform, entries) = parse_delivery(
            br#"{"object":"page","entry":[{"messaging":[{"sender":{"id":"42"},"message":{"text":"menu"}}]}]}"#,
        )
        .unwrap();

        let outcomes = handler.process_entries(platform, &entries).await;

        let calls = client.calls();
        assert_eq!(calls.len(), 5);
        assert!(matches!(&calls[2], Call::Send(_, m) if m.kind() == "button_template"));
        assert_eq!(calls[3], Call::Send("42".into(), text(ERROR_FALLBACK_TEXT)));
        assert_eq!(calls[4], Call::Typing("42".into(), false));

        let EntryOutcome::Processed(outcome) = &outcomes[0] else {
            panic!("expected a processed event");
        };
        assert_eq!(
            outcome.reply,
            ReplyOutcome::Fallback {
                rule: Some("menu"),
                error: "(#10) Outside of allowed window".to_string(),
                fallback: BestEffort::Done,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_fallback_is_recorded() {
        let client = Arc::new(RecordingClient {
            fail_sends: Mutex::new(2),
            ..Default::default()
        });
        let handler = handler_with(client.clone());
        let (platform, entries) = parse_delivery(
            br#"{"object":"page","entry":[{"messaging":[{"sender":{"id":"42"},"message":{"text":"hi"}}]}]}"#,
        )
        .unwrap();

        let outcomes = handler.process_entries(platform, &entries).await;

        let EntryOutcome::Processed(outcome) = &outcomes[0] else {
            panic!("expected a processed event");
        };
        assert!(matches!(
            outcome.reply,
            ReplyOutcome::Fallback { fallback: BestEffort::Ignored(_), .. }
        ));
        assert_eq!(client.calls().last(), Some(&Call::Typing("42".into(), false)));
    }

    #[tokio::test]
    async fn test_echo_and_receipts_are_acknowledged_silently() {
        let client = Arc::new(RecordingClient::default());
        let handler = handler_with(client.clone());
        let (platform, entries) = parse_delivery(
            br#"{"object":"page","entry":[
                {"messaging":[{"sender":{"id":"page"},"message":{"text":"hi","is_echo":true}}]},
                {"messaging":[{"sender":{"id":"42"},"timestamp":5}]}
            ]}"#,
        )
        .unwrap();

        let outcomes = handler.process_entries(platform, &entries).await;

        assert!(client.calls().is_empty());
        assert_eq!(
            outcomes,
            vec![
                EntryOutcome::Acknowledged { sender_id: "page".into(), reason: "echo" },
                EntryOutcome::Acknowledged { sender_id: "42".into(), reason: "no message" },
            ]
        );
    }

    #[tokio::test]
    async fn test_postback_payload_is_selected_on() {
        let client = Arc::new(RecordingClient::default());
        let handler = handler_with(client.clone());
        let (platform, entries) = parse_delivery(
            br#"{"object":"page","entry":[{"messaging":[{"sender":{"id":"42"},"postback":{"title":"Browse products","payload":"PRODUCTS"}}]}]}"#,
        )
        .unwrap();

        let outcomes = handler.process_entries(platform, &entries).await;

        let EntryOutcome::Processed(outcome) = &outcomes[0] else {
            panic!("expected a processed event");
        };
        assert_eq!(outcome.reply, ReplyOutcome::Sent { rule: "products" });
    }
}
