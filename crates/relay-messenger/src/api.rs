//! Graph API client for Messenger and Instagram messaging

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::{Value, json};
use tracing::{debug, error, info};

use relay_core::{ClientConfig, Config, Platform};

use crate::error::{MessengerError, Result};
use crate::message::{Notification, OutboundMessage, ValidationError};

/// Profile fields requested when the caller does not name any
pub const MESSENGER_PROFILE_FIELDS: &str = "first_name,last_name,profile_pic";
pub const INSTAGRAM_PROFILE_FIELDS: &str = "name,username,profile_pic";

const DEFAULT_INSIGHTS_PERIOD: &str = "day";

/// Outbound operations against one platform.
///
/// Every call returns the decoded JSON body of the remote response.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Platform this client is routed to
    fn platform(&self) -> Platform;

    /// Deliver any [`OutboundMessage`] variant
    async fn send_message(&self, recipient_id: &str, message: &OutboundMessage) -> Result<Value>;

    /// React to a message the user sent earlier
    async fn send_reaction(
        &self,
        recipient_id: &str,
        message_id: &str,
        reaction: &str,
    ) -> Result<Value>;

    async fn send_notification(&self, notification: &Notification) -> Result<Value>;

    async fn mark_seen(&self, recipient_id: &str) -> Result<Value>;

    async fn typing(&self, recipient_id: &str, on: bool) -> Result<Value>;

    async fn get_user_profile(&self, user_id: &str, fields: Option<&str>) -> Result<Value>;

    async fn get_conversations(&self, fields: Option<&str>) -> Result<Value>;

    async fn get_insights(&self, metrics: &[String], period: Option<&str>) -> Result<Value>;

    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<Value> {
        let message = OutboundMessage::text(text)?;
        self.send_message(recipient_id, &message).await
    }

    async fn send_image(&self, recipient_id: &str, url: &str) -> Result<Value> {
        let message = OutboundMessage::image(url)?;
        self.send_message(recipient_id, &message).await
    }
}

/// `sender_action` values of the Send API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SenderAction {
    MarkSeen,
    TypingOn,
    TypingOff,
}

impl SenderAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::MarkSeen => "mark_seen",
            Self::TypingOn => "typing_on",
            Self::TypingOff => "typing_off",
        }
    }
}

/// reqwest-backed Graph API client
#[derive(Clone)]
pub struct GraphApi {
    client: Client,
    config: ClientConfig,
    platform: Platform,
}

impl GraphApi {
    /// Create a new Graph API client
    pub fn new(config: ClientConfig, platform: Platform) -> Self {
        Self {
            client: Client::new(),
            config,
            platform,
        }
    }

    /// Client using the credentials configured for `platform`
    pub fn for_platform(config: &Config, platform: Platform) -> Self {
        Self::new(config.client(platform).clone(), platform)
    }

    fn messages_path(&self) -> String {
        format!("{}/messages", self.config.account_id)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.config.endpoint(path);
        debug!("POST {} ({}): {}", path, self.platform, body);

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", &self.config.access_token)])
            .json(body)
            .send()
            .await?;

        Self::decode(path, response).await
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.config.endpoint(path);
        debug!("GET {} ({}): {:?}", path, self.platform, params);

        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        query.push(("access_token", self.config.access_token.as_str()));

        let response = self.client.get(&url).query(&query).send().await?;

        Self::decode(path, response).await
    }

    /// Classify a response as success, HTTP failure, or provider error
    async fn decode(path: &str, response: Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        debug!("Graph API response for {}: {} - {}", path, status, body);

        let parsed: Option<Value> = if body.trim().is_empty() {
            Some(Value::Null)
        } else {
            serde_json::from_str(&body).ok()
        };

        if !status.is_success() {
            let message = parsed
                .as_ref()
                .and_then(|v| v.get("error"))
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    if body.is_empty() {
                        status.canonical_reason().unwrap_or("unknown status").to_string()
                    } else {
                        body.clone()
                    }
                });
            error!("Graph API error on {}: {} - {}", path, status, message);
            return Err(MessengerError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let value = parsed.ok_or_else(|| {
            MessengerError::Transport(format!("response body is not valid JSON: {}", body))
        })?;

        if let Some(remote) = value.get("error").filter(|e| e.is_object()) {
            let message = remote
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Graph API error")
                .to_string();
            error!("Graph API reported an error on {}: {}", path, message);
            return Err(MessengerError::RemoteApi {
                message,
                code: remote.get("code").and_then(Value::as_i64),
                error_type: remote.get("type").and_then(Value::as_str).map(str::to_string),
            });
        }

        Ok(value)
    }

    async fn sender_action(&self, recipient_id: &str, action: SenderAction) -> Result<Value> {
        require_id("recipient_id", recipient_id)?;
        let body = json!({
            "recipient": { "id": recipient_id },
            "sender_action": action.as_str(),
        });
        self.post(&self.messages_path(), &body).await
    }
}

/// Check an id that is spliced into the request path.
///
/// Only ASCII letters, digits, `_` and `-` are accepted, so the id always
/// names a single node under `{domain}/{version}/`.
pub fn require_path_id(field: &str, value: &str) -> std::result::Result<(), ValidationError> {
    require_id(field, value)?;
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(ValidationError::invalid(
            field,
            "must contain only letters, digits, '_' or '-'",
        ))
    }
}

fn require_id(field: &str, value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::missing(field))
    } else {
        Ok(())
    }
}

#[async_trait]
impl MessagingClient for GraphApi {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn send_message(&self, recipient_id: &str, message: &OutboundMessage) -> Result<Value> {
        require_id("recipient_id", recipient_id)?;
        message.validate()?;

        let body = json!({
            "recipient": { "id": recipient_id },
            "messaging_type": "RESPONSE",
            "message": message.to_message_json(),
        });

        let result = self.post(&self.messages_path(), &body).await?;
        info!(
            "Sent {} to {} via {}: {:?}",
            message.kind(),
            recipient_id,
            self.platform,
            result.get("message_id")
        );
        Ok(result)
    }

    async fn send_reaction(
        &self,
        recipient_id: &str,
        message_id: &str,
        reaction: &str,
    ) -> Result<Value> {
        let mut err = ValidationError::new();
        for (field, value) in [
            ("recipient_id", recipient_id),
            ("message_id", message_id),
            ("reaction", reaction),
        ] {
            if value.trim().is_empty() {
                err.add_missing(field);
            }
        }
        err.into_result()?;

        let body = json!({
            "recipient": { "id": recipient_id },
            "sender_action": "react",
            "payload": {
                "message_id": message_id,
                "reaction": reaction,
            },
        });
        self.post(&self.messages_path(), &body).await
    }

    async fn send_notification(&self, notification: &Notification) -> Result<Value> {
        notification.validate()?;
        self.post(&self.messages_path(), &notification.to_request_json())
            .await
    }

    async fn mark_seen(&self, recipient_id: &str) -> Result<Value> {
        self.sender_action(recipient_id, SenderAction::MarkSeen).await
    }

    async fn typing(&self, recipient_id: &str, on: bool) -> Result<Value> {
        let action = if on {
            SenderAction::TypingOn
        } else {
            SenderAction::TypingOff
        };
        self.sender_action(recipient_id, action).await
    }

    async fn get_user_profile(&self, user_id: &str, fields: Option<&str>) -> Result<Value> {
        require_path_id("user_id", user_id)?;
        let fields = fields.unwrap_or(match self.platform {
            Platform::Messenger => MESSENGER_PROFILE_FIELDS,
            Platform::Instagram => INSTAGRAM_PROFILE_FIELDS,
        });
        self.get(user_id, &[("fields", fields.to_string())]).await
    }

    async fn get_conversations(&self, fields: Option<&str>) -> Result<Value> {
        let mut params = Vec::new();
        if self.platform == Platform::Instagram {
            params.push(("platform", "instagram".to_string()));
        }
        if let Some(fields) = fields {
            params.push(("fields", fields.to_string()));
        }
        let path = format!("{}/conversations", self.config.account_id);
        self.get(&path, &params).await
    }

    async fn get_insights(&self, metrics: &[String], period: Option<&str>) -> Result<Value> {
        let metrics: Vec<&str> = metrics
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .collect();
        if metrics.is_empty() {
            return Err(ValidationError::missing("metrics").into());
        }
        let params = [
            ("metric", metrics.join(",")),
            ("period", period.unwrap_or(DEFAULT_INSIGHTS_PERIOD).to_string()),
        ];
        let path = format!("{}/insights", self.config.account_id);
        self.get(&path, &params).await
    }
}

/// One client per platform, constructed once and shared by every handler
#[derive(Clone)]
pub struct PlatformClients {
    messenger: Arc<dyn MessagingClient>,
    instagram: Arc<dyn MessagingClient>,
}

impl PlatformClients {
    pub fn new(messenger: Arc<dyn MessagingClient>, instagram: Arc<dyn MessagingClient>) -> Self {
        Self {
            messenger,
            instagram,
        }
    }

    /// Build Graph API clients for both platforms
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(GraphApi::for_platform(config, Platform::Messenger)),
            Arc::new(GraphApi::for_platform(config, Platform::Instagram)),
        )
    }

    pub fn get(&self, platform: Platform) -> &Arc<dyn MessagingClient> {
        match platform {
            Platform::Messenger => &self.messenger,
            Platform::Instagram => &self.instagram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer, platform: Platform) -> GraphApi {
        GraphApi::new(
            ClientConfig::new(server.uri(), "v18.0", "PAGE1", "test-token"),
            platform,
        )
    }

    #[tokio::test]
    async fn test_send_text_posts_to_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/PAGE1/messages"))
            .and(query_param("access_token", "test-token"))
            .and(body_partial_json(json!({
                "recipient": {"id": "42"},
                "messaging_type": "RESPONSE",
                "message": {"text": "Hello"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "recipient_id": "42",
                "message_id": "m_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = api(&server, Platform::Messenger)
            .send_text("42", "Hello")
            .await
            .unwrap();
        assert_eq!(result["message_id"], "m_1");
    }

    #[tokio::test]
    async fn test_remote_error_on_http_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"message": "Invalid token", "type": "OAuthException", "code": 190}
            })))
            .mount(&server)
            .await;

        let err = api(&server, Platform::Messenger)
            .send_text("42", "Hello")
            .await
            .unwrap_err();
        match err {
            MessengerError::RemoteApi {
                message,
                code,
                error_type,
            } => {
                assert_eq!(message, "Invalid token");
                assert_eq!(code, Some(190));
                assert_eq!(error_type.as_deref(), Some("OAuthException"));
            }
            other => panic!("expected RemoteApi, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "(#100) No matching user found"}
            })))
            .mount(&server)
            .await;

        let err = api(&server, Platform::Messenger)
            .mark_seen("42")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "HttpStatusError");
        match err {
            MessengerError::HttpStatus { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "(#100) No matching user found");
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_status_error_plain_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = api(&server, Platform::Messenger)
            .get_conversations(None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MessengerError::HttpStatus { status: 503, ref message } if message == "upstream down"
        ));
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Nothing listens on port 9 (discard) in the test environment
        let api = GraphApi::new(
            ClientConfig::new("http://127.0.0.1:9", "v18.0", "PAGE1", "t"),
            Platform::Messenger,
        );
        let err = api.typing("42", true).await.unwrap_err();
        assert_eq!(err.kind(), "TransportError");
    }

    #[tokio::test]
    async fn test_sender_actions_are_not_deduplicated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/PAGE1/messages"))
            .and(body_partial_json(json!({"sender_action": "mark_seen"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"recipient_id": "42"})))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"sender_action": "typing_off"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"recipient_id": "42"})))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server, Platform::Messenger);
        api.mark_seen("42").await.unwrap();
        api.mark_seen("42").await.unwrap();
        api.typing("42", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_reaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "sender_action": "react",
                "payload": {"message_id": "mid.1", "reaction": "love"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"recipient_id": "42"})))
            .expect(1)
            .mount(&server)
            .await;

        api(&server, Platform::Instagram)
            .send_reaction("42", "mid.1", "love")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validation_happens_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let api = api(&server, Platform::Messenger);
        let err = api.send_text("", "hi").await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        let err = api.send_reaction("42", "", "").await.unwrap_err();
        match err {
            MessengerError::Validation(v) => assert_eq!(v.missing, vec!["message_id", "reaction"]),
            other => panic!("expected Validation, got {:?}", other),
        }
        assert!(api.get_insights(&[" ".to_string()], None).await.is_err());
    }

    #[tokio::test]
    async fn test_profile_default_fields_per_platform() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v18.0/user-1"))
            .and(query_param("fields", INSTAGRAM_PROFILE_FIELDS))
            .and(query_param("access_token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "Ada", "username": "ada"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v18.0/user-1"))
            .and(query_param("fields", MESSENGER_PROFILE_FIELDS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "first_name": "Ada"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let profile = api(&server, Platform::Instagram)
            .get_user_profile("user-1", None)
            .await
            .unwrap();
        assert_eq!(profile["username"], "ada");

        let profile = api(&server, Platform::Messenger)
            .get_user_profile("user-1", None)
            .await
            .unwrap();
        assert_eq!(profile["first_name"], "Ada");
    }

    #[tokio::test]
    async fn test_profile_rejects_path_like_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(0)
            .mount(&server)
            .await;

        let api = api(&server, Platform::Messenger);
        for id in ["../PAGE1/conversations", "PAGE1/conversations", "1?fields=x", "1#x", ".."] {
            match api.get_user_profile(id, None).await {
                Err(MessengerError::Validation(v)) => {
                    assert_eq!(v.invalid[0].field, "user_id", "id: {}", id)
                }
                other => panic!("expected Validation for {:?}, got {:?}", id, other),
            }
        }
    }

    #[test]
    fn test_require_path_id() {
        assert!(require_path_id("user_id", "1234567890").is_ok());
        assert!(require_path_id("user_id", "user-1_a").is_ok());
        assert_eq!(
            require_path_id("user_id", " ").unwrap_err().missing,
            vec!["user_id"]
        );
        assert!(require_path_id("user_id", "a/b").is_err());
        assert!(require_path_id("user_id", "a%2Fb").is_err());
    }

    #[tokio::test]
    async fn test_conversations_and_insights() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v18.0/PAGE1/conversations"))
            .and(query_param("platform", "instagram"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v18.0/PAGE1/insights"))
            .and(query_param("metric", "page_messages_total_messaging_connections,page_messages_new_conversations_unique"))
            .and(query_param("period", "day"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"name": "x"}]})))
            .expect(1)
            .mount(&server)
            .await;

        let conversations = api(&server, Platform::Instagram)
            .get_conversations(None)
            .await
            .unwrap();
        assert_eq!(conversations["data"], json!([]));

        let insights = api(&server, Platform::Messenger)
            .get_insights(
                &[
                    "page_messages_total_messaging_connections".to_string(),
                    "page_messages_new_conversations_unique".to_string(),
                ],
                None,
            )
            .await
            .unwrap();
        assert_eq!(insights["data"][0]["name"], "x");
    }

    #[tokio::test]
    async fn test_send_notification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messaging_type": "MESSAGE_TAG",
                "tag": "HUMAN_AGENT"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "m"})))
            .expect(1)
            .mount(&server)
            .await;

        let notification = Notification::Tagged {
            recipient_id: "42".to_string(),
            tag: crate::message::MessageTag::HumanAgent,
            text: "An agent will reply shortly".to_string(),
        };
        api(&server, Platform::Messenger)
            .send_notification(&notification)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = api(&server, Platform::Messenger)
            .send_text("42", "Hello")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TransportError");
    }
}
