//! Request parameter extraction
//!
//! Facade endpoints read loosely-typed JSON bodies and record every missing
//! or malformed field before rejecting, so a single 400 names all of them.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use relay_core::Platform;
use relay_messenger::{Button, Element, QuickReply, ValidationError};

use crate::error::Result;

/// Parse a request body into a JSON object. An empty body reads as `{}`.
pub fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ValidationError::invalid("body", "must be a JSON object").into()),
        Err(e) => Err(ValidationError::invalid("body", format!("invalid JSON: {}", e)).into()),
    }
}

/// Collects field values and validation failures from one body
pub struct Fields<'a> {
    body: &'a Map<String, Value>,
    errors: ValidationError,
}

impl<'a> Fields<'a> {
    pub fn new(body: &'a Map<String, Value>) -> Self {
        Self {
            body,
            errors: ValidationError::new(),
        }
    }

    fn present(&self, name: &str) -> Option<&'a Value> {
        self.body.get(name).filter(|v| !v.is_null())
    }

    /// Required non-blank string. Returns an empty string when it failed;
    /// [`Fields::finish`] reports the failure.
    pub fn required_str(&mut self, name: &str) -> String {
        match self.optional_str(name) {
            Some(value) => value,
            None => {
                if !self.errors.invalid.iter().any(|i| i.field == name) {
                    self.errors.add_missing(name);
                }
                String::new()
            }
        }
    }

    /// Optional string; blank counts as absent
    pub fn optional_str(&mut self, name: &str) -> Option<String> {
        match self.present(name)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => {
                self.errors.add_invalid(name, "must be a string");
                None
            }
        }
    }

    pub fn optional_bool(&mut self, name: &str) -> Option<bool> {
        match self.present(name)? {
            Value::Bool(b) => Some(*b),
            _ => {
                self.errors.add_invalid(name, "must be a boolean");
                None
            }
        }
    }

    /// Required non-empty array of `T`
    pub fn required_array<T: DeserializeOwned>(&mut self, name: &str) -> Vec<T> {
        match self.present(name) {
            None => {
                self.errors.add_missing(name);
                Vec::new()
            }
            Some(Value::Array(items)) if items.is_empty() => {
                self.errors.add_missing(name);
                Vec::new()
            }
            Some(_) => self.optional_array(name),
        }
    }

    /// Optional array of `T`; absent reads as empty
    pub fn optional_array<T: DeserializeOwned>(&mut self, name: &str) -> Vec<T> {
        let Some(value) = self.present(name) else {
            return Vec::new();
        };
        if !value.is_array() {
            self.errors.add_invalid(name, "must be an array");
            return Vec::new();
        }
        match serde_json::from_value(value.clone()) {
            Ok(items) => items,
            Err(e) => {
                self.errors.add_invalid(name, e.to_string());
                Vec::new()
            }
        }
    }

    /// `platform` selector, defaulting to Messenger
    pub fn platform(&mut self) -> Platform {
        let value = self.optional_str("platform");
        platform_or_default(value.as_deref(), &mut self.errors)
    }

    /// Record a failure found outside this helper
    pub fn extend(&mut self, errors: ValidationError) {
        self.errors.extend(errors);
    }

    pub fn finish(self) -> Result<()> {
        Ok(self.errors.into_result()?)
    }
}

/// Parse an optional platform selector, recording unknown names
pub fn platform_or_default(value: Option<&str>, errors: &mut ValidationError) -> Platform {
    match value {
        None => Platform::default(),
        Some(name) => name.parse::<Platform>().unwrap_or_else(|e: relay_core::Error| {
            errors.add_invalid("platform", e.to_string());
            Platform::default()
        }),
    }
}

// =============================================================================
// Template inputs
// =============================================================================

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickReplyInput {
    pub title: String,
    pub payload: String,
    pub image_url: Option<String>,
}

impl From<QuickReplyInput> for QuickReply {
    fn from(input: QuickReplyInput) -> Self {
        let reply = QuickReply::new(input.title, input.payload);
        match input.image_url {
            Some(url) => reply.with_image(url),
            None => reply,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonInput {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub url: Option<String>,
    pub payload: Option<String>,
}

impl ButtonInput {
    fn into_button(self, field: &str, errors: &mut ValidationError) -> Option<Button> {
        match self.kind.as_str() {
            "web_url" => match self.url {
                Some(url) => Some(Button::web_url(self.title, url)),
                None => {
                    errors.add_missing(format!("{}.url", field));
                    None
                }
            },
            "postback" | "phone_number" => match self.payload {
                Some(payload) if self.kind == "postback" => {
                    Some(Button::postback(self.title, payload))
                }
                Some(payload) => Some(Button::phone_number(self.title, payload)),
                None => {
                    errors.add_missing(format!("{}.payload", field));
                    None
                }
            },
            other => {
                errors.add_invalid(
                    format!("{}.type", field),
                    format!("unsupported button type '{}'", other),
                );
                None
            }
        }
    }
}

/// Convert button inputs, recording failures under `field[i]`
pub fn into_buttons(
    inputs: Vec<ButtonInput>,
    field: &str,
    errors: &mut ValidationError,
) -> Vec<Button> {
    inputs
        .into_iter()
        .enumerate()
        .filter_map(|(i, input)| input.into_button(&format!("{}[{}]", field, i), errors))
        .collect()
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInput {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    pub default_action_url: Option<String>,
    #[serde(default)]
    pub buttons: Vec<ButtonInput>,
}

/// Convert element inputs, recording failures under `field[i]`
pub fn into_elements(
    inputs: Vec<ElementInput>,
    field: &str,
    errors: &mut ValidationError,
) -> Vec<Element> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            let mut element = Element::new(input.title);
            element.subtitle = input.subtitle;
            element.image_url = input.image_url;
            if let Some(url) = input.default_action_url {
                element = element.default_action(url);
            }
            element.buttons =
                into_buttons(input.buttons, &format!("{}[{}].buttons", field, i), errors);
            element
        })
        .collect()
}
