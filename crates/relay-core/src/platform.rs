//! Platform identity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Messaging surface an event came from or a call is routed to.
///
/// Only used to pick the client (credentials and routing context) that
/// applies; no per-platform state is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Facebook Messenger page (primary)
    #[default]
    Messenger,
    /// Instagram professional account (secondary)
    Instagram,
}

impl Platform {
    /// Map the webhook `object` discriminator to a platform.
    ///
    /// Returns `None` for anything that is not a messaging surface.
    pub fn from_webhook_object(object: &str) -> Option<Self> {
        match object {
            "page" => Some(Self::Messenger),
            "instagram" => Some(Self::Instagram),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Messenger => "messenger",
            Self::Instagram => "instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "messenger" | "facebook" | "page" => Ok(Self::Messenger),
            "instagram" => Ok(Self::Instagram),
            other => Err(Error::UnknownPlatform(other.to_string())),
        }
    }
}
