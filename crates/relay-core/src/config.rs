//! Configuration management
//!
//! Configuration comes from the environment (optionally seeded from a
//! `.env` file by the binary) and is loaded once at startup. Nothing here
//! is hot-reloaded.
//!
//! | Variable                 | Default                       |
//! |--------------------------|-------------------------------|
//! | `PAGE_ID`                | required                      |
//! | `PAGE_ACCESS_TOKEN`      | required                      |
//! | `VERIFY_TOKEN`           | required                      |
//! | `INSTAGRAM_ACCOUNT_ID`   | `PAGE_ID`                     |
//! | `INSTAGRAM_ACCESS_TOKEN` | `PAGE_ACCESS_TOKEN`           |
//! | `GRAPH_API_DOMAIN`       | `https://graph.facebook.com`  |
//! | `GRAPH_API_VERSION`      | `v18.0`                       |
//! | `PORT`                   | `3000`                        |
//! | `API_ALLOWED_ORIGINS`    | unset (permissive CORS)       |

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::platform::Platform;

/// Connection settings for one platform's Graph API client
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    /// API base domain, e.g. `https://graph.facebook.com`
    pub api_domain: String,
    /// API version path segment, e.g. `v18.0`
    pub api_version: String,
    /// Page or Instagram account id
    pub account_id: String,
    /// Page access token
    #[serde(skip_serializing)]
    pub access_token: String,
}

impl ClientConfig {
    pub fn new(
        api_domain: impl Into<String>,
        api_version: impl Into<String>,
        account_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            api_domain: api_domain.into(),
            api_version: api_version.into(),
            account_id: account_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Build `{domain}/{version}/{path}`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.api_domain.trim_end_matches('/'),
            self.api_version.trim_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

// Keep the token out of debug output.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_domain", &self.api_domain)
            .field("api_version", &self.api_version)
            .field("account_id", &self.account_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port for the webhook + REST listener
    pub port: u16,

    /// Allowed CORS origins. `None` means permissive.
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            allowed_origins: None,
        }
    }
}

/// Main configuration for meta-relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Messenger page client settings
    pub messenger: ClientConfig,

    /// Instagram account client settings
    pub instagram: ClientConfig,

    /// Secret echoed back by the provider during webhook verification
    pub verify_token: String,

    pub server: ServerConfig,
}

pub const DEFAULT_API_DOMAIN: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v18.0";

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| Error::Config(format!("{} not set", key)))
        };

        let page_id = require("PAGE_ID")?;
        let page_token = require("PAGE_ACCESS_TOKEN")?;
        let verify_token = require("VERIFY_TOKEN")?;

        let api_domain = get("GRAPH_API_DOMAIN").unwrap_or_else(|| DEFAULT_API_DOMAIN.to_string());
        let api_version =
            get("GRAPH_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        let instagram_id = get("INSTAGRAM_ACCOUNT_ID").unwrap_or_else(|| page_id.clone());
        let instagram_token = get("INSTAGRAM_ACCESS_TOKEN").unwrap_or_else(|| page_token.clone());

        let port = match get("PORT") {
            Some(p) => p
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", p)))?,
            None => default_port(),
        };

        Ok(Config {
            messenger: ClientConfig::new(&api_domain, &api_version, page_id, page_token),
            instagram: ClientConfig::new(api_domain, api_version, instagram_id, instagram_token),
            verify_token,
            server: ServerConfig {
                port,
                allowed_origins: get("API_ALLOWED_ORIGINS").map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }),
            },
        })
    }

    /// Client settings for the given platform
    pub fn client(&self, platform: Platform) -> &ClientConfig {
        match platform {
            Platform::Messenger => &self.messenger,
            Platform::Instagram => &self.instagram,
        }
    }
}
