//! relay-core: shared configuration and platform identity for meta-relay
//!
//! Configuration is read once at startup and handed to every component
//! as immutable values.

pub mod config;
pub mod error;
pub mod platform;

pub use config::{ClientConfig, Config, ServerConfig};
pub use error::{Error, Result};
pub use platform::Platform;
