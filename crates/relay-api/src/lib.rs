//! relay-api: HTTP surface for meta-relay
//!
//! Serves the REST facade over the platform clients and mounts the
//! webhook router next to it. Built with axum.

pub mod error;
pub mod handlers;
pub mod params;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{AppState, build_router, start_server};
