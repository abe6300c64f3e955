//! meta-relay: Messenger / Instagram webhook relay
//!
//! Usage:
//!   meta-relay           - Start the webhook + REST server
//!   meta-relay --help    - Show help
//!   meta-relay --version - Show version

use relay_core::Config;
use relay_messenger::PlatformClients;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    Server,
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args(std::env::args().skip(1)) {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("meta-relay {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting meta-relay...");
    tracing::info!(
        "Messenger page {} / Instagram account {} (Graph API {})",
        config.messenger.account_id,
        config.instagram.account_id,
        config.messenger.api_version
    );
    match &config.server.allowed_origins {
        Some(origins) => tracing::info!("CORS restricted to {:?}", origins),
        None => tracing::info!("CORS is permissive (API_ALLOWED_ORIGINS not set)"),
    }

    let clients = PlatformClients::from_config(&config);

    relay_api::start_server(config, clients, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> RunMode {
    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}

/// Print help message
fn print_help() {
    println!("meta-relay - Messenger / Instagram webhook relay");
    println!();
    println!("Usage:");
    println!("  meta-relay           Start the webhook + REST server");
    println!("  meta-relay --help    Show this help message");
    println!("  meta-relay --version Show version");
    println!();
    println!("Environment Variables:");
    println!("  PAGE_ID                 Facebook page id (required)");
    println!("  PAGE_ACCESS_TOKEN       Page access token (required)");
    println!("  VERIFY_TOKEN            Webhook verification secret (required)");
    println!("  INSTAGRAM_ACCOUNT_ID    Instagram account id (default: PAGE_ID)");
    println!("  INSTAGRAM_ACCESS_TOKEN  Instagram token (default: PAGE_ACCESS_TOKEN)");
    println!("  GRAPH_API_DOMAIN        API base (default: https://graph.facebook.com)");
    println!("  GRAPH_API_VERSION       API version (default: v18.0)");
    println!("  PORT                    Listener port (default: 3000)");
    println!("  API_ALLOWED_ORIGINS     Comma-separated CORS origins (default: any)");
    println!("  RUST_LOG                Log filter (default: info)");
}
