//! HTTP server
//!
//! One axum listener carries both the webhook endpoint and the REST facade.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use relay_core::{Config, ServerConfig};
use relay_messenger::{DeliveryHandler, PlatformClients, WebhookState, create_webhook_router};

use crate::handlers::HealthInfo;
use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub clients: PlatformClients,
    pub health: Arc<HealthInfo>,
}

impl AppState {
    pub fn new(config: &Config, clients: PlatformClients) -> Self {
        Self {
            clients,
            health: Arc::new(HealthInfo::from_config(config)),
        }
    }
}

/// Build the full application router: facade, webhook, CORS and tracing
pub fn build_router(config: &Config, clients: PlatformClients) -> Router {
    let webhook = create_webhook_router(WebhookState {
        verify_token: config.verify_token.clone(),
        handler: Arc::new(DeliveryHandler::new(clients.clone())),
    });

    Router::new()
        .merge(routes())
        .with_state(AppState::new(config, clients))
        .merge(webhook)
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let Some(origins) = &server.allowed_origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Start the HTTP server and run until `shutdown` resolves
pub async fn start_server<F>(
    config: Config,
    clients: PlatformClients,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(&config, clients);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("meta-relay listening on {}", addr);
    info!("Webhook endpoint: http://{}/webhook", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}
