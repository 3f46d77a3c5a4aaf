//! Launchdeck Server - HTTP backend for the launchdeck dashboard.
//!
//! Serves the workspace and task stores from `launchdeck-core` as:
//! - a RESTful HTTP API via axum, with SSE streams of both replicas
//! - a JSON-RPC 2.0 endpoint at `/api/rpc`

pub mod api;

use std::net::SocketAddr;

use axum::extract::State;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use launchdeck_core::config::LaunchdeckConfig;
use launchdeck_core::state::{AppState, AppStateInner};

/// Configuration for the launchdeck backend server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub launchdeck: LaunchdeckConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3210,
            launchdeck: LaunchdeckConfig::default(),
        }
    }
}

/// Open the configured backend and start both stores.
pub async fn create_app_state(config: &LaunchdeckConfig) -> Result<AppState, String> {
    AppStateInner::open(config)
        .await
        .map_err(|e| format!("Failed to open {} backend: {}", config.backend.as_str(), e))
}

/// The full application router, without a bound listener.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // The CLI may already have installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "launchdeck_core=warn,launchdeck_server=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!(
        "Starting launchdeck server on {}:{} ({} backend)",
        config.host,
        config.port,
        config.launchdeck.backend.as_str()
    );

    let state = create_app_state(&config.launchdeck).await?;

    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("launchdeck server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "launchdeck-server",
        "version": env!("CARGO_PKG_VERSION"),
        "workspaces": state.workspace_store.items().len(),
        "tasks": state.task_store.tasks().len(),
    }))
}
