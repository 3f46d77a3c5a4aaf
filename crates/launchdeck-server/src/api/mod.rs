pub mod rpc;
pub mod tasks;
pub mod workspaces;

use axum::Router;

use launchdeck_core::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/workspaces", workspaces::router())
        .nest("/api/tasks", tasks::router())
        .nest("/api/rpc", rpc::router())
}
