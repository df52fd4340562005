use std::future::Future;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::web::handlers::{
    get_countries, get_game_modes, get_game_stats, get_health, get_index, get_latest_round,
    get_snapshot,
};
use crate::web::state::WebSharedState;

pub fn build_router(shared_state: WebSharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/index", get(get_index))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/latest_round", get(get_latest_round))
        .route("/api/stats", get(get_game_stats))
        .route("/api/game_modes", get(get_game_modes))
        .route("/api/countries", get(get_countries))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Serve until `shutdown` resolves, then let in-flight requests drain.
pub async fn start_web_server<F>(addr: &str, shared_state: WebSharedState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(shared_state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    info!("Now listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;
    Ok(())
}
