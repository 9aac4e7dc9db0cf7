//! HTTP surface of the gateway (axum).
//!
//! | Route | Auth | Body | Response |
//! |-------|------|------|----------|
//! | `GET /ping` | no | none | `{"ok": true, "engine": ...}` |
//! | `POST /render` | key | JSON request or raw HTML | PDF attachment |
//! | `POST /render_b64` | key | JSON request | JSON with base64 PDF |
//! | `POST /report` | key | JSON report payload | PDF attachment |
//!
//! Errors are JSON [`crate::error::ErrorBody`] values; see [`error::ApiError`]
//! for the status mapping.

pub mod error;
pub mod middleware;
pub mod routes;

use crate::gateway::RenderGateway;
use axum::extract::DefaultBodyLimit;
use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Headroom on top of `max_html_bytes` for JSON framing and escaping.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<RenderGateway>,
    /// Required `X-API-Key` value. `None` disables the check.
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(gateway: Arc<RenderGateway>, api_key: Option<String>) -> Self {
        Self {
            gateway,
            api_key: api_key
                .filter(|k| !k.trim().is_empty())
                .map(|k| Arc::from(k.as_str())),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    // JSON escaping can double the size of an HTML payload.
    let body_limit = state
        .gateway
        .config()
        .max_html_bytes
        .saturating_mul(2)
        .saturating_add(BODY_LIMIT_SLACK);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/render", post(routes::render))
        .route("/render_b64", post(routes::render_b64))
        .route("/report", post(routes::report))
        .route_layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::require_api_key,
        ));

    Router::new()
        // Health (no auth)
        .route("/ping", get(routes::ping))
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_mw::from_fn(middleware::access_log))
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "Listening on http://{} (engine: {}, auth: {})",
        listener.local_addr()?,
        state.gateway.engine_name(),
        if state.api_key.is_some() { "api key" } else { "off" }
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received; draining connections");
}
