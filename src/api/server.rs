//! HTTP server setup: router, middleware and listener.

use super::state::ApiState;
use super::{guard, notes, resources};

use axum::http::Request;
use axum::response::Json;
use axum::routing::get;
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

/// Build the application router.
///
/// Routes are served at the root and, when a mount prefix is configured,
/// under the prefix as well, so the service works with or without a
/// path-stripping reverse proxy in front.
pub fn router(state: Arc<ApiState>) -> Router {
    let gated = Router::new()
        .route("/n/{note_id}", get(notes::get_note))
        .route("/v1/n/{note_id}", get(notes::get_note))
        .route("/r/{resource_id}", get(resources::get_resource))
        .route("/v1/r/{resource_id}", get(resources::get_resource))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::check_access,
        ));

    let routes = Router::new().route("/healthz", get(health)).merge(gated);

    let prefix = state.config.url_prefix.clone();
    let routes = if prefix.is_empty() {
        routes
    } else {
        routes.clone().nest(&prefix, routes)
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::span!(
                    Level::INFO,
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the given address.
///
/// Returns a handle that resolves when the server shuts down. The caller
/// passes a `tokio::sync::watch::Receiver<bool>` for graceful shutdown.
pub async fn start_http_server(
    bind: SocketAddr,
    state: Arc<ApiState>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "HTTP server listening");

    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|v| *v).await;
        })
        .await;
        if let Err(error) = result {
            tracing::error!(%error, "HTTP server stopped with error");
        }
    });

    Ok(handle)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
