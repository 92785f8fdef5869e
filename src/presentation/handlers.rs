// HTTP request handlers
use crate::domain::messages::{epoch_millis, HealthStatus, ServiceInfo};
use crate::presentation::app_state::AppState;
use crate::presentation::session::run_session;
use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const NOT_FOUND_HINT: &str = "Endpoint not found. Try /health or connect via WebSocket";

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(service_info))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Upgrade requests go to the hub regardless of path
fn upgrade(ws: WebSocketUpgrade, state: Arc<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

/// Liveness and connection count
pub async fn health_check(
    ws: Option<WebSocketUpgrade>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Some(ws) = ws {
        return upgrade(ws, state);
    }

    Json(HealthStatus {
        status: "online",
        connections: state.hub.connection_count(),
        port: state.hub.port(),
        timestamp: epoch_millis(),
    })
    .into_response()
}

pub async fn service_info(
    ws: Option<WebSocketUpgrade>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Some(ws) = ws {
        return upgrade(ws, state);
    }

    Json(ServiceInfo {
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        websocket_port: state.hub.port(),
        active_connections: state.hub.connection_count(),
    })
    .into_response()
}

pub async fn fallback(ws: Option<WebSocketUpgrade>, State(state): State<Arc<AppState>>) -> Response {
    match ws {
        Some(ws) => upgrade(ws, state),
        None => (StatusCode::NOT_FOUND, NOT_FOUND_HINT).into_response(),
    }
}
