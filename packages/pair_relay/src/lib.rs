// Library interface for pair_relay
// Exposes the relay core and an axum router that can be served or embedded

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod pairing;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod router;
pub mod session;
pub mod views;
pub mod websocket;

pub use config::RelayConfig;
pub use connection::{ChannelConnection, Connection, ConnectionHandle, ConnectionId};
pub use metrics::RelayMetrics;
pub use protocol::{ClientMessage, ServerMessage};
pub use relay::Relay;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub metrics: Arc<RelayMetrics>,
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
}

impl AppState {
    pub fn new(config: &RelayConfig) -> Self {
        let metrics = Arc::new(RelayMetrics::new());
        Self {
            relay: Arc::new(Relay::new(metrics.clone())),
            metrics,
            outbound_buffer: config.outbound_buffer,
        }
    }
}

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// Build the HTTP surface: landing page, health, metrics and the `/ws` endpoint.
///
/// The WebSocket handler reads the peer address, so serve the router with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(views::index))
        .route("/health", get(health))
        .route("/api/metrics", get(metrics_handler))
        .route("/ws", get(websocket::websocket_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}
