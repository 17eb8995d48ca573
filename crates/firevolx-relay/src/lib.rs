//! WebSocket to Telnet relay for Firevolx robot terminals.
//!
//! Provides:
//! - `RelayService` - One device connection per client channel
//! - `router` - Axum routes for `/ws`, `/health` and `/test-connection`
//! - `RelayConfig` - Prompt pattern and timeouts for device connections

pub mod config;
pub mod http;
pub mod service;
pub mod websocket;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::RelayConfig;
pub use service::{ChannelId, EventSink, RelayError, RelayService};

/// Build the relay's HTTP and WebSocket routes.
pub fn router(service: RelayService) -> Router {
    Router::new()
        .route("/ws", get(websocket::ws_handler))
        .route("/health", get(http::health))
        .route("/test-connection", post(http::test_connection))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}
