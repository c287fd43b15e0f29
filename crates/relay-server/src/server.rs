//! `RelayServer` — axum HTTP ingress + WebSocket broker.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use relay_core::Event;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::broadcast::BroadcastEngine;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::registry::ConnectionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::ws;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live subscriber connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Event fan-out engine.
    pub broadcast: Arc<BroadcastEngine>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Broker configuration.
    pub config: Arc<ServerConfig>,
    /// When the broker started.
    pub start_time: Instant,
}

/// The relay broker.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<ConnectionRegistry>,
    broadcast: Arc<BroadcastEngine>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl RelayServer {
    /// Create a new broker.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcast = Arc::new(BroadcastEngine::new(Arc::clone(&registry)));
        Self {
            config: Arc::new(config),
            registry,
            broadcast,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            broadcast: Arc::clone(&self.broadcast),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/stream", post(stream_handler))
            .route("/ws", get(ws::ws_handler))
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until shutdown is requested, then drain subscriber
    /// tasks with the configured timeout.
    pub async fn run(&self) -> std::io::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(addr = %listener.local_addr()?, "relay server listening");

        let token = self.shutdown.token();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;

        self.shutdown
            .graceful_shutdown(std::time::Duration::from_secs(
                self.config.shutdown_timeout_secs,
            ))
            .await;
        Ok(())
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The broadcast engine.
    pub fn broadcast(&self) -> &Arc<BroadcastEngine> {
        &self.broadcast
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The broker configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET / — plain-text readiness line.
async fn root_handler() -> &'static str {
    "Relay server - ready to receive events"
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.registry.len()))
}

/// POST /stream — one JSON object in, fan-out to every subscriber.
///
/// Malformed JSON is rejected by the `Json` extractor before this runs; a
/// well-formed non-object body is rejected here with a client error.
async fn stream_handler(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    match Event::from_value(body) {
        Ok(event) => {
            info!(event_type = event.event_type(), "received event from producer");
            state.broadcast.broadcast(&event);
            Json(json!({ "success": true })).into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Fallback for unknown routes.
async fn not_found_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found" })),
    )
        .into_response()
}
