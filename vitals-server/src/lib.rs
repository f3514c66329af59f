//! HTTP, SSE and WebSocket front end for the vitals telemetry store.
//!
//! Devices post readings over HTTP or a WebSocket; dashboards read the
//! latest value or the retained window over HTTP and follow live updates over
//! server-sent events or the same WebSocket. All transports share one
//! [`Telemetry`] handle.
//!
//! ```text
//!   ESP8266 ──POST /heart-rate──┐                 ┌──GET /events──► dashboard
//!   ESP8266 ──POST /sensor-data─┼──► Telemetry ───┼──GET /ws──────► dashboard
//!   device  ──WS text frame─────┘   (Store +      └──GET /heart-rate
//!                                    Broadcaster)
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod shutdown;
pub mod sse;
pub mod ws;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use vitals::Telemetry;

use crate::config::SseConfig;
use crate::shutdown::Shutdown;

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Store and broadcaster.
    pub telemetry: Telemetry,
    /// `/events` behaviour.
    pub sse: SseConfig,
    /// Ends open `/events` and `/ws` connections.
    pub shutdown: Shutdown,
}

impl AppState {
    /// Creates handler state.
    pub fn new(telemetry: Telemetry, sse: SseConfig) -> Self {
        Self {
            telemetry,
            sse,
            shutdown: Shutdown::new(),
        }
    }
}

/// Builds the router with every endpoint and permissive CORS.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route(
            "/heart-rate",
            get(routes::get_heart_rate).post(routes::post_heart_rate),
        )
        .route("/sensor-data", post(routes::post_sensor_data))
        .route("/latest-data", get(routes::latest_data))
        .route("/historical-data", get(routes::historical_data))
        .route("/streams/:name/latest", get(routes::stream_latest))
        .route("/streams/:name/window", get(routes::stream_window))
        .route("/events", get(sse::events))
        .route("/ws", get(ws::upgrade))
        .route("/health", get(routes::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves [`app`] on `listener` until `shutdown` resolves.
///
/// When it does, `state.shutdown` fires so open event streams and sockets
/// close, and in-flight requests are allowed to finish.
///
/// # Errors
///
/// Returns the I/O error if the server fails.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let signal = state.shutdown.clone();
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutting down, closing live connections");
            signal.trigger();
        })
        .await
}
