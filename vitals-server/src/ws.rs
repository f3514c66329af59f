//! `GET /ws?stream=<name>` bidirectional WebSocket.
//!
//! One connection both ingests and subscribes:
//!
//! - Incoming text frames are ingested into the stream. Malformed frames are
//!   logged and dropped; the connection stays open.
//! - Every reading published to the stream, including ones this connection
//!   sent, goes out as `{"event": "update", "stream": .., "reading": ..}`.
//!
//! The subscription lives exactly as long as the connection. Whichever half
//! finishes first tears the other down, and with it the subscription. Server
//! shutdown tears both down.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use vitals::error::TransportError;
use vitals::sink::{Sink, pump};
use vitals::{Reading, Telemetry, VitalsError};

use crate::AppState;
use crate::error::ApiError;
use crate::shutdown::Shutdown;
use crate::routes::require_stream;
use crate::sse::StreamParams;

/// Outgoing frame for one published reading.
#[derive(Debug, Serialize)]
pub struct UpdateFrame<'a> {
    /// Always `"update"`.
    pub event: &'static str,
    /// Stream the reading belongs to.
    pub stream: &'a str,
    /// The reading.
    pub reading: &'a Reading,
}

impl<'a> UpdateFrame<'a> {
    /// Frame for `reading` on `stream`.
    pub fn new(stream: &'a str, reading: &'a Reading) -> Self {
        Self {
            event: "update",
            stream,
            reading,
        }
    }

    /// JSON text of the frame.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Encode { source: e })
    }
}

/// Sending half of a WebSocket, driven by [`pump`].
struct WsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl Sink for WsSink {
    async fn deliver(&mut self, stream: &str, reading: &Reading) -> Result<(), TransportError> {
        let text = UpdateFrame::new(stream, reading).encode()?;
        self.0
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send {
                reason: e.to_string(),
            })
    }
}

/// `GET /ws`.
///
/// # Errors
///
/// 404 for an unknown stream.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Response, ApiError> {
    let name = params.stream().to_string();
    require_stream(&state, &name).await?;

    let telemetry = state.telemetry.clone();
    let shutdown = state.shutdown.clone();
    Ok(ws.on_upgrade(move |socket| connection(socket, telemetry, name, shutdown)))
}

/// Runs one connection until either half ends or the server shuts down.
async fn connection(socket: WebSocket, telemetry: Telemetry, name: String, shutdown: Shutdown) {
    let subscription = telemetry.subscribe(&name);
    let id = subscription.id();
    tracing::info!(stream = %name, subscriber = %id, "websocket client connected");

    let (sender, receiver) = socket.split();

    let mut outgoing = tokio::spawn(async move {
        let mut sink = WsSink(sender);
        pump(subscription, &mut sink).await
    });
    let mut incoming = tokio::spawn(ingest_frames(receiver, telemetry, name.clone()));

    tokio::select! {
        outcome = &mut outgoing => {
            incoming.abort();
            if let Ok(outcome) = outcome {
                tracing::debug!(stream = %name, subscriber = %id, delivered = outcome.delivered(), "websocket delivery ended");
            }
        }
        _ = &mut incoming => {
            // Aborting the pump drops the subscription.
            outgoing.abort();
        }
        () = shutdown.triggered() => {
            incoming.abort();
            outgoing.abort();
        }
    }

    tracing::info!(stream = %name, subscriber = %id, "websocket client disconnected");
}

/// Ingests text frames until the client closes.
async fn ingest_frames(mut receiver: SplitStream<WebSocket>, telemetry: Telemetry, name: String) {
    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(stream = %name, error = %e, "websocket read failed");
                break;
            }
        };

        match telemetry.ingest_message(&name, &text).await {
            Ok(reading) => {
                tracing::debug!(stream = %name, value = %reading.value, "websocket reading ingested");
            }
            Err(VitalsError::Validation(e)) => {
                tracing::warn!(stream = %name, error = %e, "malformed websocket message dropped");
            }
            // Already logged by the store; the reading was still broadcast.
            Err(_) => {}
        }
    }
}
