//! `GET /events?stream=<name>` server-sent events.
//!
//! The first event is always the stream's current `latest()`, so a client has
//! something to render before the next reading arrives. After that:
//!
//! - push mode: one event per published reading, fed by a [`Subscription`]
//!   that is unsubscribed when the client disconnects.
//! - poll mode: the current `latest()` again every `poll_interval_secs`.
//!
//! Each event's data is a JSON-encoded [`Reading`]. The stream ends when the
//! client leaves or the server shuts down.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Deserialize;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use vitals::schema::HEART_RATE_STREAM;
use vitals::{Reading, Subscription, Telemetry};

use crate::AppState;
use crate::config::SseMode;
use crate::error::ApiError;
use crate::routes::require_stream;

/// Interval between keep-alive comments.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Query string for `/events` and `/ws`.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Stream to follow; the heart-rate stream if absent.
    pub stream: Option<String>,
}

impl StreamParams {
    /// The requested stream name.
    pub fn stream(&self) -> &str {
        self.stream.as_deref().unwrap_or(HEART_RATE_STREAM)
    }
}

/// `GET /events`.
///
/// # Errors
///
/// 404 for an unknown stream.
pub async fn events(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let name = params.stream().to_string();
    require_stream(&state, &name).await?;

    let (bootstrap, updates) = match state.sse.mode {
        SseMode::Push => {
            // Subscribe before reading the bootstrap so nothing published in
            // between is lost. A reading published in that gap is also the
            // bootstrap, so it is not pushed a second time.
            let subscription = state.telemetry.subscribe(&name);
            tracing::info!(stream = %name, subscriber = %subscription.id(), "sse client connected");
            let bootstrap = state.telemetry.latest(&name).await;
            let updates = after_bootstrap(pushed(subscription), bootstrap.clone());
            (bootstrap, updates)
        }
        SseMode::Poll => {
            tracing::info!(stream = %name, "sse client connected (poll)");
            let bootstrap = state.telemetry.latest(&name).await;
            let updates = polled(
                state.telemetry.clone(),
                name.clone(),
                state.sse.poll_interval(),
            );
            (bootstrap, updates)
        }
    };

    // Ending the body on shutdown also drops the subscription.
    let events = stream::once(async move { bootstrap })
        .chain(updates)
        .take_until(state.shutdown.triggered())
        .map(|reading| Ok(to_event(&reading)));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

/// Drops leading `updates` equal to `bootstrap`.
fn after_bootstrap(
    updates: BoxStream<'static, Reading>,
    bootstrap: Reading,
) -> BoxStream<'static, Reading> {
    updates
        .skip_while(move |reading| future::ready(*reading == bootstrap))
        .boxed()
}

/// Every reading delivered to `subscription`, until it is unsubscribed.
fn pushed(subscription: Subscription) -> BoxStream<'static, Reading> {
    stream::unfold(subscription, |mut subscription| async move {
        let reading = subscription.recv().await?;
        Some((reading, subscription))
    })
    .boxed()
}

/// The stream's latest reading, once per `period`.
fn polled(telemetry: Telemetry, name: String, period: Duration) -> BoxStream<'static, Reading> {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold(
        (telemetry, name, ticker),
        |(telemetry, name, mut ticker)| async move {
            ticker.tick().await;
            let reading = telemetry.latest(&name).await;
            Some((reading, (telemetry, name, ticker)))
        },
    )
    .boxed()
}

/// Encodes a reading as an SSE event.
fn to_event(reading: &Reading) -> Event {
    match serde_json::to_string(reading) {
        Ok(data) => Event::default().data(data),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode reading");
            Event::default().comment("encode error")
        }
    }
}
