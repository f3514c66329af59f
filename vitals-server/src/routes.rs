//! HTTP endpoints.
//!
//! Endpoints:
//!
//! - `POST /heart-rate`           — ingest `{"heartRate": <number>}`
//! - `GET  /heart-rate`           — `{"heartRate": <latest or 0>}`
//! - `POST /sensor-data`          — ingest a JSON object, returns the stored reading
//! - `GET  /latest-data`          — latest sensor reading
//! - `GET  /historical-data`      — retained sensor readings, oldest first
//! - `GET  /streams/:name/latest` — latest reading of any stream
//! - `GET  /streams/:name/window?last=N` — recent readings of any stream
//! - `GET  /health`               — liveness plus stream and subscriber counts
//!
//! `GET /events` and `GET /ws` live in [`crate::sse`] and [`crate::ws`].

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use vitals::Reading;
use vitals::schema::{HEART_RATE_STREAM, SENSOR_STREAM};

use crate::AppState;
use crate::error::ApiError;

/// Message body for a rejected heart-rate post.
const INVALID_HEART_RATE: &str = "Invalid heart rate data";

/// `POST /heart-rate`.
///
/// # Errors
///
/// 400 unless the body carries a numeric `heartRate`; 500 if the snapshot
/// write fails.
pub async fn post_heart_rate(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|_| ApiError::bad_request(INVALID_HEART_RATE))?;

    let heart_rate = match body.get("heartRate") {
        Some(v @ Value::Number(_)) => v.clone(),
        _ => return Err(ApiError::bad_request(INVALID_HEART_RATE)),
    };

    let reading = state.telemetry.ingest(HEART_RATE_STREAM, &heart_rate).await?;
    tracing::info!(heart_rate = %reading.value, "received heart rate");

    Ok(Json(json!({ "message": "Heart rate saved successfully" })))
}

/// `GET /heart-rate`.
pub async fn get_heart_rate(State(state): State<AppState>) -> Json<Value> {
    let latest = state.telemetry.latest(HEART_RATE_STREAM).await;
    Json(json!({ "heartRate": latest.value }))
}

/// `POST /sensor-data`.
///
/// # Errors
///
/// 400 unless the body is a JSON object; 500 if the snapshot write fails.
pub async fn post_sensor_data(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Reading>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let reading = state.telemetry.ingest(SENSOR_STREAM, &body).await?;
    Ok(Json(reading))
}

/// `GET /latest-data`.
pub async fn latest_data(State(state): State<AppState>) -> Json<Reading> {
    Json(state.telemetry.latest(SENSOR_STREAM).await)
}

/// `GET /historical-data`.
pub async fn historical_data(State(state): State<AppState>) -> Json<Vec<Reading>> {
    Json(state.telemetry.window(SENSOR_STREAM, None).await)
}

/// `GET /streams/:name/latest`.
///
/// # Errors
///
/// 404 for an unknown stream.
pub async fn stream_latest(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Reading>, ApiError> {
    require_stream(&state, &name).await?;
    Ok(Json(state.telemetry.latest(&name).await))
}

/// Query string for `GET /streams/:name/window`.
#[derive(Debug, Deserialize)]
pub struct WindowParams {
    /// Number of most recent readings; all retained readings if absent.
    pub last: Option<usize>,
}

/// `GET /streams/:name/window?last=N`.
///
/// # Errors
///
/// 404 for an unknown stream.
pub async fn stream_window(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    require_stream(&state, &name).await?;
    Ok(Json(state.telemetry.window(&name, params.last).await))
}

/// `GET /health`.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "streams": state.telemetry.streams().await,
        "subscribers": state.telemetry.broadcaster().total_subscribers(),
    }))
}

/// Fails with 404 unless `name` is a known stream.
pub(crate) async fn require_stream(state: &AppState, name: &str) -> Result<(), ApiError> {
    match state.telemetry.stream_config(name).await {
        Some(_) => Ok(()),
        None => Err(ApiError::unknown_stream(name)),
    }
}
