//! Mapping of store errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vitals::VitalsError;

/// Error returned by HTTP handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// 400 with the given message.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// 404 for an unknown stream.
    pub fn unknown_stream(stream: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("stream '{stream}' not found"),
        }
    }

    /// 500 without leaking internals.
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
        }
    }

    /// Status code of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<VitalsError> for ApiError {
    fn from(e: VitalsError) -> Self {
        match e {
            VitalsError::Validation(e) => Self::bad_request(e.to_string()),
            other => {
                tracing::error!(error = %other, "request failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
