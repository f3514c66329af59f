//! Payload validation for the ingest path.
//!
//! Devices send either a bare number, an object carrying a number under a
//! well-known field, or (for structured streams) an arbitrary object. These
//! helpers turn that into the value that gets stored, or reject it. Device
//! supplied timestamps are never looked at; the store stamps every reading.
//!
//! Validation is strict: a numeric stream only accepts JSON numbers. A
//! missing field, a numeric string like `"72"`, or `null` are all rejected.

use serde_json::Value;

use crate::error::ValidationError;
use crate::schema::PayloadKind;

/// Field names checked, in order, when a numeric stream receives an object.
pub const NUMERIC_FIELDS: [&str; 2] = ["heartRate", "value"];

/// Validates `payload` for a stream of the given kind and returns the value
/// to store.
///
/// - Numeric streams accept a JSON number, or an object with a number under
///   one of [`NUMERIC_FIELDS`].
/// - Structured streams accept any JSON object.
///
/// # Errors
///
/// Returns [`ValidationError`] describing why the payload was rejected.
pub fn validate(stream: &str, kind: PayloadKind, payload: &Value) -> Result<Value, ValidationError> {
    match kind {
        PayloadKind::Numeric => numeric(stream, payload),
        PayloadKind::Structured => match payload {
            Value::Object(_) => Ok(payload.clone()),
            other => Err(ValidationError::NotObject {
                stream: stream.to_string(),
                found: type_name(other),
            }),
        },
    }
}

/// Parses a text message (WebSocket frame, serial line) and validates it.
///
/// # Errors
///
/// Returns [`ValidationError::Malformed`] if `text` is not JSON, otherwise
/// whatever [`validate`] returns.
pub fn parse_message(stream: &str, kind: PayloadKind, text: &str) -> Result<Value, ValidationError> {
    let payload: Value = serde_json::from_str(text).map_err(|e| ValidationError::Malformed {
        reason: e.to_string(),
    })?;
    validate(stream, kind, &payload)
}

/// Converts a native number into a storable value.
///
/// # Errors
///
/// Returns [`ValidationError::NonFinite`] for NaN and infinities.
pub fn number(stream: &str, value: f64) -> Result<Value, ValidationError> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ValidationError::NonFinite {
            stream: stream.to_string(),
        })
}

fn numeric(stream: &str, payload: &Value) -> Result<Value, ValidationError> {
    match payload {
        Value::Number(_) => Ok(payload.clone()),
        Value::Object(map) => {
            let Some((_, field)) = NUMERIC_FIELDS
                .iter()
                .find_map(|name| map.get(*name).map(|v| (name, v)))
            else {
                return Err(ValidationError::MissingField {
                    stream: stream.to_string(),
                    field: NUMERIC_FIELDS[0],
                });
            };
            match field {
                Value::Number(_) => Ok(field.clone()),
                other => Err(ValidationError::NotNumeric {
                    stream: stream.to_string(),
                    found: type_name(other),
                }),
            }
        }
        other => Err(ValidationError::NotNumeric {
            stream: stream.to_string(),
            found: type_name(other),
        }),
    }
}

/// JSON type name for diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
