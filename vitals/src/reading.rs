//! The timestamped data point stored and broadcast by vitals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::PayloadKind;

/// One timestamped data point ingested from a device.
///
/// The payload is kept as an opaque JSON value; its shape is checked once at
/// ingestion against the stream's [`PayloadKind`]. The timestamp is always
/// assigned by the store, never taken from the device.
///
/// Serializes as `{"timestamp": "<RFC 3339>", "value": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// When the store accepted this reading.
    pub timestamp: DateTime<Utc>,
    /// The device payload.
    pub value: Value,
}

impl Reading {
    /// Stamps `value` with the current time.
    pub fn stamp(value: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            value,
        }
    }

    /// The placeholder returned by `latest()` for a stream with no readings.
    ///
    /// The timestamp is the Unix epoch so clients can tell it apart from a
    /// real reading.
    pub fn sentinel(kind: PayloadKind) -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            value: kind.sentinel(),
        }
    }

    /// Returns `true` if this is the empty-stream placeholder: stamped at the
    /// epoch and carrying a kind's sentinel value.
    ///
    /// A real reading of `0` or `null` stamped at the epoch is
    /// indistinguishable from the placeholder.
    pub fn is_sentinel(&self) -> bool {
        self.timestamp == DateTime::<Utc>::UNIX_EPOCH
            && [PayloadKind::Numeric, PayloadKind::Structured]
                .into_iter()
                .any(|kind| self.value == kind.sentinel())
    }

    /// Returns the payload as a number, if it is one.
    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_f64()
    }
}
