//! Stream schema types for vitals telemetry storage.
//!
//! A schema names a stream, fixes how many readings it retains, and says what
//! shape of payload it accepts. Schema configuration happens when the store is
//! opened and never changes afterwards.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Name of the heart-rate stream.
pub const HEART_RATE_STREAM: &str = "heartRates";

/// Name of the generic sensor stream.
pub const SENSOR_STREAM: &str = "sensorData";

/// Retention for heart-rate monitors.
pub const HEART_RATE_CAPACITY: usize = 1000;

/// Retention for generic sensors.
pub const SENSOR_CAPACITY: usize = 100;

/// Shape of payload a stream accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// A single JSON number (e.g. beats per minute).
    Numeric,
    /// An open-ended JSON object of sensor fields.
    #[default]
    Structured,
}

impl PayloadKind {
    /// The value reported by `latest()` before any reading arrives.
    ///
    /// Numeric streams report `0`, structured streams report `null`.
    pub fn sentinel(self) -> Value {
        match self {
            PayloadKind::Numeric => Value::from(0),
            PayloadKind::Structured => Value::Null,
        }
    }

    /// Whether `value` has the shape this kind stores: a finite number or an
    /// object.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            PayloadKind::Numeric => value.as_f64().is_some_and(f64::is_finite),
            PayloadKind::Structured => value.is_object(),
        }
    }
}

/// Configuration for one named stream.
///
/// # Example
///
/// ```rust
/// use vitals::schema::{PayloadKind, StreamConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let spo2 = StreamConfig::new("spo2", 500, PayloadKind::Numeric)?;
/// assert_eq!(spo2.capacity, 500);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Stream name; also the key in the persisted snapshot.
    pub name: String,

    /// Maximum number of readings retained. Older readings are evicted first.
    pub capacity: usize,

    /// Payload shape accepted by the ingest path.
    #[serde(default)]
    pub kind: PayloadKind,
}

impl StreamConfig {
    /// Creates and validates a stream configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the name is empty or the capacity is zero.
    pub fn new(name: impl Into<String>, capacity: usize, kind: PayloadKind) -> Result<Self> {
        let config = Self {
            name: name.into(),
            capacity,
            kind,
        };
        config.validate()?;
        Ok(config)
    }

    /// Heart-rate monitor stream: numeric, 1000 readings.
    pub fn heart_rate() -> Self {
        Self {
            name: HEART_RATE_STREAM.to_string(),
            capacity: HEART_RATE_CAPACITY,
            kind: PayloadKind::Numeric,
        }
    }

    /// Generic sensor stream: structured, 100 readings.
    pub fn sensor() -> Self {
        Self {
            name: SENSOR_STREAM.to_string(),
            capacity: SENSOR_CAPACITY,
            kind: PayloadKind::Structured,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName.into());
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: self.name.clone(),
            }
            .into());
        }
        Ok(())
    }
}

/// Validates a full set of stream configurations, including name uniqueness.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found.
pub fn validate_streams(streams: &[StreamConfig]) -> Result<()> {
    let mut seen = HashSet::with_capacity(streams.len());
    for stream in streams {
        stream.validate()?;
        if !seen.insert(stream.name.as_str()) {
            return Err(ConfigError::DuplicateStream {
                name: stream.name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VitalsError;

    #[test]
    fn test_presets() {
        let hr = StreamConfig::heart_rate();
        assert_eq!(hr.name, "heartRates");
        assert_eq!(hr.capacity, 1000);
        assert_eq!(hr.kind, PayloadKind::Numeric);

        let sensor = StreamConfig::sensor();
        assert_eq!(sensor.name, "sensorData");
        assert_eq!(sensor.capacity, 100);
        assert_eq!(sensor.kind, PayloadKind::Structured);
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(PayloadKind::Numeric.sentinel(), Value::from(0));
        assert_eq!(PayloadKind::Structured.sentinel(), Value::Null);
    }

    #[test]
    fn test_accepts_stored_shapes() {
        assert!(PayloadKind::Numeric.accepts(&Value::from(72)));
        assert!(PayloadKind::Numeric.accepts(&Value::from(36.6)));
        assert!(!PayloadKind::Numeric.accepts(&serde_json::json!({"heartRate": 72})));
        assert!(!PayloadKind::Numeric.accepts(&Value::from("72")));

        assert!(PayloadKind::Structured.accepts(&serde_json::json!({"temperature": 21.5})));
        assert!(!PayloadKind::Structured.accepts(&Value::from(21.5)));
        assert!(!PayloadKind::Structured.accepts(&Value::Null));
    }

    #[test]
    fn test_stream_config_validation() {
        assert!(StreamConfig::new("ok", 1, PayloadKind::Numeric).is_ok());

        let err = StreamConfig::new("", 10, PayloadKind::Numeric).unwrap_err();
        assert!(matches!(err, VitalsError::Config(ConfigError::EmptyName)));

        let err = StreamConfig::new("zero", 0, PayloadKind::Numeric).unwrap_err();
        assert!(matches!(
            err,
            VitalsError::Config(ConfigError::ZeroCapacity { .. })
        ));
    }

    #[test]
    fn test_duplicate_streams_rejected() {
        let streams = vec![StreamConfig::heart_rate(), StreamConfig::heart_rate()];
        let err = validate_streams(&streams).unwrap_err();
        assert!(matches!(
            err,
            VitalsError::Config(ConfigError::DuplicateStream { ref name }) if name == "heartRates"
        ));

        assert!(validate_streams(&[StreamConfig::heart_rate(), StreamConfig::sensor()]).is_ok());
    }

    #[test]
    fn test_kind_deserializes_from_snake_case() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"name":"hr","capacity":5,"kind":"numeric"}"#).unwrap();
        assert_eq!(config.kind, PayloadKind::Numeric);

        let config: StreamConfig = serde_json::from_str(r#"{"name":"env","capacity":5}"#).unwrap();
        assert_eq!(config.kind, PayloadKind::Structured);
    }
}
