//! Error types for the vitals telemetry store.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all vitals operations.
///
/// Each variant wraps a narrower error enum for one concern, so callers can
/// match on the category (e.g. to map validation failures to a client error
/// and persistence failures to a server error) without inspecting details.
#[derive(Error, Debug)]
pub enum VitalsError {
    /// An ingested payload did not match the stream's expectations.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The durable snapshot could not be written.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A subscriber's transport failed during delivery.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A stream or store configuration is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A snapshot file could not be read back.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Errors raised while validating an ingested payload.
///
/// A payload that fails validation is neither persisted nor broadcast.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A numeric stream received something other than a JSON number.
    #[error("stream '{stream}' expects a numeric value, got {found}")]
    NotNumeric {
        /// The target stream.
        stream: String,
        /// JSON type name of what was received.
        found: &'static str,
    },

    /// A numeric field was absent from the message body.
    #[error("stream '{stream}' expects a numeric '{field}' field")]
    MissingField {
        /// The target stream.
        stream: String,
        /// The field that was looked up.
        field: &'static str,
    },

    /// A structured stream received something other than a JSON object.
    #[error("stream '{stream}' expects a JSON object, got {found}")]
    NotObject {
        /// The target stream.
        stream: String,
        /// JSON type name of what was received.
        found: &'static str,
    },

    /// The number is not finite (NaN or infinity cannot be stored as JSON).
    #[error("stream '{stream}' received a non-finite number")]
    NonFinite {
        /// The target stream.
        stream: String,
    },

    /// The message could not be parsed as JSON at all.
    #[error("malformed message: {reason}")]
    Malformed {
        /// Parser diagnostic.
        reason: String,
    },

    /// No stream with this name is configured.
    #[error("unknown stream '{stream}'")]
    UnknownStream {
        /// The requested stream.
        stream: String,
    },
}

/// Errors raised while writing the durable snapshot.
///
/// The in-memory append that triggered the flush is kept when one of these
/// is returned.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The snapshot could not be serialized to JSON.
    #[error("failed to serialize snapshot: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot file (or its temporary sibling) could not be written.
    #[error("failed to write snapshot '{}': {source}", path.display())]
    Write {
        /// The path being written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The temporary file could not be renamed over the snapshot.
    #[error("failed to replace snapshot '{}': {source}", path.display())]
    Rename {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The blocking flush task was cancelled or panicked.
    #[error("flush task failed: {reason}")]
    TaskFailed {
        /// Description from the runtime.
        reason: String,
    },
}

/// Errors raised while reading a snapshot file.
///
/// [`Store::open`](crate::Store::open) recovers from these by starting empty;
/// they only surface through [`read_snapshot`](crate::store::read_snapshot).
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The snapshot file could not be read.
    #[error("failed to read snapshot '{}': {source}", path.display())]
    Read {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file is not a valid `{stream: [reading]}` document.
    #[error("failed to parse snapshot '{}': {source}", path.display())]
    Parse {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by a subscriber's transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The remote end has gone away.
    #[error("transport closed")]
    Closed,

    /// The reading could not be encoded for the wire.
    #[error("failed to encode reading: {source}")]
    Encode {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Sending on the transport failed.
    #[error("send failed: {reason}")]
    Send {
        /// Transport-specific diagnostic.
        reason: String,
    },
}

/// Errors raised while validating stream configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A stream name was empty.
    #[error("stream name must not be empty")]
    EmptyName,

    /// A stream capacity was zero.
    #[error("stream '{name}' capacity must be > 0")]
    ZeroCapacity {
        /// The offending stream.
        name: String,
    },

    /// Two streams share a name.
    #[error("stream '{name}' is configured more than once")]
    DuplicateStream {
        /// The duplicated name.
        name: String,
    },
}

/// Type alias for `Result<T, VitalsError>`.
pub type Result<T> = std::result::Result<T, VitalsError>;
