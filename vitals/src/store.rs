//! Store module for the vitals telemetry store.
//!
//! The Store owns one [`BoundedSeries`] per stream name and keeps a durable
//! JSON snapshot of all of them in a single file.
//!
//! # Design
//!
//! - Configured streams exist from the moment the store opens, even if empty
//! - Unknown stream names are created lazily on first append using the
//!   store's default capacity
//! - Every append rewrites the whole snapshot (write-through, no buffering)
//! - The snapshot is written to a sibling `.tmp` file and renamed into place,
//!   so a crash mid-write leaves the previous complete snapshot
//! - A missing or corrupt snapshot at open is treated as an empty store
//!
//! # File Layout
//!
//! ```text
//! db.json          <- {"heartRates": [{"timestamp": "...", "value": 72}, ...]}
//! db.json.tmp      <- transient, only exists during a flush
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use vitals::schema::StreamConfig;
//! use vitals::store::{Store, StoreConfig};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::new("./db.json", vec![StreamConfig::heart_rate()]);
//! let mut store = Store::open(config)?;
//!
//! let reading = store.append("heartRates", json!(72))?;
//! assert_eq!(store.latest("heartRates"), reading);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::ser::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{PersistenceError, Result, SnapshotError};
use crate::reading::Reading;
use crate::schema::{PayloadKind, StreamConfig, validate_streams};
use crate::series::BoundedSeries;

/// Capacity used for streams that were not configured up front.
pub const DEFAULT_CAPACITY: usize = 100;

/// Suffix appended to the snapshot file name while a flush is in progress.
const TMP_SUFFIX: &str = ".tmp";

/// The persisted layout: stream name to readings, oldest first.
pub type Snapshot = BTreeMap<String, Vec<Reading>>;

/// Configuration for opening a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Snapshot file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Streams that exist from startup.
    pub streams: Vec<StreamConfig>,
    /// Capacity for lazily created streams.
    pub default_capacity: usize,
}

impl StoreConfig {
    /// File-backed store with the given streams.
    pub fn new<P: Into<PathBuf>>(path: P, streams: Vec<StreamConfig>) -> Self {
        Self {
            path: Some(path.into()),
            streams,
            default_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Memory-only store with the given streams. Flushes are no-ops.
    pub fn in_memory(streams: Vec<StreamConfig>) -> Self {
        Self {
            path: None,
            streams,
            default_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Sets the capacity for lazily created streams.
    #[must_use]
    pub fn default_capacity(mut self, capacity: usize) -> Self {
        self.default_capacity = capacity.max(1);
        self
    }
}

/// Durable-backed holder of all stream series.
///
/// # Thread Safety
///
/// The Store is a plain single-owner value. Appends must be serialized by the
/// caller (the [`Telemetry`](crate::Telemetry) façade holds it behind a write
/// lock), so one reading's flush can never overwrite another's append.
#[derive(Debug)]
pub struct Store {
    /// Snapshot file, if durable.
    path: Option<PathBuf>,
    /// Configuration of every known stream, including lazily created ones.
    configs: HashMap<String, StreamConfig>,
    /// Capacity for lazily created streams.
    default_capacity: usize,
    /// One series per stream; ordered so snapshots are deterministic.
    series: BTreeMap<String, BoundedSeries>,
}

impl Store {
    /// Opens a store, hydrating from the snapshot file if one exists.
    ///
    /// A missing snapshot starts an empty store. An unreadable or corrupt
    /// snapshot is logged and also starts an empty store; the next append
    /// overwrites it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if the stream
    /// configuration is invalid.
    pub fn open(config: StoreConfig) -> Result<Self> {
        validate_streams(&config.streams)?;

        let mut store = Self {
            path: config.path,
            configs: HashMap::with_capacity(config.streams.len()),
            default_capacity: config.default_capacity.max(1),
            series: BTreeMap::new(),
        };

        for stream in config.streams {
            store.series.insert(
                stream.name.clone(),
                BoundedSeries::new(stream.capacity, stream.kind),
            );
            store.configs.insert(stream.name.clone(), stream);
        }

        store.load();
        Ok(store)
    }

    /// Opens a memory-only store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`](crate::error::ConfigError) if the stream
    /// configuration is invalid.
    pub fn open_in_memory(streams: Vec<StreamConfig>) -> Result<Self> {
        Self::open(StoreConfig::in_memory(streams))
    }

    /// Hydrates series from the snapshot file, tolerating absence and
    /// corruption.
    fn load(&mut self) {
        let Some(path) = self.path.clone() else {
            return;
        };

        if !path.exists() {
            tracing::info!(path = %path.display(), "no snapshot found, starting empty");
            return;
        }

        let snapshot = match read_snapshot(&path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "snapshot unusable, starting empty");
                return;
            }
        };

        for (name, mut readings) in snapshot {
            let config = self.config_or_default(&name);

            let restored = readings.len();
            readings.retain(|reading| config.kind.accepts(&reading.value));
            let skipped = restored - readings.len();
            if skipped > 0 {
                tracing::warn!(
                    stream = %name,
                    kind = ?config.kind,
                    skipped,
                    "snapshot readings do not match stream kind, skipping"
                );
            }

            let series = BoundedSeries::from_readings(config.capacity, config.kind, readings);
            tracing::debug!(stream = %name, readings = series.len(), "stream restored");
            self.series.insert(name, series);
        }
    }

    /// Returns the configuration for `name`, registering a default one for
    /// streams that were not configured up front.
    fn config_or_default(&mut self, name: &str) -> StreamConfig {
        self.configs
            .entry(name.to_string())
            .or_insert_with(|| StreamConfig {
                name: name.to_string(),
                capacity: self.default_capacity,
                kind: PayloadKind::Structured,
            })
            .clone()
    }

    /// Stamps and appends a reading in memory without flushing.
    ///
    /// Callers that need the reading broadcast before the (slow) flush
    /// completes use this together with [`Store::flush`]; everyone else
    /// should call [`Store::append`].
    pub fn push(&mut self, stream: &str, value: Value) -> Reading {
        let reading = Reading::stamp(value);

        if !self.series.contains_key(stream) {
            let config = self.config_or_default(stream);
            tracing::info!(stream = %stream, capacity = config.capacity, "stream created");
            self.series.insert(
                stream.to_string(),
                BoundedSeries::new(config.capacity, config.kind),
            );
        }

        if let Some(series) = self.series.get_mut(stream) {
            series.append(reading.clone());
        }

        reading
    }

    /// Appends a reading and persists the full snapshot.
    ///
    /// Returns the stored reading with its assigned timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the snapshot could not be written. The
    /// in-memory append is not rolled back in that case.
    pub fn append(&mut self, stream: &str, value: Value) -> Result<Reading> {
        let reading = self.push(stream, value);
        self.flush()?;
        Ok(reading)
    }

    /// Writes the full current snapshot to disk.
    ///
    /// No-op for memory-only stores.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if serialization, writing, or the final
    /// rename fails.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let data = serde_json::to_vec_pretty(&SnapshotRef(&self.series))
            .map_err(|e| PersistenceError::Serialize { source: e })?;

        let tmp_path = tmp_path_for(path);
        fs::write(&tmp_path, &data).map_err(|e| PersistenceError::Write {
            path: tmp_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, path).map_err(|e| PersistenceError::Rename {
            path: path.clone(),
            source: e,
        })?;

        tracing::trace!(path = %path.display(), bytes = data.len(), "snapshot flushed");
        Ok(())
    }

    /// The newest reading of `stream`, or the sentinel if it has none.
    ///
    /// Unknown streams report the structured (`null`) sentinel.
    pub fn latest(&self, stream: &str) -> Reading {
        match self.series.get(stream) {
            Some(series) => series.latest(),
            None => Reading::sentinel(self.kind_of(stream)),
        }
    }

    /// The most recent `n` readings of `stream` (all if `None`), oldest
    /// first. Unknown streams return an empty window.
    pub fn window(&self, stream: &str, n: Option<usize>) -> Vec<Reading> {
        self.series
            .get(stream)
            .map(|series| series.window(n))
            .unwrap_or_default()
    }

    /// Returns the series for `stream`, if it exists.
    pub fn series(&self, stream: &str) -> Option<&BoundedSeries> {
        self.series.get(stream)
    }

    /// Returns the configuration for `stream`, if it is known.
    pub fn stream_config(&self, stream: &str) -> Option<&StreamConfig> {
        self.configs.get(stream)
    }

    /// Payload kind of `stream`; unknown streams are structured.
    pub fn kind_of(&self, stream: &str) -> PayloadKind {
        self.configs
            .get(stream)
            .map_or(PayloadKind::Structured, |c| c.kind)
    }

    /// Names of all streams, in sorted order.
    pub fn streams(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    /// Returns the snapshot path, if the store is durable.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Reads and parses a snapshot file without opening a store.
///
/// # Errors
///
/// Returns [`SnapshotError`] if the file cannot be read or parsed.
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> std::result::Result<Snapshot, SnapshotError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|e| SnapshotError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&data).map_err(|e| SnapshotError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

/// Borrowed view that serializes the series map in the snapshot layout.
struct SnapshotRef<'a>(&'a BTreeMap<String, BoundedSeries>);

impl Serialize for SnapshotRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, series)| (name, SeriesRef(series))))
    }
}

struct SeriesRef<'a>(&'a BoundedSeries);

impl Serialize for SeriesRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}
