//! Server configuration loaded from `vitals.toml`.
//!
//! Every section is optional; anything missing falls back to its default.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 3001
//! log_level = "info"
//!
//! [store]
//! path = "db.json"
//! default_capacity = 100
//!
//! [broadcast]
//! subscriber_buffer = 16
//!
//! [sse]
//! mode = "push"            # or "poll"
//! poll_interval_secs = 5
//!
//! [[streams]]
//! name = "heartRates"
//! capacity = 1000
//! kind = "numeric"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use vitals::broadcast::{BroadcastConfig, DEFAULT_SUBSCRIBER_BUFFER};
use vitals::schema::StreamConfig;
use vitals::store::{DEFAULT_CAPACITY, StoreConfig};

/// Port used when neither the file nor the command line sets one.
pub const DEFAULT_PORT: u16 = 3001;

/// Config file picked up from the working directory when `--config` is not
/// given.
pub const DEFAULT_CONFIG_PATH: &str = "config/vitals.toml";

/// Errors loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and logging.
    pub server: ListenConfig,
    /// Snapshot location and lazily created stream capacity.
    pub store: StoreSection,
    /// Subscriber buffering.
    pub broadcast: BroadcastSection,
    /// Server-sent events behaviour.
    pub sse: SseConfig,
    /// Configured streams.
    pub streams: Vec<StreamConfig>,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Snapshot file.
    pub path: PathBuf,
    /// Capacity for streams not listed under `[[streams]]`.
    pub default_capacity: usize,
}

/// `[broadcast]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastSection {
    /// Readings buffered per subscriber before it is dropped as slow.
    pub subscriber_buffer: usize,
}

/// How `/events` feeds a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SseMode {
    /// Forward every published reading.
    #[default]
    Push,
    /// Re-send the latest reading on a fixed interval.
    Poll,
}

/// `[sse]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// Push or poll.
    pub mode: SseMode,
    /// Interval for poll mode.
    pub poll_interval_secs: u64,
}

impl SseConfig {
    /// Poll interval, at least one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db.json"),
            default_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            mode: SseMode::Push,
            poll_interval_secs: 5,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ListenConfig::default(),
            store: StoreSection::default(),
            broadcast: BroadcastSection::default(),
            sse: SseConfig::default(),
            streams: vec![StreamConfig::heart_rate(), StreamConfig::sensor()],
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError`] if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigFileError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content).map_err(|e| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text does not match the schema.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Loads `explicit` if given, else [`DEFAULT_CONFIG_PATH`] if it exists,
    /// else the defaults. Also returns the file actually used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError`] if a chosen file cannot be loaded.
    pub fn load_or_default(
        explicit: Option<&Path>,
    ) -> Result<(Self, Option<PathBuf>), ConfigFileError> {
        let candidate = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
        };

        match candidate {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Store configuration for [`vitals::Telemetry::open`].
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.store.path, self.streams.clone())
            .default_capacity(self.store.default_capacity)
    }

    /// Broadcaster configuration for [`vitals::Telemetry::open`].
    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig {
            subscriber_buffer: self.broadcast.subscriber_buffer,
        }
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitals::schema::{HEART_RATE_STREAM, PayloadKind, SENSOR_STREAM};

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.store.path, PathBuf::from("db.json"));
        assert_eq!(config.store.default_capacity, 100);
        assert_eq!(config.broadcast.subscriber_buffer, 16);
        assert_eq!(config.sse.mode, SseMode::Push);
        assert_eq!(config.sse.poll_interval(), Duration::from_secs(5));

        let names: Vec<_> = config.streams.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![HEART_RATE_STREAM, SENSOR_STREAM]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ServerConfig::parse(
            r#"
            [server]
            port = 8080

            [sse]
            mode = "poll"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.sse.mode, SseMode::Poll);
        assert_eq!(config.sse.poll_interval_secs, 5);
        assert_eq!(config.streams.len(), 2);
    }

    #[test]
    fn test_streams_replace_defaults() {
        let config = ServerConfig::parse(
            r#"
            [[streams]]
            name = "spo2"
            capacity = 50
            kind = "numeric"

            [[streams]]
            name = "env"
            capacity = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.streams.len(), 2);
        assert_eq!(config.streams[0].kind, PayloadKind::Numeric);
        assert_eq!(config.streams[1].kind, PayloadKind::Structured);
    }

    #[test]
    fn test_bad_mode_rejected() {
        assert!(ServerConfig::parse("[sse]\nmode = \"sometimes\"").is_err());
    }

    #[test]
    fn test_load_errors_carry_path() {
        let err = ServerConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigFileError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    fn test_explicit_file_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitals.toml");
        std::fs::write(&path, "[store]\npath = \"/tmp/x.json\"").unwrap();

        let (config, used) = ServerConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(used.as_deref(), Some(path.as_path()));
        assert_eq!(config.store.path, PathBuf::from("/tmp/x.json"));
    }
}
