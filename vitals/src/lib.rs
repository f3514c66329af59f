//! # vitals
//!
//! Bounded telemetry store with live subscriber fan-out.
//!
//! vitals keeps the most recent readings of a sensor (a heart-rate monitor, an
//! ESP8266 environment sensor) in a fixed-size series, persists them to a
//! single JSON snapshot on every write, and pushes each new reading to any
//! number of live subscribers regardless of how they are connected.
//!
//! ## Key Properties
//!
//! - Bounded retention: each stream keeps at most `capacity` readings, oldest
//!   evicted first
//! - Write-through durability: the snapshot is rewritten atomically after
//!   every append, and a missing or corrupt snapshot starts an empty store
//! - Ordered fan-out: readings of one stream are persisted and broadcast in
//!   ingest order
//! - Slow or dead subscribers are dropped, never allowed to stall ingestion
//! - Timestamps are assigned on ingest; device clocks are never trusted
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vitals::{BroadcastConfig, StoreConfig, StreamConfig, Telemetry};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let telemetry = Telemetry::open(
//!     StoreConfig::new("./db.json", vec![StreamConfig::heart_rate()]),
//!     BroadcastConfig::default(),
//! )?;
//!
//! // A dashboard subscribes for live updates...
//! let mut updates = telemetry.subscribe("heartRates");
//!
//! // ...and a device pushes a reading.
//! telemetry.ingest("heartRates", &json!({ "heartRate": 72 })).await?;
//!
//! let reading = updates.recv().await.expect("subscribed");
//! assert_eq!(reading.value, json!(72));
//! assert_eq!(telemetry.latest("heartRates").await, reading);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`BoundedSeries`] — Capacity-limited FIFO of readings for one stream
//! - [`Store`] — One series per stream plus the durable snapshot
//! - [`Broadcaster`] — Subscriber registry and fan-out
//! - [`Telemetry`] — Ingest port and subscription port over both
//! - [`sink::pump`] — Bridges a [`Subscription`] to a transport
//!
//! ## Modules
//!
//! - [`reading`] — The timestamped data point
//! - [`schema`] — Stream names, capacities, payload kinds
//! - [`series`] — Bounded series
//! - [`store`] — Store lifecycle, append, snapshot
//! - [`broadcast`] — Subscribers and fan-out
//! - [`ingest`] — Payload validation
//! - [`sink`] — Transport bridge
//! - [`telemetry`] — The façade transports talk to
//! - [`error`] — Error types

pub mod broadcast;
pub mod error;
pub mod ingest;
pub mod reading;
pub mod schema;
pub mod series;
pub mod sink;
pub mod store;
pub mod telemetry;

// Re-export primary API types at crate root for convenience.
pub use broadcast::{BroadcastConfig, Broadcaster, SubscriberId, Subscription};
pub use error::{Result, VitalsError};
pub use reading::Reading;
pub use schema::{PayloadKind, StreamConfig};
pub use series::BoundedSeries;
pub use sink::{PumpOutcome, Sink};
pub use store::{Store, StoreConfig};
pub use telemetry::Telemetry;
