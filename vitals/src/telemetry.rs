//! The façade that ties the store and the broadcaster together.
//!
//! [`Telemetry`] is what transports talk to. It is the ingest port (validate,
//! append, flush, publish) and hands out subscriptions for the subscription
//! port. Poll reads go straight to the store.
//!
//! # Ordering
//!
//! Every ingest takes the store's write lock and holds it across the
//! in-memory append, the snapshot flush, and the publish. Readings of one
//! stream are therefore persisted and broadcast in exactly the order they
//! were ingested, and a flush can never overwrite a concurrent append.
//! Readers share the lock and observe the store either before or after an
//! ingest, never in between.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::broadcast::{BroadcastConfig, Broadcaster, SubscriberId, Subscription};
use crate::error::{PersistenceError, Result, ValidationError, VitalsError};
use crate::ingest;
use crate::reading::Reading;
use crate::schema::{PayloadKind, StreamConfig};
use crate::store::{Store, StoreConfig};

/// Shared handle to the store and broadcaster.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct Telemetry {
    store: Arc<RwLock<Store>>,
    broadcaster: Broadcaster,
}

impl Telemetry {
    /// Wraps an already opened store.
    pub fn new(store: Store, broadcaster: Broadcaster) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            broadcaster,
        }
    }

    /// Opens the store and creates a broadcaster.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream configuration is invalid.
    pub fn open(store: StoreConfig, broadcast: BroadcastConfig) -> Result<Self> {
        Ok(Self::new(
            Store::open(store)?,
            Broadcaster::with_config(broadcast),
        ))
    }

    /// Validates `payload` against the stream's kind and ingests it.
    ///
    /// The stream must be known to the store; devices cannot create streams.
    ///
    /// # Errors
    ///
    /// - [`ValidationError`] if the stream is unknown or the payload has the
    ///   wrong shape; nothing is stored or broadcast.
    /// - [`PersistenceError`] if the snapshot could not be written; the
    ///   reading is still kept in memory and broadcast.
    pub async fn ingest(&self, stream: &str, payload: &Value) -> Result<Reading> {
        let kind = self.kind_of(stream).await?;
        let value = ingest::validate(stream, kind, payload)?;
        self.commit(stream, value).await
    }

    /// Parses a text message and ingests it.
    ///
    /// # Errors
    ///
    /// As [`Telemetry::ingest`], plus [`ValidationError::Malformed`] for text
    /// that is not JSON.
    pub async fn ingest_message(&self, stream: &str, text: &str) -> Result<Reading> {
        let kind = self.kind_of(stream).await?;
        let value = ingest::parse_message(stream, kind, text)?;
        self.commit(stream, value).await
    }

    /// Ingests a native number.
    ///
    /// # Errors
    ///
    /// As [`Telemetry::ingest`], plus [`ValidationError::NonFinite`] for NaN
    /// and infinities.
    pub async fn ingest_number(&self, stream: &str, value: f64) -> Result<Reading> {
        let value = ingest::number(stream, value)?;
        self.ingest(stream, &value).await
    }

    async fn kind_of(&self, stream: &str) -> Result<PayloadKind> {
        self.store
            .read()
            .await
            .stream_config(stream)
            .map(|c| c.kind)
            .ok_or_else(|| {
                ValidationError::UnknownStream {
                    stream: stream.to_string(),
                }
                .into()
            })
    }

    /// Appends, flushes, and publishes under the write lock.
    ///
    /// The flush is blocking file I/O, so the whole critical section runs on
    /// the blocking pool.
    async fn commit(&self, stream: &str, value: Value) -> Result<Reading> {
        let store = Arc::clone(&self.store);
        let broadcaster = self.broadcaster.clone();
        let stream = stream.to_string();

        let (reading, flushed) = tokio::task::spawn_blocking(move || {
            let mut store = store.blocking_write();
            let reading = store.push(&stream, value);
            let flushed = store.flush();
            broadcaster.publish(&stream, &reading);
            tracing::debug!(stream = %stream, value = %reading.value, "reading ingested");
            if let Err(e) = &flushed {
                tracing::error!(stream = %stream, error = %e, "snapshot flush failed");
            }
            (reading, flushed)
        })
        .await
        .map_err(|e| {
            VitalsError::from(PersistenceError::TaskFailed {
                reason: e.to_string(),
            })
        })?;

        flushed.map(|()| reading)
    }

    /// The newest reading of `stream`, or the sentinel.
    pub async fn latest(&self, stream: &str) -> Reading {
        self.store.read().await.latest(stream)
    }

    /// The most recent `n` readings of `stream` (all if `None`), oldest first.
    pub async fn window(&self, stream: &str, n: Option<usize>) -> Vec<Reading> {
        self.store.read().await.window(stream, n)
    }

    /// Names of all streams.
    pub async fn streams(&self) -> Vec<String> {
        self.store
            .read()
            .await
            .streams()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Configuration of `stream`, if known.
    pub async fn stream_config(&self, stream: &str) -> Option<StreamConfig> {
        self.store.read().await.stream_config(stream).cloned()
    }

    /// Registers a live subscriber. See [`Broadcaster::subscribe`].
    pub fn subscribe(&self, stream: &str) -> Subscription {
        self.broadcaster.subscribe(stream)
    }

    /// Removes a live subscriber. See [`Broadcaster::unsubscribe`].
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.broadcaster.unsubscribe(id)
    }

    /// The broadcaster, for subscriber statistics.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }
}
