//! Live fan-out of new readings to subscribers.
//!
//! The [`Broadcaster`] keeps a registry of subscribers per stream and pushes
//! every published reading to each of them. It knows nothing about the
//! transports behind the subscribers.
//!
//! # Architecture
//!
//! ```text
//!                       Broadcaster (Arc<Inner>)
//!                  ┌──────────────────────────────┐
//!                  │ streams: HashMap<name,       │
//!                  │   HashMap<SubscriberId,      │
//!                  │     Entry { tx, live }>>     │
//!                  └──────────────┬───────────────┘
//!                                 │ try_send (never blocks)
//!         ┌───────────────────────┼───────────────────────┐
//!         ▼                       ▼                       ▼
//!   [Subscription]          [Subscription]          [Subscription]
//!    rx.recv() ─► SSE        rx.recv() ─► WS         rx.recv() ─► ...
//! ```
//!
//! # Delivery semantics
//!
//! - Best effort, push based: no acknowledgement, no backpressure to the
//!   ingesting device.
//! - Each subscriber has a small bounded buffer. A subscriber whose buffer is
//!   full, or whose receiving half is gone, is dropped from the registry
//!   during `publish`; the others still receive the reading.
//! - No history is replayed to new subscribers.
//! - After unsubscription a [`Subscription`] yields nothing, even readings
//!   that were already sitting in its buffer.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::reading::Reading;

/// Default number of readings buffered per subscriber.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

/// Opaque handle identifying one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Returns the raw numeric id (useful for logging).
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Broadcaster tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    /// Readings buffered per subscriber before it is considered slow.
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

/// Registration entry. The transport owns the connection; this only owns the
/// sending half of the delivery channel.
struct Entry {
    tx: mpsc::Sender<Reading>,
    live: Arc<AtomicBool>,
}

#[derive(Default)]
struct Registry {
    streams: HashMap<String, HashMap<SubscriberId, Entry>>,
    /// Reverse index so `unsubscribe` needs only the id.
    index: HashMap<SubscriberId, String>,
}

impl Registry {
    fn remove(&mut self, id: SubscriberId) -> bool {
        let Some(stream) = self.index.remove(&id) else {
            return false;
        };
        if let Some(subscribers) = self.streams.get_mut(&stream) {
            if let Some(entry) = subscribers.remove(&id) {
                entry.live.store(false, Ordering::Release);
            }
            if subscribers.is_empty() {
                self.streams.remove(&stream);
            }
        }
        true
    }
}

struct Inner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    config: BroadcastConfig,
}

/// Fan-out hub for live readings.
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Broadcaster {
    /// Creates a broadcaster with default configuration.
    pub fn new() -> Self {
        Self::with_config(BroadcastConfig::default())
    }

    /// Creates a broadcaster with custom configuration.
    pub fn with_config(config: BroadcastConfig) -> Self {
        let config = BroadcastConfig {
            subscriber_buffer: config.subscriber_buffer.max(1),
        };
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Returns the broadcaster configuration.
    pub fn config(&self) -> BroadcastConfig {
        self.inner.config
    }

    /// Registers a new subscriber for `stream`.
    ///
    /// The returned [`Subscription`] receives every reading published to
    /// `stream` after this call, in publish order, until it is unsubscribed
    /// or dropped.
    pub fn subscribe(&self, stream: &str) -> Subscription {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.inner.config.subscriber_buffer);
        let live = Arc::new(AtomicBool::new(true));

        let count = {
            let mut registry = self.inner.registry.lock();
            let subscribers = registry.streams.entry(stream.to_string()).or_default();
            subscribers.insert(
                id,
                Entry {
                    tx,
                    live: Arc::clone(&live),
                },
            );
            let count = subscribers.len();
            registry.index.insert(id, stream.to_string());
            count
        };

        tracing::info!(stream = %stream, subscriber = %id, subscribers = count, "subscriber added");

        Subscription {
            id,
            stream: stream.to_string(),
            rx,
            live,
            broadcaster: Arc::downgrade(&self.inner),
        }
    }

    /// Removes a subscriber. Idempotent; unknown ids are ignored.
    ///
    /// Returns `true` if the subscriber was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.registry.lock().remove(id);
        if removed {
            tracing::info!(subscriber = %id, "subscriber removed");
        }
        removed
    }

    /// Delivers `reading` to every subscriber of `stream`.
    ///
    /// Subscribers that cannot take the reading (buffer full or receiver
    /// gone) are unsubscribed; delivery to the rest is unaffected. Returns the
    /// number of subscribers that received it.
    pub fn publish(&self, stream: &str, reading: &Reading) -> usize {
        let mut registry = self.inner.registry.lock();

        let Some(subscribers) = registry.streams.get(stream) else {
            return 0;
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (&id, entry) in subscribers {
            match entry.tx.try_send(reading.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(stream = %stream, subscriber = %id, "subscriber too slow, dropping");
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(stream = %stream, subscriber = %id, "subscriber gone, dropping");
                    failed.push(id);
                }
            }
        }

        for id in failed {
            registry.remove(id);
        }

        tracing::debug!(stream = %stream, delivered, "reading published");
        delivered
    }

    /// Number of subscribers currently registered for `stream`.
    pub fn subscriber_count(&self, stream: &str) -> usize {
        self.inner
            .registry
            .lock()
            .streams
            .get(stream)
            .map_or(0, HashMap::len)
    }

    /// Number of subscribers across all streams.
    pub fn total_subscribers(&self) -> usize {
        self.inner.registry.lock().index.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("config", &self.inner.config)
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

/// Receiving end of one subscriber registration.
///
/// Dropping the subscription unsubscribes it, so a transport that owns the
/// subscription for the lifetime of its connection tears the registration
/// down when the connection goes away.
pub struct Subscription {
    id: SubscriberId,
    stream: String,
    rx: mpsc::Receiver<Reading>,
    live: Arc<AtomicBool>,
    broadcaster: Weak<Inner>,
}

impl Subscription {
    /// This subscriber's id.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The stream this subscription follows.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Returns `true` while the subscriber is registered.
    pub fn is_active(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Waits for the next reading.
    ///
    /// Returns `None` once the subscriber has been unsubscribed (explicitly,
    /// for being slow, or because the broadcaster was dropped).
    pub async fn recv(&mut self) -> Option<Reading> {
        if !self.is_active() {
            return None;
        }
        let reading = self.rx.recv().await?;
        self.is_active().then_some(reading)
    }

    /// Returns the next buffered reading without waiting.
    pub fn try_recv(&mut self) -> Option<Reading> {
        if !self.is_active() {
            return None;
        }
        let reading = self.rx.try_recv().ok()?;
        self.is_active().then_some(reading)
    }

    /// Unsubscribes explicitly. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(inner) = self.broadcaster.upgrade() {
            Broadcaster { inner }.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("stream", &self.stream)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
