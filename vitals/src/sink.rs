//! Bridge from a [`Subscription`] to a transport.
//!
//! A transport implements [`Sink`] for its connection and hands both to
//! [`pump`]. The pump forwards readings until the subscription ends or the
//! sink fails, then drops the subscription, which unsubscribes it before
//! `pump` returns. Nothing is delivered to a sink after it has reported a
//! failure.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::broadcast::Subscription;
use crate::error::TransportError;
use crate::reading::Reading;

/// One subscriber's transport.
#[async_trait]
pub trait Sink: Send {
    /// Sends one reading to the remote end.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the transport is closed or the send
    /// fails. The pump unsubscribes and stops on the first error.
    async fn deliver(&mut self, stream: &str, reading: &Reading) -> Result<(), TransportError>;
}

/// Forwards readings into an unbounded channel. Handy for in-process
/// observers and tests.
#[async_trait]
impl Sink for mpsc::UnboundedSender<Reading> {
    async fn deliver(&mut self, _stream: &str, reading: &Reading) -> Result<(), TransportError> {
        self.send(reading.clone()).map_err(|_| TransportError::Closed)
    }
}

/// How a [`pump`] ended.
#[derive(Debug)]
pub enum PumpOutcome {
    /// The subscription was unsubscribed elsewhere (slow consumer, explicit
    /// teardown, broadcaster dropped).
    Unsubscribed {
        /// Readings delivered before the end.
        delivered: u64,
    },
    /// The sink reported a failure.
    TransportFailed {
        /// Readings delivered before the failure.
        delivered: u64,
        /// What went wrong.
        error: TransportError,
    },
}

impl PumpOutcome {
    /// Readings delivered before the pump stopped.
    pub fn delivered(&self) -> u64 {
        match self {
            PumpOutcome::Unsubscribed { delivered }
            | PumpOutcome::TransportFailed { delivered, .. } => *delivered,
        }
    }
}

/// Drives `subscription` into `sink` until either side ends.
///
/// The subscription is consumed and unsubscribed before this returns.
pub async fn pump<S>(mut subscription: Subscription, sink: &mut S) -> PumpOutcome
where
    S: Sink + ?Sized,
{
    let mut delivered = 0u64;

    while let Some(reading) = subscription.recv().await {
        if let Err(error) = sink.deliver(subscription.stream(), &reading).await {
            tracing::debug!(
                stream = %subscription.stream(),
                subscriber = %subscription.id(),
                error = %error,
                "transport failed, unsubscribing"
            );
            drop(subscription);
            return PumpOutcome::TransportFailed { delivered, error };
        }
        delivered += 1;
    }

    tracing::debug!(
        stream = %subscription.stream(),
        subscriber = %subscription.id(),
        delivered,
        "subscription ended"
    );
    PumpOutcome::Unsubscribed { delivered }
}
