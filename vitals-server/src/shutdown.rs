//! Server-wide shutdown signal.
//!
//! Long-lived responses (`/events`, `/ws`) never finish on their own, so the
//! graceful shutdown in [`crate::serve`] would wait on them forever. Each of
//! them races its body against [`Shutdown::triggered`] instead.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable handle to one shutdown flag.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// A signal that has not fired.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fires the signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`trigger`](Self::trigger) has been called.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal fires, immediately if it already has.
    pub fn triggered(&self) -> impl Future<Output = ()> + Send + 'static + use<> {
        let mut rx = self.tx.subscribe();
        async move {
            // Err only if every sender is gone, which also means "stop".
            let _ = rx.wait_for(|fired| *fired).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
