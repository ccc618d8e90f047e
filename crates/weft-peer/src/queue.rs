use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::error::WeftPeerError;

/// Bounded-concurrency FIFO for outgoing interaction requests.
///
/// Admits a fixed number of concurrent interactions and spaces successive
/// admissions a minimum interval apart, so bursts do not overwhelm
/// resource-constrained endpoints. Admission order is strict arrival
/// order; there are no priorities.
///
/// `close` is graceful: waiting admissions fail, permits already handed
/// out stay valid until dropped.
pub struct InteractionQueue {
    permits: Arc<Semaphore>,
    gate: Mutex<Option<Instant>>,
    spacing: Duration,
}

/// Proof of admission. Holding it counts against the concurrency bound;
/// dropping it frees the slot for the next waiter.
pub struct InteractionPermit {
    _permit: OwnedSemaphorePermit,
}

impl InteractionQueue {
    pub fn new(concurrency: usize, spacing: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            gate: Mutex::new(None),
            spacing,
        }
    }

    /// Wait for admission. Returns [`WeftPeerError::QueueClosed`] once the
    /// queue is closed.
    pub async fn admit(&self) -> Result<InteractionPermit, WeftPeerError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WeftPeerError::QueueClosed)?;

        // Serialize the spacing gate: whoever holds it is the next
        // admission, everyone behind waits their full share.
        let mut last = self.gate.lock().await;
        if let Some(previous) = *last {
            let since = previous.elapsed();
            if since < self.spacing {
                tokio::time::sleep(self.spacing - since).await;
            }
        }
        *last = Some(Instant::now());
        drop(last);

        Ok(InteractionPermit { _permit: permit })
    }

    /// Stop admitting. In-flight permits complete normally.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}
