//! Asynchronous construction.
//!
//! Components whose initialization may suspend (storage loads, network
//! binds) expose a [`Construction`] handle. Callers that reach a component
//! through normal code paths call [`Construction::assert`] and can never
//! observe a half-built instance; callers that want to wait use
//! [`Construction::wait`]. When initialization is in fact synchronous,
//! [`Construction::active`] makes the whole mechanism free of suspension.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::WeftPeerError;

/// Where a component is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStatus {
    /// Construction is still running.
    Initializing,
    /// Construction succeeded; the component is usable.
    Active,
    /// Construction failed; the component will never become usable.
    Incapacitated,
    /// The component was cancelled or torn down.
    Destroyed,
}

type CancelHook = Box<dyn FnOnce() + Send>;

struct Shared {
    what: &'static str,
    status: watch::Sender<LifecycleStatus>,
    error: Mutex<Option<WeftPeerError>>,
    started: AtomicBool,
    cancel_hook: Mutex<Option<CancelHook>>,
}

impl Shared {
    fn finish(&self, result: Result<(), WeftPeerError>) {
        // A cancel that raced ahead wins; terminal states never regress.
        if *self.status.borrow() != LifecycleStatus::Initializing {
            return;
        }
        match result {
            Ok(()) => {
                self.status.send_replace(LifecycleStatus::Active);
            }
            Err(e) => {
                tracing::warn!("lifecycle: {} failed to initialize: {e}", self.what);
                *self.error.lock() = Some(e);
                self.status.send_replace(LifecycleStatus::Incapacitated);
            }
        }
    }
}

/// Handle tracking the asynchronous construction of one component.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone)]
pub struct Construction {
    shared: Arc<Shared>,
}

impl Construction {
    /// A construction that already completed synchronously.
    pub fn active(what: &'static str) -> Self {
        let handle = Self::with_status(what, LifecycleStatus::Active);
        handle.shared.started.store(true, Ordering::SeqCst);
        handle
    }

    /// A construction whose initializer will be supplied later via
    /// [`Construction::start`].
    pub fn deferred(what: &'static str) -> Self {
        Self::with_status(what, LifecycleStatus::Initializing)
    }

    /// Create and immediately start: the common asynchronous path.
    pub fn initializing<F>(what: &'static str, init: F) -> Self
    where
        F: Future<Output = Result<(), WeftPeerError>> + Send + 'static,
    {
        let handle = Self::deferred(what);
        // First start on a fresh handle cannot be refused.
        let _ = handle.start(init);
        handle
    }

    fn with_status(what: &'static str, status: LifecycleStatus) -> Self {
        let (status, _) = watch::channel(status);
        Self {
            shared: Arc::new(Shared {
                what,
                status,
                error: Mutex::new(None),
                started: AtomicBool::new(false),
                cancel_hook: Mutex::new(None),
            }),
        }
    }

    /// Attach a cancel hook. Without one, [`Construction::cancel`] is a
    /// silent no-op.
    pub fn with_cancel(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *self.shared.cancel_hook.lock() = Some(Box::new(hook));
        self
    }

    /// Run the deferred initializer. Refuses a second start.
    pub fn start<F>(&self, init: F) -> Result<(), WeftPeerError>
    where
        F: Future<Output = Result<(), WeftPeerError>> + Send + 'static,
    {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(WeftPeerError::Implementation(format!(
                "construction of {} already started",
                self.shared.what
            )));
        }
        if *self.shared.status.borrow() != LifecycleStatus::Initializing {
            // Cancelled before the initializer arrived; nothing to run,
            // waiters already observed the terminal state.
            return Ok(());
        }
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let result = init.await;
            shared.finish(result);
        });
        Ok(())
    }

    pub fn status(&self) -> LifecycleStatus {
        *self.shared.status.borrow()
    }

    /// True once construction has succeeded. Never regresses.
    pub fn ready(&self) -> bool {
        self.status() == LifecycleStatus::Active
    }

    pub fn error(&self) -> Option<WeftPeerError> {
        self.shared.error.lock().clone()
    }

    /// Guard for methods that must not run on a half-built component.
    pub fn assert(&self) -> Result<(), WeftPeerError> {
        match self.status() {
            LifecycleStatus::Active => Ok(()),
            LifecycleStatus::Initializing => Err(WeftPeerError::UninitializedDependency {
                what: self.shared.what.to_string(),
                message: "construction has not completed".into(),
            }),
            LifecycleStatus::Destroyed => Err(WeftPeerError::UninitializedDependency {
                what: self.shared.what.to_string(),
                message: "construction was cancelled".into(),
            }),
            LifecycleStatus::Incapacitated => Err(WeftPeerError::IncapacitatedDependency {
                what: self.shared.what.to_string(),
                cause: self
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown cause".into()),
            }),
        }
    }

    /// Wait for construction to reach a terminal state.
    ///
    /// Works before `start` is called as well: the wait completes once the
    /// eventually-supplied initializer resolves (or the construction is
    /// cancelled).
    pub async fn wait(&self) -> Result<(), WeftPeerError> {
        let mut rx = self.shared.status.subscribe();
        loop {
            if *rx.borrow_and_update() != LifecycleStatus::Initializing {
                return self.assert();
            }
            if rx.changed().await.is_err() {
                // Sender lives inside the shared state this handle holds,
                // so this only happens during teardown.
                return self.assert();
            }
        }
    }

    /// Cancel the construction.
    ///
    /// Only acts when a cancel hook was supplied and construction has not
    /// reached a terminal state; then the hook runs and the status becomes
    /// [`LifecycleStatus::Destroyed`], waking every waiter.
    pub fn cancel(&self) {
        let hook = self.shared.cancel_hook.lock().take();
        let Some(hook) = hook else {
            return;
        };
        if *self.shared.status.borrow() != LifecycleStatus::Initializing {
            return;
        }
        hook();
        self.shared.status.send_replace(LifecycleStatus::Destroyed);
    }
}

impl std::fmt::Debug for Construction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Construction")
            .field("what", &self.shared.what)
            .field("status", &self.status())
            .finish()
    }
}
