//! Force-logout broadcast.
//!
//! The request pipeline calls `emit` whenever the server answers 401. Whoever
//! owns session state subscribes here and reacts (clears the stored token,
//! routes back to login). The pipeline never learns who is listening.
//!
//! There is no global instance; the composition root creates one
//! `ForceLogout` and hands clones to the client and to the session owner.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

/// Zero-argument callback run on every forced logout.
pub type LogoutCallback = Arc<dyn Fn() + Send + Sync>;

type Subscribers = Mutex<Vec<LogoutCallback>>;

#[derive(Clone, Default)]
pub struct ForceLogout {
    subscribers: Arc<Subscribers>,
}

impl std::fmt::Debug for ForceLogout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceLogout")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ForceLogout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`. Registering the same `Arc` again is a no-op, and
    /// either returned handle removes it.
    pub fn subscribe(&self, callback: LogoutCallback) -> Subscription {
        {
            let mut subscribers = lock(&self.subscribers);
            if !subscribers.iter().any(|existing| same_callback(existing, &callback)) {
                subscribers.push(callback.clone());
            }
        }
        Subscription {
            subscribers: Arc::downgrade(&self.subscribers),
            callback,
        }
    }

    pub fn subscribe_fn<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(callback))
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Call every current subscriber once. A panicking subscriber is logged
    /// and skipped; it never reaches the caller or the other subscribers.
    ///
    /// Returns how many subscribers were invoked.
    pub fn emit(&self) -> usize {
        // Snapshot so callbacks may subscribe/unsubscribe without deadlocking.
        let snapshot: Vec<LogoutCallback> = lock(&self.subscribers).clone();
        debug!(subscribers = snapshot.len(), "emitting force logout");

        for callback in &snapshot {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
                let panic_msg = if let Some(s) = payload.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                warn!(panic = %panic_msg, "force logout subscriber panicked");
            }
        }
        snapshot.len()
    }
}

/// Handle returned by `ForceLogout::subscribe`.
///
/// Dropping it leaves the registration in place; call `unsubscribe` to remove
/// it.
pub struct Subscription {
    subscribers: Weak<Subscribers>,
    callback: LogoutCallback,
}

impl Subscription {
    /// Remove this registration. Safe to call more than once.
    pub fn unsubscribe(&self) {
        let Some(subscribers) = self.subscribers.upgrade() else {
            return;
        };
        lock(&subscribers).retain(|existing| !same_callback(existing, &self.callback));
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

fn same_callback(a: &LogoutCallback, b: &LogoutCallback) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// Callbacks run outside the lock, so a poisoned mutex still holds a
// consistent list.
fn lock(subscribers: &Subscribers) -> MutexGuard<'_, Vec<LogoutCallback>> {
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}
