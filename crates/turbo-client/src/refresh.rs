//! Single-flight coordination of session refreshes.
//!
//! One `tokio::sync::Mutex` serialises refreshes. Next to it sits a
//! generation counter that advances every time a refresh attempt finishes,
//! successful or not. A request remembers the generation it was decorated
//! under; when its 401 comes back, a newer generation means some other
//! caller already renewed (or ended) the session, so the request follows
//! that outcome instead of refreshing again.
//!
//! Ordering: readers load the generation *before* the access token, and a
//! lease bumps the generation *after* the store has been written. A request
//! holding a stale token is therefore never stamped with the new generation.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

/// Outcome of [`RefreshCoordinator::enter`].
pub(crate) enum Recovery<'a> {
    /// The caller must perform the refresh while holding the lease.
    Lead(RefreshLease<'a>),
    /// A refresh finished after the caller's request was decorated; re-read
    /// the store and replay.
    Follow,
}

#[derive(Debug, Default)]
pub(crate) struct RefreshCoordinator {
    lock: Mutex<()>,
    generation: AtomicU64,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Wait until no refresh is in progress.
    pub(crate) async fn wait_idle(&self) {
        if self.lock.try_lock().is_err() {
            trace!("refresh in progress; holding request until it completes");
            drop(self.lock.lock().await);
        }
    }

    /// Decide who handles a 401 seen on a request decorated at `seen`.
    pub(crate) async fn enter(&self, seen: u64) -> Recovery<'_> {
        let guard = match self.lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("refresh already in flight; waiting for its outcome");
                self.lock.lock().await
            }
        };

        if self.generation() != seen {
            drop(guard);
            return Recovery::Follow;
        }

        Recovery::Lead(RefreshLease {
            _guard: guard,
            generation: &self.generation,
        })
    }
}

/// Exclusive right to refresh. Dropping it publishes a new generation and
/// then releases the lock, on every exit path.
pub(crate) struct RefreshLease<'a> {
    _guard: MutexGuard<'a, ()>,
    generation: &'a AtomicU64,
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        // Runs before `_guard` is dropped, so waiters always see the bump.
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
