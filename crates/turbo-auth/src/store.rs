//! Credential storage.

use crate::{Credentials, SessionStatus};
use std::sync::{PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

/// Holder of the current session.
///
/// Writes are atomic: [`set_credentials`](CredentialStore::set_credentials)
/// replaces both tokens at once and
/// [`clear_credentials`](CredentialStore::clear_credentials) removes both.
pub trait CredentialStore: Send + Sync {
    /// The full session, if any.
    fn credentials(&self) -> Option<Credentials>;

    /// Replace the session with a new token pair.
    fn set_credentials(&self, credentials: Credentials);

    /// Remove the session. Returns `true` if a session was actually removed.
    fn clear_credentials(&self) -> bool;

    fn access_token(&self) -> Option<String> {
        self.credentials().map(|c| c.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.credentials().map(|c| c.refresh_token)
    }
}

/// In-process [`CredentialStore`] that publishes sign-in / sign-out
/// transitions to subscribers.
#[derive(Debug)]
pub struct MemoryCredentialStore {
    session: RwLock<Option<Credentials>>,
    status: watch::Sender<SessionStatus>,
}

impl Default for MemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCredentialStore {
    /// Create an empty (signed out) store.
    pub fn new() -> Self {
        let (status, _) = watch::channel(SessionStatus::SignedOut);
        Self {
            session: RwLock::new(None),
            status,
        }
    }

    /// Create a store that starts with a session.
    pub fn with_credentials(credentials: Credentials) -> Self {
        let store = Self::new();
        store.set_credentials(credentials);
        store
    }

    /// Watch session status. The receiver sees `SignedOut` whenever the
    /// session is cleared, e.g. after a failed refresh.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Current session status.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    fn publish(&self, next: SessionStatus) {
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credentials(&self) -> Option<Credentials> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_credentials(&self, credentials: Credentials) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials);
        debug!("session credentials replaced");
        self.publish(SessionStatus::Authenticated);
    }

    fn clear_credentials(&self) -> bool {
        let removed = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if removed {
            info!("session cleared");
            self.publish(SessionStatus::SignedOut);
        }
        removed
    }
}
