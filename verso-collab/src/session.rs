use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{LocalStore, UserData};

/// How far the current actor's identity has been resolved.
///
/// Remote data access requires [SessionPhase::Synced]: a locally mirrored
/// user alone is never enough, because the backing store's access rules key
/// off the provider's session, not the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing is known about the current actor yet
    Unresolved,
    /// A mirrored user record was found, but the provider has not
    /// confirmed an active credential. May persist indefinitely.
    LocalOnly,
    /// The provider confirmed an active credential
    Synced,
    /// The actor explicitly signed out
    LoggedOut,
}

/// Tracks the identity session from startup to sign-out
pub struct SessionTracker {
    phase: watch::Sender<SessionPhase>,
    user: Mutex<Option<UserData>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(SessionPhase::Unresolved);

        Self {
            phase,
            user: Default::default(),
        }
    }

    /// Restores the session from the local mirror record. A present user
    /// moves the session to [SessionPhase::LocalOnly] until the provider
    /// confirms.
    pub fn restore(local: &LocalStore) -> Self {
        let tracker = Self::new();
        let record = local.load();

        if let Some(user) = record.user {
            *tracker.user.lock() = Some(user);
            tracker.transition(SessionPhase::LocalOnly);
        }

        tracker
    }

    /// Creates a tracker that is already provider-confirmed, for contexts
    /// where the session was established through an authenticated path.
    pub fn confirmed(user: UserData) -> Self {
        let tracker = Self::new();
        *tracker.user.lock() = Some(user);
        tracker.transition(SessionPhase::Synced);

        tracker
    }

    /// Called when the provider's auth-state stream confirms an active
    /// credential. Mirrors the user locally.
    pub fn confirm(&self, user: UserData, local: &LocalStore) {
        if self.phase() == SessionPhase::LoggedOut {
            return;
        }

        if let Err(e) = local.remember_user(&user) {
            log::warn!("Could not mirror user record: {e}");
        }

        *self.user.lock() = Some(user);
        self.transition(SessionPhase::Synced);
    }

    /// Ends the session: clears the mirrored record and the in-memory user
    pub fn sign_out(&self, local: &LocalStore) {
        if let Err(e) = local.clear_user() {
            log::warn!("Could not clear mirrored user record: {e}");
        }

        *self.user.lock() = None;
        self.transition(SessionPhase::LoggedOut);
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub fn is_synced(&self) -> bool {
        self.phase() == SessionPhase::Synced
    }

    pub fn user(&self) -> Option<UserData> {
        self.user.lock().clone()
    }

    /// Observe phase changes, for consumers that must tear down or
    /// establish subscriptions when the session state moves
    pub fn watch(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    fn transition(&self, next: SessionPhase) {
        self.phase.send_replace(next);
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn user() -> UserData {
        UserData {
            id: "u1".to_string(),
            name: "Alex".to_string(),
            email: "alex@example.com".to_string(),
            picture: String::new(),
        }
    }

    #[test]
    fn test_restore_without_record_stays_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());

        let tracker = SessionTracker::restore(&local);
        assert_eq!(tracker.phase(), SessionPhase::Unresolved);
        assert!(tracker.user().is_none());
    }

    #[test]
    fn test_restore_with_record_is_local_only() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());
        local.remember_user(&user()).unwrap();

        let tracker = SessionTracker::restore(&local);
        assert_eq!(tracker.phase(), SessionPhase::LocalOnly);
        assert!(!tracker.is_synced());
    }

    #[test]
    fn test_provider_confirmation_syncs() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());

        let tracker = SessionTracker::restore(&local);
        tracker.confirm(user(), &local);

        assert_eq!(tracker.phase(), SessionPhase::Synced);
        assert_eq!(local.load().user.unwrap().id, "u1");
    }

    #[test]
    fn test_sign_out_clears_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());

        let tracker = SessionTracker::new();
        tracker.confirm(user(), &local);
        tracker.sign_out(&local);

        assert_eq!(tracker.phase(), SessionPhase::LoggedOut);
        assert!(tracker.user().is_none());
        assert!(local.load().user.is_none());
    }

    #[test]
    fn test_phase_changes_are_observable() {
        let tracker = SessionTracker::new();
        let watch = tracker.watch();

        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path());
        tracker.confirm(user(), &local);

        assert_eq!(*watch.borrow(), SessionPhase::Synced);
    }
}
