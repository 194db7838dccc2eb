mod auth;
mod composer;
mod events;
mod identity;
mod local;
mod rehearsals;
mod session;
mod setlists;
mod songs;
mod store;
mod sync;
mod util;
mod workspaces;

use std::sync::Arc;

use tokio::sync::broadcast;

pub use auth::*;
pub use composer::*;
pub use events::*;
pub use identity::*;
pub use local::*;
pub use rehearsals::*;
pub use session::*;
pub use setlists::*;
pub use songs::*;
pub use store::*;
pub use sync::*;
pub use workspaces::*;

const EVENT_CHANNEL_SIZE: usize = 256;

/// The verso collab system, facilitating band workspaces, song and setlist
/// management, rehearsal scheduling, and live collection sync.
pub struct Verso {
    context: VersoContext,

    pub auth: Auth,
    pub workspaces: Workspaces,
    pub songs: SongManager,
    pub setlists: SetlistManager,
    pub rehearsals: RehearsalManager,
    pub composer: Composer,
}

/// A type passed to the components of the collab system, to access the
/// store, track optimistic writes, and emit events.
#[derive(Clone)]
pub struct VersoContext {
    pub store: SharedStore,
    pub writes: Arc<WriteTracker>,
    events: EventSender,
}

impl VersoContext {
    pub fn new(store: SharedStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Self {
            store,
            writes: Arc::new(WriteTracker::new()),
            events,
        }
    }

    pub fn emit(&self, event: VersoEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }
}

impl Verso {
    pub fn new(
        store: SharedStore,
        provider: Arc<dyn IdentityProvider>,
        composer: Composer,
    ) -> Self {
        let context = VersoContext::new(store);

        Self {
            auth: Auth::new(&context, provider),
            workspaces: Workspaces::new(&context),
            songs: SongManager::new(&context),
            setlists: SetlistManager::new(&context),
            rehearsals: RehearsalManager::new(&context),
            composer,
            context,
        }
    }

    pub fn context(&self) -> &VersoContext {
        &self.context
    }

    /// Subscribe to everything the system emits
    pub fn listen(&self) -> EventReceiver {
        self.context.subscribe()
    }

    /// Restores client session state from the local mirror record.
    /// The session stays short of Synced until a credential confirms.
    pub fn restore_session(&self, local: &LocalStore) -> Arc<SessionTracker> {
        Arc::new(SessionTracker::restore(local))
    }

    /// Exchanges a provider credential for a session and moves the tracker
    /// to Synced, mirroring the user locally
    pub async fn login(
        &self,
        credential: &str,
        tracker: &SessionTracker,
        local: &LocalStore,
    ) -> Result<SessionData, AuthError> {
        let session = self.auth.login_with_credential(credential).await?;
        tracker.confirm(session.user.clone(), local);

        Ok(session)
    }

    /// Ends the session remotely and locally
    pub async fn sign_out(&self, token: &str, tracker: &SessionTracker, local: &LocalStore) {
        if let Err(e) = self.auth.logout(token).await {
            log::warn!("Could not end remote session: {e}");
        }

        tracker.sign_out(local);
    }

    /// Creates a live sync handle for a workspace under the given session
    pub fn sync_workspace(
        &self,
        session: Arc<SessionTracker>,
        workspace_id: impl Into<String>,
    ) -> Arc<WorkspaceSync> {
        WorkspaceSync::new(&self.context, session, workspace_id)
    }
}
