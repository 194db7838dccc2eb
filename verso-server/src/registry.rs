use std::sync::Arc;

use dashmap::DashMap;
use verso_collab::{
    FaultHandler, SessionData, SessionTracker, SyncFault, Verso, WorkspaceSync,
};

use crate::errors::ServerResult;

/// Keeps one live [WorkspaceSync] per active workspace.
///
/// Syncs are attached lazily on first use by an authenticated session and
/// shared between sessions operating in the same workspace. Each sync gets
/// its own provider-confirmed tracker, since every path into here has
/// already passed credential checks.
pub struct SyncRegistry {
    verso: Arc<Verso>,
    syncs: DashMap<String, Arc<WorkspaceSync>>,
}

impl SyncRegistry {
    pub fn new(verso: Arc<Verso>) -> Self {
        Self {
            verso,
            syncs: Default::default(),
        }
    }

    /// The live sync for the session's active workspace
    pub async fn workspace(&self, session: &SessionData) -> ServerResult<Arc<WorkspaceSync>> {
        let workspace_id = session.active_workspace_id.clone();

        if let Some(sync) = self.syncs.get(&workspace_id) {
            if sync.is_attached() {
                return Ok(sync.clone());
            }
        }

        let tracker = Arc::new(SessionTracker::confirmed(session.user.clone()));
        let sync = self.verso.sync_workspace(tracker, workspace_id.clone());

        sync.attach(log_faults(&workspace_id)).await?;
        self.syncs.insert(workspace_id, sync.clone());

        Ok(sync)
    }

    /// Detaches and forgets a workspace's sync
    pub fn release(&self, workspace_id: &str) {
        if let Some((_, sync)) = self.syncs.remove(workspace_id) {
            sync.detach();
        }
    }
}

fn log_faults(workspace_id: &str) -> FaultHandler {
    let workspace_id = workspace_id.to_string();

    Arc::new(move |fault| match fault {
        SyncFault::PermissionDenied { collection } => {
            log::error!(
                "Stream {collection:?} on workspace {workspace_id} was denied, re-authentication needed"
            );
        }
        SyncFault::Stream {
            collection,
            message,
        } => {
            log::warn!("Stream {collection:?} on workspace {workspace_id} stopped: {message}");
        }
    })
}
