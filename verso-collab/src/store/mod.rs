use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::broadcast;

mod data;
pub use data::*;

mod mem;
pub use mem::*;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
pub type SharedStore = Arc<dyn Store>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An unknown or internal error happened with the store
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// The store's access rules rejected the operation.
    /// Usually a session/workspace mismatch rather than a transient fault.
    #[error("Permission denied for {resource}")]
    PermissionDenied { resource: &'static str },
    /// A document already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A document doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl StoreError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// The document collections verso keeps in the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Songs,
    Setlists,
    Rehearsals,
    Bands,
}

/// Announces that documents in a collection changed.
/// Live queries re-run and deliver a complete snapshot on every one of these.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: Collection,
}

/// Represents a type that can store and query verso documents.
///
/// Writes are merge-upserts keyed by the document's stable id. Every write
/// bumps a store-wide monotonic revision onto the document, so two query
/// snapshots of the same document can always be ordered deterministically.
#[async_trait]
pub trait Store: Send + Sync {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: UserData) -> Result<UserData>;
    /// Refreshes the provider-owned fields of an existing user
    async fn update_user(&self, updated_user: UserData) -> Result<UserData>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;
    /// Moves a session into another workspace
    async fn set_active_workspace(&self, token: &str, workspace_id: &str) -> Result<SessionData>;

    async fn band_by_id(&self, band_id: &str) -> Result<BandData>;
    async fn bands_with_member(&self, user_id: &str) -> Result<Vec<BandData>>;
    async fn create_band(&self, new_band: BandData) -> Result<BandData>;
    async fn add_band_member(&self, band_id: &str, new_member: BandMemberData)
        -> Result<BandData>;
    async fn delete_band(&self, band_id: &str) -> Result<()>;

    async fn song_by_id(&self, song_id: &str) -> Result<SongData>;
    /// Batch point-read. Ids that don't resolve are skipped, not errors.
    async fn songs_by_ids(&self, song_ids: &[String]) -> Result<Vec<SongData>>;
    async fn songs_by_owner(&self, owner_id: &str) -> Result<Vec<SongData>>;
    async fn songs_by_workspace(&self, workspace_id: &str) -> Result<Vec<SongData>>;
    async fn save_song(&self, song: SongData) -> Result<SongData>;
    async fn delete_song(&self, song_id: &str) -> Result<()>;

    async fn setlist_by_id(&self, setlist_id: &str) -> Result<SetlistData>;
    async fn setlists_by_owner(&self, owner_id: &str) -> Result<Vec<SetlistData>>;
    async fn setlists_by_workspace(&self, workspace_id: &str) -> Result<Vec<SetlistData>>;
    async fn save_setlist(&self, setlist: SetlistData) -> Result<SetlistData>;
    async fn delete_setlist(&self, setlist_id: &str) -> Result<()>;

    async fn rehearsal_by_id(&self, rehearsal_id: &str) -> Result<RehearsalData>;
    async fn rehearsals_by_owner(&self, owner_id: &str) -> Result<Vec<RehearsalData>>;
    async fn rehearsals_by_workspace(&self, workspace_id: &str) -> Result<Vec<RehearsalData>>;
    async fn save_rehearsal(&self, rehearsal: RehearsalData) -> Result<RehearsalData>;
    async fn delete_rehearsal(&self, rehearsal_id: &str) -> Result<()>;

    /// The store's change-notification feed. Live collection sync subscribes
    /// here and re-runs its queries whenever a matching collection changes.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}
