use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The type used for document ids. Ids are client-generated random strings,
/// globally unique and stable across edits.
pub type EntityId = String;

/// A verso account, mirrored from the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    /// Avatar URL, as supplied by the provider
    pub picture: String,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    /// The session token, or key if you will
    pub token: String,
    /// The user that is logged in
    pub user: UserData,
    /// The workspace the session currently operates in.
    /// Defaults to the user's own id, the personal workspace.
    pub active_workspace_id: EntityId,
    pub expires_at: DateTime<Utc>,
}

/// The role a member holds within a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Admin,
    Member,
    Guest,
}

/// A member of a band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandMemberData {
    pub user_id: EntityId,
    pub role: MemberRole,
    pub joined_at: i64,
}

/// A band is a shared workspace. Its id doubles as the workspace id
/// that scopes songs, setlists and rehearsals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandData {
    pub id: EntityId,
    pub name: String,
    pub created_by: EntityId,
    pub members: Vec<BandMemberData>,
    pub created_at: i64,
}

impl BandData {
    pub fn member(&self, user_id: &str) -> Option<&BandMemberData> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.member(user_id).is_some()
    }
}

/// A song with freeform lyrics and chords
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongData {
    pub id: EntityId,
    pub title: String,
    pub artist: String,
    /// The lyrics and chords, as plain text
    pub content: String,
    pub key: Option<String>,
    /// Legacy scoping field, set before shared workspaces existed
    pub owner_id: Option<EntityId>,
    pub workspace_id: Option<EntityId>,
    /// Monotonic version assigned by the store on every write
    #[serde(default)]
    pub revision: u64,
}

/// A reusable, ordered repertoire of songs.
/// Duplicate and dangling song ids are permitted by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetlistData {
    pub id: EntityId,
    pub title: String,
    pub description: String,
    /// Ordered Song ids
    pub songs: Vec<EntityId>,
    pub owner_id: EntityId,
    pub workspace_id: Option<EntityId>,
    pub created_at: i64,
    #[serde(default)]
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RehearsalStatus {
    Proposed,
    Confirmed,
    Completed,
}

/// A proposed date, time and location for a rehearsal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RehearsalOption {
    pub id: EntityId,
    /// Calendar date string
    pub date: String,
    pub time: String,
    pub location: String,
    /// Users who voted for this option. Intended as a set.
    pub voter_ids: Vec<EntityId>,
}

impl RehearsalOption {
    pub fn has_voted(&self, user_id: &str) -> bool {
        self.voter_ids.iter().any(|id| id == user_id)
    }

    pub fn vote_count(&self) -> usize {
        self.voter_ids.len()
    }
}

/// A rehearsal being scheduled through option voting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RehearsalData {
    pub id: EntityId,
    pub title: String,
    pub status: RehearsalStatus,
    pub options: Vec<RehearsalOption>,
    /// The winning option, once confirmed. Always references an id
    /// present in `options`.
    pub confirmed_option_id: Option<EntityId>,
    /// An associated library setlist. Takes precedence over `setlist`.
    pub linked_setlist_id: Option<EntityId>,
    /// Ad-hoc Song ids, used only when no setlist is linked
    pub setlist: Vec<EntityId>,
    pub created_by: Option<EntityId>,
    pub workspace_id: Option<EntityId>,
    pub created_at: i64,
    #[serde(default)]
    pub revision: u64,
}

impl RehearsalData {
    pub fn option(&self, option_id: &str) -> Option<&RehearsalOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn confirmed_option(&self) -> Option<&RehearsalOption> {
        self.confirmed_option_id
            .as_deref()
            .and_then(|id| self.option(id))
    }
}
