use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::{
    BandData, BandMemberData, ChangeEvent, Collection, NewSession, RehearsalData, Result,
    SessionData, SetlistData, SongData, Store, StoreError, UserData,
};

const CHANGE_CHANNEL_SIZE: usize = 256;

/// The in-process reference store.
///
/// Implements the same contract as the managed document database: documents
/// keyed by client-generated ids, merge-upserts, full-set query snapshots,
/// and a change feed. Used by tests and local development.
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserData>>,
    sessions: RwLock<HashMap<String, SessionData>>,
    bands: RwLock<HashMap<String, BandData>>,
    songs: RwLock<HashMap<String, SongData>>,
    setlists: RwLock<HashMap<String, SetlistData>>,
    rehearsals: RwLock<HashMap<String, RehearsalData>>,
    revision: AtomicU64,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);

        Self {
            users: Default::default(),
            sessions: Default::default(),
            bands: Default::default(),
            songs: Default::default(),
            setlists: Default::default(),
            rehearsals: Default::default(),
            revision: AtomicU64::new(1),
            changes,
        }
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst)
    }

    fn notify(&self, collection: Collection) {
        // Nobody listening is fine
        let _ = self.changes.send(ChangeEvent { collection });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        self.users
            .read()
            .get(user_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    async fn create_user(&self, new_user: UserData) -> Result<UserData> {
        let mut users = self.users.write();

        if users.contains_key(&new_user.id) {
            return Err(StoreError::Conflict {
                resource: "user",
                field: "id",
                value: new_user.id,
            });
        }

        users.insert(new_user.id.clone(), new_user.clone());
        Ok(new_user)
    }

    async fn update_user(&self, updated_user: UserData) -> Result<UserData> {
        let mut users = self.users.write();

        let user = users
            .get_mut(&updated_user.id)
            .ok_or(StoreError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        *user = updated_user.clone();
        Ok(updated_user)
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let not_found = StoreError::NotFound {
            resource: "session",
            identifier: "token",
        };

        let session = self.sessions.read().get(token).cloned().ok_or(not_found)?;

        if session.expires_at < Utc::now() {
            return Err(StoreError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(session)
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let user = self.user_by_id(&new_session.user_id).await?;
        let mut sessions = self.sessions.write();

        if sessions.contains_key(&new_session.token) {
            return Err(StoreError::Conflict {
                resource: "session",
                field: "token",
                value: new_session.token,
            });
        }

        let session = SessionData {
            token: new_session.token.clone(),
            active_workspace_id: user.id.clone(),
            user,
            expires_at: new_session.expires_at,
        };

        sessions.insert(new_session.token, session.clone());
        Ok(session)
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        self.sessions
            .write()
            .remove(token)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                resource: "session",
                identifier: "token",
            })
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.sessions.write().retain(|_, s| s.expires_at >= now);
        Ok(())
    }

    async fn set_active_workspace(&self, token: &str, workspace_id: &str) -> Result<SessionData> {
        let mut sessions = self.sessions.write();

        let session = sessions.get_mut(token).ok_or(StoreError::NotFound {
            resource: "session",
            identifier: "token",
        })?;

        session.active_workspace_id = workspace_id.to_string();
        Ok(session.clone())
    }

    async fn band_by_id(&self, band_id: &str) -> Result<BandData> {
        self.bands
            .read()
            .get(band_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                resource: "band",
                identifier: "id",
            })
    }

    async fn bands_with_member(&self, user_id: &str) -> Result<Vec<BandData>> {
        let bands = self
            .bands
            .read()
            .values()
            .filter(|b| b.is_member(user_id))
            .cloned()
            .collect();

        Ok(bands)
    }

    async fn create_band(&self, new_band: BandData) -> Result<BandData> {
        let mut bands = self.bands.write();

        if bands.contains_key(&new_band.id) {
            return Err(StoreError::Conflict {
                resource: "band",
                field: "id",
                value: new_band.id,
            });
        }

        bands.insert(new_band.id.clone(), new_band.clone());
        drop(bands);

        self.notify(Collection::Bands);
        Ok(new_band)
    }

    async fn add_band_member(
        &self,
        band_id: &str,
        new_member: BandMemberData,
    ) -> Result<BandData> {
        let mut bands = self.bands.write();

        let band = bands.get_mut(band_id).ok_or(StoreError::NotFound {
            resource: "band",
            identifier: "id",
        })?;

        if !band.is_member(&new_member.user_id) {
            band.members.push(new_member);
        }

        let band = band.clone();
        drop(bands);

        self.notify(Collection::Bands);
        Ok(band)
    }

    async fn delete_band(&self, band_id: &str) -> Result<()> {
        self.bands
            .write()
            .remove(band_id)
            .ok_or(StoreError::NotFound {
                resource: "band",
                identifier: "id",
            })?;

        self.notify(Collection::Bands);
        Ok(())
    }

    async fn song_by_id(&self, song_id: &str) -> Result<SongData> {
        self.songs
            .read()
            .get(song_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                resource: "song",
                identifier: "id",
            })
    }

    async fn songs_by_ids(&self, song_ids: &[String]) -> Result<Vec<SongData>> {
        let songs = self.songs.read();

        Ok(song_ids
            .iter()
            .filter_map(|id| songs.get(id).cloned())
            .collect())
    }

    async fn songs_by_owner(&self, owner_id: &str) -> Result<Vec<SongData>> {
        let songs = self
            .songs
            .read()
            .values()
            .filter(|s| s.owner_id.as_deref() == Some(owner_id))
            .cloned()
            .collect();

        Ok(songs)
    }

    async fn songs_by_workspace(&self, workspace_id: &str) -> Result<Vec<SongData>> {
        let songs = self
            .songs
            .read()
            .values()
            .filter(|s| s.workspace_id.as_deref() == Some(workspace_id))
            .cloned()
            .collect();

        Ok(songs)
    }

    async fn save_song(&self, mut song: SongData) -> Result<SongData> {
        song.revision = self.next_revision();
        self.songs.write().insert(song.id.clone(), song.clone());

        self.notify(Collection::Songs);
        Ok(song)
    }

    async fn delete_song(&self, song_id: &str) -> Result<()> {
        self.songs
            .write()
            .remove(song_id)
            .ok_or(StoreError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        self.notify(Collection::Songs);
        Ok(())
    }

    async fn setlist_by_id(&self, setlist_id: &str) -> Result<SetlistData> {
        self.setlists
            .read()
            .get(setlist_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                resource: "setlist",
                identifier: "id",
            })
    }

    async fn setlists_by_owner(&self, owner_id: &str) -> Result<Vec<SetlistData>> {
        let setlists = self
            .setlists
            .read()
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();

        Ok(setlists)
    }

    async fn setlists_by_workspace(&self, workspace_id: &str) -> Result<Vec<SetlistData>> {
        let setlists = self
            .setlists
            .read()
            .values()
            .filter(|s| s.workspace_id.as_deref() == Some(workspace_id))
            .cloned()
            .collect();

        Ok(setlists)
    }

    async fn save_setlist(&self, mut setlist: SetlistData) -> Result<SetlistData> {
        setlist.revision = self.next_revision();
        self.setlists
            .write()
            .insert(setlist.id.clone(), setlist.clone());

        self.notify(Collection::Setlists);
        Ok(setlist)
    }

    async fn delete_setlist(&self, setlist_id: &str) -> Result<()> {
        self.setlists
            .write()
            .remove(setlist_id)
            .ok_or(StoreError::NotFound {
                resource: "setlist",
                identifier: "id",
            })?;

        self.notify(Collection::Setlists);
        Ok(())
    }

    async fn rehearsal_by_id(&self, rehearsal_id: &str) -> Result<RehearsalData> {
        self.rehearsals
            .read()
            .get(rehearsal_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                resource: "rehearsal",
                identifier: "id",
            })
    }

    async fn rehearsals_by_owner(&self, owner_id: &str) -> Result<Vec<RehearsalData>> {
        let rehearsals = self
            .rehearsals
            .read()
            .values()
            .filter(|r| r.created_by.as_deref() == Some(owner_id))
            .cloned()
            .collect();

        Ok(rehearsals)
    }

    async fn rehearsals_by_workspace(&self, workspace_id: &str) -> Result<Vec<RehearsalData>> {
        let rehearsals = self
            .rehearsals
            .read()
            .values()
            .filter(|r| r.workspace_id.as_deref() == Some(workspace_id))
            .cloned()
            .collect();

        Ok(rehearsals)
    }

    async fn save_rehearsal(&self, mut rehearsal: RehearsalData) -> Result<RehearsalData> {
        rehearsal.revision = self.next_revision();
        self.rehearsals
            .write()
            .insert(rehearsal.id.clone(), rehearsal.clone());

        self.notify(Collection::Rehearsals);
        Ok(rehearsal)
    }

    async fn delete_rehearsal(&self, rehearsal_id: &str) -> Result<()> {
        self.rehearsals
            .write()
            .remove(rehearsal_id)
            .ok_or(StoreError::NotFound {
                resource: "rehearsal",
                identifier: "id",
            })?;

        self.notify(Collection::Rehearsals);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemberRole;
    use crate::util::new_entity_id;
    use chrono::Duration;

    fn user(id: &str) -> UserData {
        UserData {
            id: id.to_string(),
            name: format!("user {id}"),
            email: format!("{id}@example.com"),
            picture: String::new(),
        }
    }

    #[tokio::test]
    async fn test_sessions_expire() {
        let store = MemoryStore::new();
        store.create_user(user("u1")).await.unwrap();

        store
            .create_session(NewSession {
                token: "expired".to_string(),
                user_id: "u1".to_string(),
                expires_at: Utc::now() - Duration::hours(1),
            })
            .await
            .unwrap();

        assert!(store.session_by_token("expired").await.is_err());
    }

    #[tokio::test]
    async fn test_revisions_are_monotonic() {
        let store = MemoryStore::new();

        let song = SongData {
            id: new_entity_id(),
            title: "Interstate Love Song".to_string(),
            artist: "Stone Temple Pilots".to_string(),
            content: String::new(),
            key: None,
            owner_id: Some("u1".to_string()),
            workspace_id: None,
            revision: 0,
        };

        let first = store.save_song(song.clone()).await.unwrap();
        let second = store.save_song(song).await.unwrap();

        assert!(second.revision > first.revision);
    }

    #[tokio::test]
    async fn test_adding_existing_member_is_a_noop() {
        let store = MemoryStore::new();

        let band = BandData {
            id: "b1".to_string(),
            name: "The Regulars".to_string(),
            created_by: "u1".to_string(),
            members: vec![BandMemberData {
                user_id: "u1".to_string(),
                role: MemberRole::Admin,
                joined_at: 0,
            }],
            created_at: 0,
        };

        store.create_band(band).await.unwrap();

        let member = BandMemberData {
            user_id: "u1".to_string(),
            role: MemberRole::Member,
            joined_at: 1,
        };

        let band = store.add_band_member("b1", member).await.unwrap();
        assert_eq!(band.members.len(), 1);
        assert_eq!(band.members[0].role, MemberRole::Admin);
    }

    #[tokio::test]
    async fn test_change_feed_announces_collection() {
        let store = MemoryStore::new();
        let mut changes = store.changes();

        store
            .save_song(SongData {
                id: new_entity_id(),
                title: "Creep".to_string(),
                artist: "Radiohead".to_string(),
                content: String::new(),
                key: None,
                owner_id: Some("u1".to_string()),
                workspace_id: None,
                revision: 0,
            })
            .await
            .unwrap();

        let event = changes.recv().await.unwrap();
        assert_eq!(event.collection, Collection::Songs);
    }
}
