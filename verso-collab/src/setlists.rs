use std::collections::HashMap;

use crate::{
    util::{new_entity_id, now_millis},
    Collection, RehearsalData, SetlistData, SongData, StoreError, VersoContext, VersoEvent,
};

#[derive(Debug)]
pub struct NewSetlist {
    pub title: String,
    pub description: String,
    pub owner_id: String,
    pub workspace_id: String,
}

/// Manages reusable setlists and resolves a rehearsal's effective songs.
pub struct SetlistManager {
    context: VersoContext,
}

impl SetlistManager {
    pub fn new(context: &VersoContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn create(&self, new: NewSetlist) -> Result<SetlistData, StoreError> {
        let setlist = SetlistData {
            id: new_entity_id(),
            title: new.title,
            description: new.description,
            songs: vec![],
            owner_id: new.owner_id,
            workspace_id: Some(new.workspace_id),
            created_at: now_millis(),
            revision: 0,
        };

        self.save(setlist).await
    }

    pub async fn save(&self, setlist: SetlistData) -> Result<SetlistData, StoreError> {
        let entity_id = setlist.id.clone();
        let write_id = self.context.writes.begin(Collection::Setlists, &entity_id);

        self.context.emit(VersoEvent::SetlistSaved {
            setlist: setlist.clone(),
            write_id,
        });

        match self.context.store.save_setlist(setlist).await {
            Ok(stored) => {
                self.context.writes.commit(write_id);
                self.context.emit(VersoEvent::WriteCommitted {
                    write_id,
                    collection: Collection::Setlists,
                    entity_id,
                    revision: stored.revision,
                });

                Ok(stored)
            }
            Err(e) => {
                self.context.writes.fail(write_id);
                self.context.emit(VersoEvent::WriteFailed {
                    write_id,
                    collection: Collection::Setlists,
                    entity_id,
                });

                Err(e)
            }
        }
    }

    /// The picker operation: adds the song if absent, removes it otherwise
    pub async fn toggle_song(
        &self,
        setlist_id: &str,
        song_id: &str,
    ) -> Result<SetlistData, StoreError> {
        let mut setlist = self.context.store.setlist_by_id(setlist_id).await?;

        if setlist.songs.iter().any(|id| id == song_id) {
            setlist.songs.retain(|id| id != song_id);
        } else {
            setlist.songs.push(song_id.to_string());
        }

        self.save(setlist).await
    }

    /// Deletes the setlist only; referenced songs are left untouched
    pub async fn delete(&self, setlist_id: &str) -> Result<(), StoreError> {
        let write_id = self.context.writes.begin(Collection::Setlists, setlist_id);

        self.context.emit(VersoEvent::SetlistDeleted {
            setlist_id: setlist_id.to_string(),
            write_id,
        });

        match self.context.store.delete_setlist(setlist_id).await {
            Ok(()) => {
                self.context.writes.commit(write_id);
                Ok(())
            }
            Err(e) => {
                self.context.writes.fail(write_id);
                self.context.emit(VersoEvent::WriteFailed {
                    write_id,
                    collection: Collection::Setlists,
                    entity_id: setlist_id.to_string(),
                });

                Err(e)
            }
        }
    }

    /// Unscoped point read, for shared links
    pub async fn by_id(&self, setlist_id: &str) -> Result<SetlistData, StoreError> {
        self.context.store.setlist_by_id(setlist_id).await
    }

    /// Computes the ordered songs a rehearsal should display.
    ///
    /// A linked setlist takes precedence over the rehearsal's own ad-hoc
    /// list. Both the setlist and any songs missing from the local
    /// snapshots are fetched by direct id, bypassing workspace scoping, so
    /// a guest can view another workspace's rehearsal through a shared
    /// link. Dangling song ids are silently filtered out.
    pub async fn resolve_rehearsal_songs(
        &self,
        rehearsal: &RehearsalData,
        local_songs: &[SongData],
        local_setlists: &[SetlistData],
    ) -> Result<Vec<SongData>, StoreError> {
        let target_ids = match &rehearsal.linked_setlist_id {
            Some(setlist_id) => {
                let local = local_setlists.iter().find(|s| &s.id == setlist_id);

                match local {
                    Some(setlist) => setlist.songs.clone(),
                    None => match self.context.store.setlist_by_id(setlist_id).await {
                        Ok(setlist) => setlist.songs,
                        // A dangling link falls back to the ad-hoc list
                        Err(e) if e.is_not_found() => rehearsal.setlist.clone(),
                        Err(e) => return Err(e),
                    },
                }
            }
            None => rehearsal.setlist.clone(),
        };

        let mut known: HashMap<&str, &SongData> =
            local_songs.iter().map(|s| (s.id.as_str(), s)).collect();

        let mut missing: Vec<String> = target_ids
            .iter()
            .filter(|id| !known.contains_key(id.as_str()))
            .cloned()
            .collect();
        missing.dedup();

        let fetched = if missing.is_empty() {
            vec![]
        } else {
            self.context.store.songs_by_ids(&missing).await?
        };

        known.extend(fetched.iter().map(|s| (s.id.as_str(), s)));

        Ok(target_ids
            .iter()
            .filter_map(|id| known.get(id.as_str()).map(|&s| s.clone()))
            .collect())
    }
}
