use crate::{
    util::new_entity_id, Collection, SongData, StoreError, VersoContext, VersoEvent,
};

#[derive(Debug)]
pub struct NewSong {
    pub title: String,
    pub artist: String,
    pub content: String,
    pub key: Option<String>,
    pub owner_id: String,
    pub workspace_id: String,
}

/// Manages the song library. Edits are upserts keyed by the song's stable
/// id, so saving an existing song updates it in place.
pub struct SongManager {
    context: VersoContext,
}

impl SongManager {
    pub fn new(context: &VersoContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn create(&self, new: NewSong) -> Result<SongData, StoreError> {
        let song = SongData {
            id: new_entity_id(),
            title: new.title,
            artist: new.artist,
            content: new.content,
            key: new.key,
            owner_id: Some(new.owner_id),
            workspace_id: Some(new.workspace_id),
            revision: 0,
        };

        self.save(song).await
    }

    pub async fn save(&self, song: SongData) -> Result<SongData, StoreError> {
        let entity_id = song.id.clone();
        let write_id = self.context.writes.begin(Collection::Songs, &entity_id);

        self.context.emit(VersoEvent::SongSaved {
            song: song.clone(),
            write_id,
        });

        match self.context.store.save_song(song).await {
            Ok(stored) => {
                self.context.writes.commit(write_id);
                self.context.emit(VersoEvent::WriteCommitted {
                    write_id,
                    collection: Collection::Songs,
                    entity_id,
                    revision: stored.revision,
                });

                Ok(stored)
            }
            Err(e) => {
                self.context.writes.fail(write_id);
                self.context.emit(VersoEvent::WriteFailed {
                    write_id,
                    collection: Collection::Songs,
                    entity_id,
                });

                Err(e)
            }
        }
    }

    pub async fn delete(&self, song_id: &str) -> Result<(), StoreError> {
        let write_id = self.context.writes.begin(Collection::Songs, song_id);

        self.context.emit(VersoEvent::SongDeleted {
            song_id: song_id.to_string(),
            write_id,
        });

        match self.context.store.delete_song(song_id).await {
            Ok(()) => {
                self.context.writes.commit(write_id);
                Ok(())
            }
            Err(e) => {
                self.context.writes.fail(write_id);
                self.context.emit(VersoEvent::WriteFailed {
                    write_id,
                    collection: Collection::Songs,
                    entity_id: song_id.to_string(),
                });

                Err(e)
            }
        }
    }

    /// Unscoped point read, for shared links
    pub async fn by_id(&self, song_id: &str) -> Result<SongData, StoreError> {
        self.context.store.song_by_id(song_id).await
    }

    /// Unscoped batch read. Ids that don't resolve are skipped.
    pub async fn by_ids(&self, song_ids: &[String]) -> Result<Vec<SongData>, StoreError> {
        self.context.store.songs_by_ids(song_ids).await
    }
}
