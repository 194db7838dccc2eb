use thiserror::Error;

use crate::{
    util::{new_entity_id, now_millis},
    Collection, RehearsalData, RehearsalOption, RehearsalStatus, StoreError, VersoContext,
    VersoEvent,
};

#[derive(Debug, Error)]
pub enum VotingError {
    #[error("Rehearsal has no option with that id")]
    UnknownOption,
    /// Confirmation is one-way; no operation reverses it
    #[error("Rehearsal is already confirmed")]
    AlreadyConfirmed,
}

#[derive(Debug, Error)]
pub enum RehearsalError {
    #[error(transparent)]
    Voting(#[from] VotingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a vote toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Cast,
    Withdrawn,
}

/// A date/time/location candidate for a rehearsal
#[derive(Debug, Clone)]
pub struct NewRehearsalOption {
    pub date: String,
    pub time: String,
    pub location: String,
}

#[derive(Debug)]
pub struct NewRehearsal {
    pub title: String,
    pub first_option: NewRehearsalOption,
    pub proposer_id: String,
    pub workspace_id: String,
}

/// Creates a rehearsal in Proposed status with exactly one option, whose
/// voter set seeds with the proposer.
pub fn new_rehearsal(new: NewRehearsal) -> RehearsalData {
    let option = RehearsalOption {
        id: new_entity_id(),
        date: new.first_option.date,
        time: new.first_option.time,
        location: new.first_option.location,
        voter_ids: vec![new.proposer_id.clone()],
    };

    RehearsalData {
        id: new_entity_id(),
        title: new.title,
        status: RehearsalStatus::Proposed,
        options: vec![option],
        confirmed_option_id: None,
        linked_setlist_id: None,
        setlist: vec![],
        created_by: Some(new.proposer_id),
        workspace_id: Some(new.workspace_id),
        created_at: now_millis(),
        revision: 0,
    }
}

/// Appends a new option with the proposer as its first voter.
/// There is no option limit and identical date/time/location candidates
/// are not de-duplicated.
pub fn append_option(
    rehearsal: &mut RehearsalData,
    new_option: NewRehearsalOption,
    proposer_id: &str,
) -> String {
    let option = RehearsalOption {
        id: new_entity_id(),
        date: new_option.date,
        time: new_option.time,
        location: new_option.location,
        voter_ids: vec![proposer_id.to_string()],
    };

    let id = option.id.clone();
    rehearsal.options.push(option);

    id
}

/// Casts the user's vote on an option, or withdraws it if already cast.
///
/// Calling this twice with the same arguments returns the voter set to its
/// original state. Voting for multiple options at once is allowed; the
/// model does not enforce exclusivity within one rehearsal.
pub fn toggle_vote(
    rehearsal: &mut RehearsalData,
    option_id: &str,
    user_id: &str,
) -> Result<VoteChange, VotingError> {
    let option = rehearsal
        .options
        .iter_mut()
        .find(|o| o.id == option_id)
        .ok_or(VotingError::UnknownOption)?;

    if option.has_voted(user_id) {
        option.voter_ids.retain(|id| id != user_id);
        Ok(VoteChange::Withdrawn)
    } else {
        option.voter_ids.push(user_id.to_string());
        Ok(VoteChange::Cast)
    }
}

/// Confirms the winning option, moving the rehearsal to Confirmed.
///
/// The option must exist, but may have zero votes: requiring votes is a UI
/// convention, not a model invariant. Which option wins is a manual choice
/// regardless of vote counts.
pub fn confirm(rehearsal: &mut RehearsalData, option_id: &str) -> Result<(), VotingError> {
    if rehearsal.status == RehearsalStatus::Confirmed {
        return Err(VotingError::AlreadyConfirmed);
    }

    if rehearsal.option(option_id).is_none() {
        return Err(VotingError::UnknownOption);
    }

    rehearsal.status = RehearsalStatus::Confirmed;
    rehearsal.confirmed_option_id = Some(option_id.to_string());

    Ok(())
}

/// Persists rehearsal mutations as whole-entity merge-upserts, applying
/// them to local state optimistically before the store acknowledges.
pub struct RehearsalManager {
    context: VersoContext,
}

impl RehearsalManager {
    pub fn new(context: &VersoContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn propose(&self, new: NewRehearsal) -> Result<RehearsalData, RehearsalError> {
        let rehearsal = new_rehearsal(new);
        Ok(self.persist(rehearsal).await?)
    }

    pub async fn propose_option(
        &self,
        rehearsal_id: &str,
        new_option: NewRehearsalOption,
        proposer_id: &str,
    ) -> Result<RehearsalData, RehearsalError> {
        let mut rehearsal = self.context.store.rehearsal_by_id(rehearsal_id).await?;
        append_option(&mut rehearsal, new_option, proposer_id);

        Ok(self.persist(rehearsal).await?)
    }

    pub async fn toggle_vote(
        &self,
        rehearsal_id: &str,
        option_id: &str,
        user_id: &str,
    ) -> Result<RehearsalData, RehearsalError> {
        let mut rehearsal = self.context.store.rehearsal_by_id(rehearsal_id).await?;
        toggle_vote(&mut rehearsal, option_id, user_id)?;

        Ok(self.persist(rehearsal).await?)
    }

    pub async fn confirm(
        &self,
        rehearsal_id: &str,
        option_id: &str,
    ) -> Result<RehearsalData, RehearsalError> {
        let mut rehearsal = self.context.store.rehearsal_by_id(rehearsal_id).await?;
        confirm(&mut rehearsal, option_id)?;

        let rehearsal = self.persist(rehearsal).await?;

        self.context.emit(VersoEvent::RehearsalConfirmed {
            rehearsal_id: rehearsal.id.clone(),
            option_id: option_id.to_string(),
        });

        Ok(rehearsal)
    }

    /// Associates a library setlist, or clears the association with `None`.
    /// Linking clears the ad-hoc song list to avoid two sources of truth.
    pub async fn link_setlist(
        &self,
        rehearsal_id: &str,
        setlist_id: Option<String>,
    ) -> Result<RehearsalData, RehearsalError> {
        let mut rehearsal = self.context.store.rehearsal_by_id(rehearsal_id).await?;

        if let Some(setlist_id) = &setlist_id {
            let _ = self.context.store.setlist_by_id(setlist_id).await?;
            rehearsal.setlist.clear();
        }

        rehearsal.linked_setlist_id = setlist_id;

        Ok(self.persist(rehearsal).await?)
    }

    /// Adds a song to the ad-hoc list. Already-present songs are left alone.
    pub async fn add_song(
        &self,
        rehearsal_id: &str,
        song_id: &str,
    ) -> Result<RehearsalData, RehearsalError> {
        let mut rehearsal = self.context.store.rehearsal_by_id(rehearsal_id).await?;

        if rehearsal.setlist.iter().any(|id| id == song_id) {
            return Ok(rehearsal);
        }

        rehearsal.setlist.push(song_id.to_string());
        Ok(self.persist(rehearsal).await?)
    }

    pub async fn remove_song(
        &self,
        rehearsal_id: &str,
        song_id: &str,
    ) -> Result<RehearsalData, RehearsalError> {
        let mut rehearsal = self.context.store.rehearsal_by_id(rehearsal_id).await?;
        rehearsal.setlist.retain(|id| id != song_id);

        Ok(self.persist(rehearsal).await?)
    }

    pub async fn delete(&self, rehearsal_id: &str) -> Result<(), RehearsalError> {
        let write_id = self.context.writes.begin(Collection::Rehearsals, rehearsal_id);

        self.context.emit(VersoEvent::RehearsalDeleted {
            rehearsal_id: rehearsal_id.to_string(),
            write_id,
        });

        match self.context.store.delete_rehearsal(rehearsal_id).await {
            Ok(()) => {
                self.context.writes.commit(write_id);
                Ok(())
            }
            Err(e) => {
                self.context.writes.fail(write_id);
                self.context.emit(VersoEvent::WriteFailed {
                    write_id,
                    collection: Collection::Rehearsals,
                    entity_id: rehearsal_id.to_string(),
                });

                Err(e.into())
            }
        }
    }

    async fn persist(&self, rehearsal: RehearsalData) -> Result<RehearsalData, StoreError> {
        let entity_id = rehearsal.id.clone();
        let write_id = self.context.writes.begin(Collection::Rehearsals, &entity_id);

        self.context.emit(VersoEvent::RehearsalSaved {
            rehearsal: rehearsal.clone(),
            write_id,
        });

        match self.context.store.save_rehearsal(rehearsal).await {
            Ok(stored) => {
                self.context.writes.commit(write_id);
                self.context.emit(VersoEvent::WriteCommitted {
                    write_id,
                    collection: Collection::Rehearsals,
                    entity_id,
                    revision: stored.revision,
                });

                Ok(stored)
            }
            Err(e) => {
                self.context.writes.fail(write_id);
                self.context.emit(VersoEvent::WriteFailed {
                    write_id,
                    collection: Collection::Rehearsals,
                    entity_id,
                });

                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MemoryStore, Store};
    use std::sync::Arc;

    fn studio_option() -> NewRehearsalOption {
        NewRehearsalOption {
            date: "2024-06-01".to_string(),
            time: "19:00".to_string(),
            location: "Studio A".to_string(),
        }
    }

    fn proposal() -> NewRehearsal {
        NewRehearsal {
            title: "Friday night".to_string(),
            first_option: studio_option(),
            proposer_id: "u1".to_string(),
            workspace_id: "u1".to_string(),
        }
    }

    fn context() -> VersoContext {
        VersoContext::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_proposal_seeds_proposer_vote() {
        let rehearsal = new_rehearsal(proposal());

        assert_eq!(rehearsal.status, RehearsalStatus::Proposed);
        assert_eq!(rehearsal.options.len(), 1);
        assert_eq!(rehearsal.options[0].voter_ids, vec!["u1"]);
        assert_eq!(rehearsal.options[0].location, "Studio A");
    }

    #[test]
    fn test_toggle_vote_is_idempotent_invertible() {
        let mut rehearsal = new_rehearsal(proposal());
        let option_id = rehearsal.options[0].id.clone();
        let before = rehearsal.options[0].voter_ids.clone();

        assert_eq!(
            toggle_vote(&mut rehearsal, &option_id, "u2").unwrap(),
            VoteChange::Cast
        );
        assert!(rehearsal.options[0].has_voted("u2"));

        assert_eq!(
            toggle_vote(&mut rehearsal, &option_id, "u2").unwrap(),
            VoteChange::Withdrawn
        );
        assert_eq!(rehearsal.options[0].voter_ids, before);
    }

    #[test]
    fn test_voting_for_multiple_options_is_allowed() {
        let mut rehearsal = new_rehearsal(proposal());
        let first = rehearsal.options[0].id.clone();
        let second = append_option(&mut rehearsal, studio_option(), "u1");

        toggle_vote(&mut rehearsal, &first, "u2").unwrap();
        toggle_vote(&mut rehearsal, &second, "u2").unwrap();

        assert!(rehearsal.options[0].has_voted("u2"));
        assert!(rehearsal.options[1].has_voted("u2"));
    }

    #[test]
    fn test_identical_options_are_not_deduplicated() {
        let mut rehearsal = new_rehearsal(proposal());
        append_option(&mut rehearsal, studio_option(), "u2");

        assert_eq!(rehearsal.options.len(), 2);
        assert_eq!(rehearsal.options[1].voter_ids, vec!["u2"]);
    }

    #[test]
    fn test_confirm_leaves_other_options_untouched() {
        let mut rehearsal = new_rehearsal(proposal());
        let second = append_option(&mut rehearsal, studio_option(), "u2");
        toggle_vote(&mut rehearsal, &second, "u3").unwrap();

        let first = rehearsal.options[0].id.clone();
        confirm(&mut rehearsal, &first).unwrap();

        assert_eq!(rehearsal.status, RehearsalStatus::Confirmed);
        assert_eq!(rehearsal.confirmed_option_id.as_deref(), Some(first.as_str()));
        assert_eq!(rehearsal.options[1].voter_ids, vec!["u2", "u3"]);
    }

    #[test]
    fn test_confirm_requires_known_option() {
        let mut rehearsal = new_rehearsal(proposal());

        let result = confirm(&mut rehearsal, "missing");
        assert!(matches!(result, Err(VotingError::UnknownOption)));
        assert_eq!(rehearsal.status, RehearsalStatus::Proposed);
        assert!(rehearsal.confirmed_option_id.is_none());
    }

    #[test]
    fn test_confirm_accepts_zero_vote_option() {
        let mut rehearsal = new_rehearsal(proposal());
        let option_id = rehearsal.options[0].id.clone();
        toggle_vote(&mut rehearsal, &option_id, "u1").unwrap();

        assert_eq!(rehearsal.options[0].vote_count(), 0);
        assert!(confirm(&mut rehearsal, &option_id).is_ok());
    }

    #[test]
    fn test_confirmation_is_one_way() {
        let mut rehearsal = new_rehearsal(proposal());
        let first = rehearsal.options[0].id.clone();
        let second = append_option(&mut rehearsal, studio_option(), "u2");

        confirm(&mut rehearsal, &first).unwrap();
        let result = confirm(&mut rehearsal, &second);

        assert!(matches!(result, Err(VotingError::AlreadyConfirmed)));
        assert_eq!(rehearsal.confirmed_option_id.as_deref(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn test_confirmed_option_always_exists_after_mutations() {
        let context = context();
        let manager = RehearsalManager::new(&context);

        let rehearsal = manager.propose(proposal()).await.unwrap();
        let rehearsal = manager
            .propose_option(&rehearsal.id, studio_option(), "u2")
            .await
            .unwrap();

        let option_id = rehearsal.options[1].id.clone();
        manager
            .toggle_vote(&rehearsal.id, &option_id, "u3")
            .await
            .unwrap();

        let rehearsal = manager.confirm(&rehearsal.id, &option_id).await.unwrap();

        let confirmed = rehearsal.confirmed_option().unwrap();
        assert_eq!(confirmed.id, option_id);
    }

    #[tokio::test]
    async fn test_linking_clears_adhoc_setlist() {
        let context = context();
        let manager = RehearsalManager::new(&context);

        let setlist = crate::SetlistData {
            id: "sl1".to_string(),
            title: "Covers".to_string(),
            description: String::new(),
            songs: vec!["s1".to_string()],
            owner_id: "u1".to_string(),
            workspace_id: None,
            created_at: 0,
            revision: 0,
        };
        context.store.save_setlist(setlist).await.unwrap();

        let rehearsal = manager.propose(proposal()).await.unwrap();
        manager.add_song(&rehearsal.id, "s9").await.unwrap();

        let rehearsal = manager
            .link_setlist(&rehearsal.id, Some("sl1".to_string()))
            .await
            .unwrap();

        assert_eq!(rehearsal.linked_setlist_id.as_deref(), Some("sl1"));
        assert!(rehearsal.setlist.is_empty());

        let rehearsal = manager.link_setlist(&rehearsal.id, None).await.unwrap();
        assert!(rehearsal.linked_setlist_id.is_none());
    }

    #[tokio::test]
    async fn test_failed_write_is_marked() {
        let context = context();
        let manager = RehearsalManager::new(&context);

        // Deleting something that was never stored fails the write
        let result = manager.delete("missing").await;
        assert!(result.is_err());
    }
}
