use thiserror::Error;

use crate::{
    util::{new_entity_id, now_millis},
    BandData, BandMemberData, MemberRole, RehearsalData, SessionData, StoreError, UserData,
    VersoContext, VersoEvent,
};

/// Resolves which collaboration scope the current actor operates in.
///
/// A workspace is either the user's own id (personal) or a band id
/// (shared). The workspace id partitions every collection query.
pub struct Workspaces {
    context: VersoContext,
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The referenced band doesn't exist, e.g. a stale invitation link
    #[error("Band doesn't exist")]
    BandNotFound,
    #[error("User is not a member of this workspace")]
    NotAMember,
    #[error("Only the band's creator can delete it")]
    NotCreator,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WorkspaceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl Workspaces {
    pub fn new(context: &VersoContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// All bands the user is a member of
    pub async fn bands_for_user(&self, user_id: &str) -> Result<Vec<BandData>, StoreError> {
        self.context.store.bands_with_member(user_id).await
    }

    /// Creates a band with the creator seeded as its first Admin member
    pub async fn create_band(
        &self,
        name: String,
        creator: &UserData,
    ) -> Result<BandData, StoreError> {
        let now = now_millis();

        let band = BandData {
            id: new_entity_id(),
            name,
            created_by: creator.id.clone(),
            members: vec![BandMemberData {
                user_id: creator.id.clone(),
                role: MemberRole::Admin,
                joined_at: now,
            }],
            created_at: now,
        };

        let band = self.context.store.create_band(band).await?;
        self.context.emit(VersoEvent::BandCreated { band: band.clone() });

        Ok(band)
    }

    /// Joins a user to a band as a Member. Re-joining an existing member is
    /// a no-op, not an error, so invitation links can be opened repeatedly.
    pub async fn join_band(&self, band_id: &str, user_id: &str) -> Result<BandData, WorkspaceError> {
        let band = self.band_or_not_found(band_id).await?;

        if band.is_member(user_id) {
            return Ok(band);
        }

        let new_member = BandMemberData {
            user_id: user_id.to_string(),
            role: MemberRole::Member,
            joined_at: now_millis(),
        };

        let band = self
            .context
            .store
            .add_band_member(band_id, new_member.clone())
            .await?;

        self.context.emit(VersoEvent::MemberJoined {
            band_id: band_id.to_string(),
            new_member,
        });

        Ok(band)
    }

    /// Resolves a `?joinBand=<id>` invitation link: join, then make the
    /// band the session's active workspace
    pub async fn join_from_invite(
        &self,
        session: &SessionData,
        band_id: &str,
    ) -> Result<(BandData, SessionData), WorkspaceError> {
        let band = self.join_band(band_id, &session.user.id).await?;
        let session = self.switch(session, band_id).await?;

        Ok((band, session))
    }

    /// Switches the session's active workspace. The target must be the
    /// user's personal workspace or a band they belong to.
    pub async fn switch(
        &self,
        session: &SessionData,
        workspace_id: &str,
    ) -> Result<SessionData, WorkspaceError> {
        if workspace_id != session.user.id {
            let band = self.band_or_not_found(workspace_id).await?;

            if !band.is_member(&session.user.id) {
                return Err(WorkspaceError::NotAMember);
            }
        }

        let updated = self
            .context
            .store
            .set_active_workspace(&session.token, workspace_id)
            .await?;

        self.context.emit(VersoEvent::WorkspaceSwitched {
            user_id: session.user.id.clone(),
            workspace_id: workspace_id.to_string(),
        });

        Ok(updated)
    }

    /// Deletes a band. Only the creator may do this. Member data is not
    /// cascade-deleted; the only cascade is moving the deleter's own
    /// session back to their personal workspace.
    pub async fn delete_band(
        &self,
        session: &SessionData,
        band_id: &str,
    ) -> Result<SessionData, WorkspaceError> {
        let band = self.band_or_not_found(band_id).await?;

        if band.created_by != session.user.id {
            return Err(WorkspaceError::NotCreator);
        }

        self.context.store.delete_band(band_id).await?;
        self.context.emit(VersoEvent::BandDeleted {
            band_id: band_id.to_string(),
        });

        if session.active_workspace_id == band_id {
            let updated = self
                .context
                .store
                .set_active_workspace(&session.token, &session.user.id)
                .await?;

            return Ok(updated);
        }

        Ok(session.clone())
    }

    /// Fetches a rehearsal by id for a `?rehearsal=<id>` shared link.
    /// Deliberately unscoped: read-only cross-workspace access by direct id.
    pub async fn shared_rehearsal(&self, rehearsal_id: &str) -> Result<RehearsalData, StoreError> {
        self.context.store.rehearsal_by_id(rehearsal_id).await
    }

    async fn band_or_not_found(&self, band_id: &str) -> Result<BandData, WorkspaceError> {
        self.context
            .store
            .band_by_id(band_id)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => WorkspaceError::BandNotFound,
                e => WorkspaceError::Store(e),
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MemoryStore, NewSession, Store};
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn user(id: &str) -> UserData {
        UserData {
            id: id.to_string(),
            name: format!("user {id}"),
            email: format!("{id}@example.com"),
            picture: String::new(),
        }
    }

    async fn session_for(context: &VersoContext, user_id: &str) -> SessionData {
        context.store.create_user(user(user_id)).await.unwrap();

        context
            .store
            .create_session(NewSession {
                token: format!("token-{user_id}"),
                user_id: user_id.to_string(),
                expires_at: Utc::now() + Duration::days(1),
            })
            .await
            .unwrap()
    }

    fn context() -> VersoContext {
        VersoContext::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_creator_is_seeded_as_admin() {
        let context = context();
        let workspaces = Workspaces::new(&context);

        let band = workspaces
            .create_band("Attic Sessions".to_string(), &user("u1"))
            .await
            .unwrap();

        let member = band.member("u1").unwrap();
        assert_eq!(member.role, MemberRole::Admin);
    }

    #[tokio::test]
    async fn test_joining_twice_is_a_noop() {
        let context = context();
        let workspaces = Workspaces::new(&context);

        let band = workspaces
            .create_band("Attic Sessions".to_string(), &user("u1"))
            .await
            .unwrap();

        workspaces.join_band(&band.id, "u2").await.unwrap();
        let band = workspaces.join_band(&band.id, "u2").await.unwrap();

        assert_eq!(band.members.len(), 2);
    }

    #[tokio::test]
    async fn test_invite_to_missing_band_fails_without_state_change() {
        let context = context();
        let workspaces = Workspaces::new(&context);
        let session = session_for(&context, "u1").await;

        let result = workspaces.join_from_invite(&session, "nope").await;
        assert!(matches!(result, Err(WorkspaceError::BandNotFound)));

        let unchanged = context.store.session_by_token(&session.token).await.unwrap();
        assert_eq!(unchanged.active_workspace_id, "u1");
    }

    #[tokio::test]
    async fn test_invite_joins_and_switches() {
        let context = context();
        let workspaces = Workspaces::new(&context);

        let session = session_for(&context, "u2").await;
        let band = workspaces
            .create_band("Attic Sessions".to_string(), &user("u1"))
            .await
            .unwrap();

        let (band, session) = workspaces.join_from_invite(&session, &band.id).await.unwrap();

        assert!(band.is_member("u2"));
        assert_eq!(session.active_workspace_id, band.id);
    }

    #[tokio::test]
    async fn test_switch_requires_membership() {
        let context = context();
        let workspaces = Workspaces::new(&context);

        let session = session_for(&context, "u2").await;
        let band = workspaces
            .create_band("Attic Sessions".to_string(), &user("u1"))
            .await
            .unwrap();

        let result = workspaces.switch(&session, &band.id).await;
        assert!(matches!(result, Err(WorkspaceError::NotAMember)));
    }

    #[tokio::test]
    async fn test_only_creator_deletes_band() {
        let context = context();
        let workspaces = Workspaces::new(&context);

        let creator_session = session_for(&context, "u1").await;
        let other_session = session_for(&context, "u2").await;

        let band = workspaces
            .create_band("Attic Sessions".to_string(), &creator_session.user)
            .await
            .unwrap();

        workspaces.join_band(&band.id, "u2").await.unwrap();

        let denied = workspaces.delete_band(&other_session, &band.id).await;
        assert!(matches!(denied, Err(WorkspaceError::NotCreator)));

        workspaces.delete_band(&creator_session, &band.id).await.unwrap();
        assert!(context.store.band_by_id(&band.id).await.is_err());
    }

    #[tokio::test]
    async fn test_deleting_active_band_falls_back_to_personal() {
        let context = context();
        let workspaces = Workspaces::new(&context);

        let session = session_for(&context, "u1").await;
        let band = workspaces
            .create_band("Attic Sessions".to_string(), &session.user)
            .await
            .unwrap();

        let session = workspaces.switch(&session, &band.id).await.unwrap();
        let session = workspaces.delete_band(&session, &band.id).await.unwrap();

        assert_eq!(session.active_workspace_id, "u1");
    }
}
