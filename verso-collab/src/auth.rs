use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;

use crate::{
    util::random_string, IdentityError, IdentityProvider, NewSession, SessionData, StoreError,
    UserData, VersoContext, VersoEvent,
};

/// Handles credential logins and session tokens.
///
/// Identity itself is delegated to the external provider; this only mirrors
/// the resolved profile and manages verso's own session records.
pub struct Auth {
    context: VersoContext,
    provider: Arc<dyn IdentityProvider>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider rejected or could not resolve the credential
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    /// Something else went wrong with the store
    #[error(transparent)]
    Store(StoreError),
}

impl From<IdentityError> for AuthError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::InvalidCredential(reason) => Self::InvalidCredentials(reason),
        }
    }
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: i64 = 7;

    pub fn new(context: &VersoContext, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            context: context.clone(),
            provider,
        }
    }

    /// Exchanges an identity credential for a verso session.
    ///
    /// The user record is created on first login and refreshed from the
    /// provider's claims on every later one.
    pub async fn login_with_credential(&self, credential: &str) -> Result<SessionData, AuthError> {
        self.clear_expired().await;

        let claims = self.provider.resolve(credential).await?;

        let profile = UserData {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            picture: claims.picture,
        };

        let user = match self.context.store.user_by_id(&profile.id).await {
            Ok(_) => self
                .context
                .store
                .update_user(profile)
                .await
                .map_err(AuthError::Store)?,
            Err(e) if e.is_not_found() => self
                .context
                .store
                .create_user(profile)
                .await
                .map_err(AuthError::Store)?,
            Err(e) => return Err(AuthError::Store(e)),
        };

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS);

        let new_session = NewSession {
            token: random_string(32),
            user_id: user.id.clone(),
            expires_at,
        };

        let session = self
            .context
            .store
            .create_session(new_session)
            .await
            .map_err(AuthError::Store)?;

        self.context.emit(VersoEvent::UserLoggedIn { user });

        Ok(session)
    }

    /// Returns a session if it exists and hasn't expired
    pub async fn session(&self, token: &str) -> Result<SessionData, StoreError> {
        self.context.store.session_by_token(token).await
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), StoreError> {
        let session = self.context.store.session_by_token(token).await?;
        self.context.store.delete_session_by_token(token).await?;

        self.context.emit(VersoEvent::SessionEnded {
            user_id: session.user.id,
        });

        Ok(())
    }

    async fn clear_expired(&self) {
        if let Err(e) = self.context.store.clear_expired_sessions().await {
            log::warn!("Could not clear expired sessions: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MemoryStore, TokenIdentity};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn context() -> VersoContext {
        VersoContext::new(Arc::new(MemoryStore::new()))
    }

    fn credential(sub: &str, name: &str) -> String {
        let claims = json!({
            "sub": sub,
            "name": name,
            "email": format!("{sub}@example.com"),
            "picture": "",
        });

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"irrelevant"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_login_creates_user() {
        let context = context();
        let auth = Auth::new(&context, Arc::new(TokenIdentity));

        let session = auth
            .login_with_credential(&credential("u1", "Alex"))
            .await
            .unwrap();

        assert_eq!(session.user.id, "u1");
        assert_eq!(session.user.name, "Alex");
        assert_eq!(session.active_workspace_id, "u1");
    }

    #[tokio::test]
    async fn test_later_login_refreshes_profile() {
        let context = context();
        let auth = Auth::new(&context, Arc::new(TokenIdentity));

        auth.login_with_credential(&credential("u1", "Alex"))
            .await
            .unwrap();

        let session = auth
            .login_with_credential(&credential("u1", "Alexandra"))
            .await
            .unwrap();

        assert_eq!(session.user.name, "Alexandra");
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let context = context();
        let auth = Auth::new(&context, Arc::new(TokenIdentity));

        let session = auth
            .login_with_credential(&credential("u1", "Alex"))
            .await
            .unwrap();

        auth.logout(&session.token).await.unwrap();
        assert!(auth.session(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_credential_is_rejected() {
        let context = context();
        let auth = Auth::new(&context, Arc::new(TokenIdentity));

        let result = auth.login_with_credential("garbage").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }
}
