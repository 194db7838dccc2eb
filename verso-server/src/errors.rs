use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use verso_collab::{
    AuthError, ComposerError, RehearsalError, StoreError, SyncError, VotingError, WorkspaceError,
};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    /// The store or the session gate rejected the operation. Usually a
    /// session/workspace mismatch; re-authenticating is the way out.
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Band doesn't exist")]
    BandNotFound,
    #[error("User is not a member of this workspace")]
    NotAMember,
    #[error("Only the band's creator can delete it")]
    NotCreator,
    #[error("Rehearsal has no option with that id")]
    UnknownOption,
    #[error("Rehearsal is already confirmed")]
    AlreadyConfirmed,
    #[error("The generative API is not configured")]
    ComposerUnavailable,
    #[error("The generative API request failed: {0}")]
    ComposerFailed(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } | Self::BandNotFound | Self::UnknownOption => {
                StatusCode::NOT_FOUND
            }
            Self::Conflict { .. } | Self::AlreadyConfirmed => StatusCode::CONFLICT,
            Self::PermissionDenied | Self::NotAMember | Self::NotCreator => StatusCode::FORBIDDEN,
            Self::InvalidCredentials(_) => StatusCode::BAD_REQUEST,
            Self::ComposerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ComposerFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            StoreError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            StoreError::PermissionDenied { .. } => Self::PermissionDenied,
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials(reason) => Self::InvalidCredentials(reason),
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<WorkspaceError> for ServerError {
    fn from(value: WorkspaceError) -> Self {
        match value {
            WorkspaceError::BandNotFound => Self::BandNotFound,
            WorkspaceError::NotAMember => Self::NotAMember,
            WorkspaceError::NotCreator => Self::NotCreator,
            WorkspaceError::Store(e) => e.into(),
        }
    }
}

impl From<VotingError> for ServerError {
    fn from(value: VotingError) -> Self {
        match value {
            VotingError::UnknownOption => Self::UnknownOption,
            VotingError::AlreadyConfirmed => Self::AlreadyConfirmed,
        }
    }
}

impl From<RehearsalError> for ServerError {
    fn from(value: RehearsalError) -> Self {
        match value {
            RehearsalError::Voting(e) => e.into(),
            RehearsalError::Store(e) => e.into(),
        }
    }
}

impl From<SyncError> for ServerError {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::PermissionDenied | SyncError::NotAttached => Self::PermissionDenied,
            SyncError::Store(e) => e.into(),
        }
    }
}

impl From<ComposerError> for ServerError {
    fn from(value: ComposerError) -> Self {
        match value {
            ComposerError::MissingKey => Self::ComposerUnavailable,
            e => Self::ComposerFailed(e.to_string()),
        }
    }
}
