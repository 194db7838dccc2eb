//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use serde::Serialize;
use utoipa::ToSchema;
use verso_collab::{
    BandData, BandMemberData, MemberRole, RehearsalData, RehearsalOption as CollabRehearsalOption,
    RehearsalStatus, SessionData, SetlistData, SongData, UserData,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    id: String,
    name: String,
    email: String,
    picture: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
    active_workspace_id: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Band {
    id: String,
    name: String,
    created_by: String,
    members: Vec<BandMember>,
    created_at: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BandMember {
    user_id: String,
    role: String,
    joined_at: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Song {
    id: String,
    title: String,
    artist: String,
    content: String,
    key: Option<String>,
    workspace_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Setlist {
    id: String,
    title: String,
    description: String,
    songs: Vec<String>,
    workspace_id: Option<String>,
    created_at: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Rehearsal {
    id: String,
    title: String,
    status: String,
    options: Vec<RehearsalOption>,
    confirmed_option_id: Option<String>,
    linked_setlist_id: Option<String>,
    setlist: Vec<String>,
    created_by: Option<String>,
    workspace_id: Option<String>,
    created_at: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RehearsalOption {
    id: String,
    date: String,
    time: String,
    location: String,
    voter_ids: Vec<String>,
}

/// Plain text returned by the generative endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct GeneratedText {
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetlistIdeas {
    pub titles: Vec<String>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            picture: self.picture.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
            active_workspace_id: self.active_workspace_id.clone(),
        }
    }
}

impl ToSerialized<Band> for BandData {
    fn to_serialized(&self) -> Band {
        Band {
            id: self.id.clone(),
            name: self.name.clone(),
            created_by: self.created_by.clone(),
            members: self.members.to_serialized(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<BandMember> for BandMemberData {
    fn to_serialized(&self) -> BandMember {
        let role = match self.role {
            MemberRole::Admin => "ADMIN",
            MemberRole::Member => "MEMBER",
            MemberRole::Guest => "GUEST",
        };

        BandMember {
            user_id: self.user_id.clone(),
            role: role.to_string(),
            joined_at: self.joined_at,
        }
    }
}

impl ToSerialized<Song> for SongData {
    fn to_serialized(&self) -> Song {
        Song {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            content: self.content.clone(),
            key: self.key.clone(),
            workspace_id: self.workspace_id.clone(),
        }
    }
}

impl ToSerialized<Setlist> for SetlistData {
    fn to_serialized(&self) -> Setlist {
        Setlist {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            songs: self.songs.clone(),
            workspace_id: self.workspace_id.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Rehearsal> for RehearsalData {
    fn to_serialized(&self) -> Rehearsal {
        let status = match self.status {
            RehearsalStatus::Proposed => "PROPOSED",
            RehearsalStatus::Confirmed => "CONFIRMED",
            RehearsalStatus::Completed => "COMPLETED",
        };

        Rehearsal {
            id: self.id.clone(),
            title: self.title.clone(),
            status: status.to_string(),
            options: self.options.to_serialized(),
            confirmed_option_id: self.confirmed_option_id.clone(),
            linked_setlist_id: self.linked_setlist_id.clone(),
            setlist: self.setlist.clone(),
            created_by: self.created_by.clone(),
            workspace_id: self.workspace_id.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<RehearsalOption> for CollabRehearsalOption {
    fn to_serialized(&self) -> RehearsalOption {
        RehearsalOption {
            id: self.id.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
            location: self.location.clone(),
            voter_ids: self.voter_ids.clone(),
        }
    }
}
