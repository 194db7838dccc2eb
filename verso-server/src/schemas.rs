use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    /// The identity provider's credential token
    #[validate(length(min = 1, max = 4096))]
    pub credential: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBandSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SwitchWorkspaceSchema {
    #[validate(length(min = 1, max = 128))]
    pub workspace_id: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewSongSchema {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[validate(length(max = 256))]
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub content: String,
    pub key: Option<String>,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FormatSongSchema {
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComposeSongSchema {
    #[validate(length(min = 1, max = 16))]
    pub key: String,
    #[validate(length(min = 1, max = 32))]
    pub scale: String,
    #[validate(length(min = 1, max = 64))]
    pub style: String,
    #[validate(length(min = 1, max = 64))]
    pub mood: String,
    #[validate(length(min = 1, max = 64))]
    pub speed: String,
    #[validate(length(min = 1, max = 64))]
    pub complexity: String,
    #[validate(length(max = 512))]
    #[serde(default)]
    pub topics: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewSetlistSchema {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[validate(length(max = 1024))]
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToggleSetlistSongSchema {
    #[validate(length(min = 1, max = 128))]
    pub song_id: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SuggestSetlistSchema {
    #[validate(length(min = 1, max = 64))]
    pub genre: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRehearsalSchema {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[validate(length(min = 1, max = 32))]
    pub date: String,
    #[validate(length(min = 1, max = 32))]
    pub time: String,
    #[validate(length(min = 1, max = 256))]
    pub location: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewOptionSchema {
    #[validate(length(min = 1, max = 32))]
    pub date: String,
    #[validate(length(min = 1, max = 32))]
    pub time: String,
    #[validate(length(min = 1, max = 256))]
    pub location: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoteSchema {
    #[validate(length(min = 1, max = 128))]
    pub option_id: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfirmSchema {
    #[validate(length(min = 1, max = 128))]
    pub option_id: String,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkSetlistSchema {
    /// The setlist to associate, or null to unlink
    pub setlist_id: Option<String>,
}

#[derive(Debug, Validate, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddSongToRehearsalSchema {
    #[validate(length(min = 1, max = 128))]
    pub song_id: String,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
