use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};
use verso_collab::NewSetlist;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewSetlistSchema, SuggestSetlistSchema, ToggleSetlistSongSchema, ValidatedJson},
    serialized::{Setlist, SetlistIdeas, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/setlists",
    tag = "setlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Setlist>, description = "The active workspace's setlists, newest first")
    )
)]
pub(crate) async fn list_setlists(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Setlist>>> {
    let sync = context.syncs.workspace(session.data()).await?;
    let setlists = sync.setlists()?;

    Ok(Json(setlists.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/setlists",
    tag = "setlists",
    request_body = NewSetlistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Setlist)
    )
)]
pub(crate) async fn create_setlist(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewSetlistSchema>,
) -> ServerResult<Json<Setlist>> {
    let setlist = context
        .verso
        .setlists
        .create(NewSetlist {
            title: body.title,
            description: body.description,
            owner_id: session.user().id,
            workspace_id: session.data().active_workspace_id.clone(),
        })
        .await?;

    Ok(Json(setlist.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/setlists/{id}/songs",
    tag = "setlists",
    request_body = ToggleSetlistSongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Setlist, description = "The song's membership was toggled")
    )
)]
pub(crate) async fn toggle_song(
    _session: Session,
    State(context): State<ServerContext>,
    Path(setlist_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ToggleSetlistSongSchema>,
) -> ServerResult<Json<Setlist>> {
    let setlist = context
        .verso
        .setlists
        .toggle_song(&setlist_id, &body.song_id)
        .await?;

    Ok(Json(setlist.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/setlists/{id}",
    tag = "setlists",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Setlist was deleted. Its songs are not cascade-deleted.")
    )
)]
pub(crate) async fn delete_setlist(
    _session: Session,
    State(context): State<ServerContext>,
    Path(setlist_id): Path<String>,
) -> ServerResult<()> {
    context.verso.setlists.delete(&setlist_id).await?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/setlists/suggest",
    tag = "setlists",
    request_body = SuggestSetlistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = SetlistIdeas, description = "Suggested song titles, empty when the generative API is unavailable")
    )
)]
pub(crate) async fn suggest_setlist(
    _session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<SuggestSetlistSchema>,
) -> Json<SetlistIdeas> {
    let titles = context
        .verso
        .composer
        .suggest_setlist_ideas(&body.genre)
        .await;

    Json(SetlistIdeas { titles })
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_setlists))
        .route("/", post(create_setlist))
        .route("/suggest", post(suggest_setlist))
        .route("/:id", delete(delete_setlist))
        .route("/:id/songs", post(toggle_song))
}
