use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json,
};
use verso_collab::{NewRehearsal, NewRehearsalOption};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        AddSongToRehearsalSchema, ConfirmSchema, LinkSetlistSchema, NewOptionSchema,
        NewRehearsalSchema, ValidatedJson, VoteSchema,
    },
    serialized::{Rehearsal, Song, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rehearsals",
    tag = "rehearsals",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Rehearsal>, description = "The active workspace's rehearsals, newest first")
    )
)]
pub(crate) async fn list_rehearsals(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Rehearsal>>> {
    let sync = context.syncs.workspace(session.data()).await?;
    let rehearsals = sync.rehearsals()?;

    Ok(Json(rehearsals.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rehearsals",
    tag = "rehearsals",
    request_body = NewRehearsalSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Rehearsal, description = "A Proposed rehearsal with one option, the proposer's vote already cast")
    )
)]
pub(crate) async fn propose_rehearsal(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRehearsalSchema>,
) -> ServerResult<Json<Rehearsal>> {
    let rehearsal = context
        .verso
        .rehearsals
        .propose(NewRehearsal {
            title: body.title,
            first_option: NewRehearsalOption {
                date: body.date,
                time: body.time,
                location: body.location,
            },
            proposer_id: session.user().id,
            workspace_id: session.data().active_workspace_id.clone(),
        })
        .await?;

    Ok(Json(rehearsal.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rehearsals/{id}/options",
    tag = "rehearsals",
    request_body = NewOptionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Rehearsal)
    )
)]
pub(crate) async fn propose_option(
    session: Session,
    State(context): State<ServerContext>,
    Path(rehearsal_id): Path<String>,
    ValidatedJson(body): ValidatedJson<NewOptionSchema>,
) -> ServerResult<Json<Rehearsal>> {
    let rehearsal = context
        .verso
        .rehearsals
        .propose_option(
            &rehearsal_id,
            NewRehearsalOption {
                date: body.date,
                time: body.time,
                location: body.location,
            },
            &session.user().id,
        )
        .await?;

    Ok(Json(rehearsal.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rehearsals/{id}/votes",
    tag = "rehearsals",
    request_body = VoteSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Rehearsal, description = "The session user's vote on the option was cast or withdrawn")
    )
)]
pub(crate) async fn toggle_vote(
    session: Session,
    State(context): State<ServerContext>,
    Path(rehearsal_id): Path<String>,
    ValidatedJson(body): ValidatedJson<VoteSchema>,
) -> ServerResult<Json<Rehearsal>> {
    let rehearsal = context
        .verso
        .rehearsals
        .toggle_vote(&rehearsal_id, &body.option_id, &session.user().id)
        .await?;

    Ok(Json(rehearsal.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rehearsals/{id}/confirm",
    tag = "rehearsals",
    request_body = ConfirmSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Rehearsal),
        (status = 409, description = "The rehearsal is already confirmed")
    )
)]
pub(crate) async fn confirm_rehearsal(
    _session: Session,
    State(context): State<ServerContext>,
    Path(rehearsal_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ConfirmSchema>,
) -> ServerResult<Json<Rehearsal>> {
    let rehearsal = context
        .verso
        .rehearsals
        .confirm(&rehearsal_id, &body.option_id)
        .await?;

    Ok(Json(rehearsal.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/rehearsals/{id}/setlist",
    tag = "rehearsals",
    request_body = LinkSetlistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Rehearsal, description = "The setlist link was updated; linking clears the ad-hoc list")
    )
)]
pub(crate) async fn link_setlist(
    _session: Session,
    State(context): State<ServerContext>,
    Path(rehearsal_id): Path<String>,
    ValidatedJson(body): ValidatedJson<LinkSetlistSchema>,
) -> ServerResult<Json<Rehearsal>> {
    let rehearsal = context
        .verso
        .rehearsals
        .link_setlist(&rehearsal_id, body.setlist_id)
        .await?;

    Ok(Json(rehearsal.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rehearsals/{id}/songs",
    tag = "rehearsals",
    request_body = AddSongToRehearsalSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Rehearsal)
    )
)]
pub(crate) async fn add_song(
    _session: Session,
    State(context): State<ServerContext>,
    Path(rehearsal_id): Path<String>,
    ValidatedJson(body): ValidatedJson<AddSongToRehearsalSchema>,
) -> ServerResult<Json<Rehearsal>> {
    let rehearsal = context
        .verso
        .rehearsals
        .add_song(&rehearsal_id, &body.song_id)
        .await?;

    Ok(Json(rehearsal.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rehearsals/{id}/songs/{song_id}",
    tag = "rehearsals",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Rehearsal)
    )
)]
pub(crate) async fn remove_song(
    _session: Session,
    State(context): State<ServerContext>,
    Path((rehearsal_id, song_id)): Path<(String, String)>,
) -> ServerResult<Json<Rehearsal>> {
    let rehearsal = context
        .verso
        .rehearsals
        .remove_song(&rehearsal_id, &song_id)
        .await?;

    Ok(Json(rehearsal.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rehearsals/{id}/songs",
    tag = "rehearsals",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>, description = "The rehearsal's effective songs; a linked setlist wins over the ad-hoc list, dangling ids are omitted")
    )
)]
pub(crate) async fn resolved_songs(
    session: Session,
    State(context): State<ServerContext>,
    Path(rehearsal_id): Path<String>,
) -> ServerResult<Json<Vec<Song>>> {
    // Fetched by direct id so shared rehearsals resolve for guests too
    let rehearsal = context
        .verso
        .workspaces
        .shared_rehearsal(&rehearsal_id)
        .await?;

    let sync = context.syncs.workspace(session.data()).await?;
    let local_songs = sync.songs()?;
    let local_setlists = sync.setlists()?;

    let songs = context
        .verso
        .setlists
        .resolve_rehearsal_songs(&rehearsal, &local_songs, &local_setlists)
        .await?;

    Ok(Json(songs.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rehearsals/{id}",
    tag = "rehearsals",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Rehearsal was deleted")
    )
)]
pub(crate) async fn delete_rehearsal(
    _session: Session,
    State(context): State<ServerContext>,
    Path(rehearsal_id): Path<String>,
) -> ServerResult<()> {
    context.verso.rehearsals.delete(&rehearsal_id).await?;
    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rehearsals))
        .route("/", post(propose_rehearsal))
        .route("/:id", delete(delete_rehearsal))
        .route("/:id/options", post(propose_option))
        .route("/:id/votes", post(toggle_vote))
        .route("/:id/confirm", post(confirm_rehearsal))
        .route("/:id/setlist", put(link_setlist))
        .route("/:id/songs", get(resolved_songs))
        .route("/:id/songs", post(add_song))
        .route("/:id/songs/:song_id", delete(remove_song))
}
