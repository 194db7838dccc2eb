use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json,
};
use verso_collab::NewSong;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{ComposeSongSchema, FormatSongSchema, NewSongSchema, ValidatedJson},
    serialized::{GeneratedText, Song, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/songs",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Song>, description = "The active workspace's songs, sorted by title")
    )
)]
pub(crate) async fn list_songs(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Song>>> {
    let sync = context.syncs.workspace(session.data()).await?;
    let songs = sync.songs()?;

    Ok(Json(songs.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/songs",
    tag = "songs",
    request_body = NewSongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song)
    )
)]
pub(crate) async fn create_song(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewSongSchema>,
) -> ServerResult<Json<Song>> {
    let song = context
        .verso
        .songs
        .create(NewSong {
            title: body.title,
            artist: body.artist,
            content: body.content,
            key: body.key,
            owner_id: session.user().id,
            workspace_id: session.data().active_workspace_id.clone(),
        })
        .await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/songs/{id}",
    tag = "songs",
    request_body = NewSongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song)
    )
)]
pub(crate) async fn update_song(
    _session: Session,
    State(context): State<ServerContext>,
    Path(song_id): Path<String>,
    ValidatedJson(body): ValidatedJson<NewSongSchema>,
) -> ServerResult<Json<Song>> {
    let mut song = context.verso.songs.by_id(&song_id).await?;

    song.title = body.title;
    song.artist = body.artist;
    song.content = body.content;
    song.key = body.key;

    let song = context.verso.songs.save(song).await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/songs/{id}",
    tag = "songs",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Song was deleted. Setlists referencing it are left untouched.")
    )
)]
pub(crate) async fn delete_song(
    _session: Session,
    State(context): State<ServerContext>,
    Path(song_id): Path<String>,
) -> ServerResult<()> {
    context.verso.songs.delete(&song_id).await?;
    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/songs/format",
    tag = "songs",
    request_body = FormatSongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = GeneratedText, description = "Formatted chord sheet, or the input unchanged when formatting is unavailable")
    )
)]
pub(crate) async fn format_song(
    _session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<FormatSongSchema>,
) -> Json<GeneratedText> {
    let text = context
        .verso
        .composer
        .format_song_content(&body.content)
        .await;

    Json(GeneratedText { text })
}

#[utoipa::path(
    post,
    path = "/v1/songs/compose",
    tag = "songs",
    request_body = ComposeSongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = GeneratedText),
        (status = 503, description = "The generative API is not configured")
    )
)]
pub(crate) async fn compose_song(
    _session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<ComposeSongSchema>,
) -> ServerResult<Json<GeneratedText>> {
    let params = verso_collab::CompositionParams {
        key: body.key,
        scale: body.scale,
        style: body.style,
        mood: body.mood,
        speed: body.speed,
        complexity: body.complexity,
        topics: body.topics,
    };

    let text = context.verso.composer.generate_song(&params).await?;

    Ok(Json(GeneratedText { text }))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_songs))
        .route("/", post(create_song))
        .route("/format", post(format_song))
        .route("/compose", post(compose_song))
        .route("/:id", put(update_song))
        .route("/:id", delete(delete_song))
}
