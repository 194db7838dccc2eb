use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewBandSchema, SwitchWorkspaceSchema, ValidatedJson},
    serialized::{Band, LoginResult, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/bands",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Band>)
    )
)]
pub(crate) async fn list_bands(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Band>>> {
    let bands = context
        .verso
        .workspaces
        .bands_for_user(&session.user().id)
        .await?;

    Ok(Json(bands.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/bands",
    tag = "bands",
    request_body = NewBandSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Band)
    )
)]
pub(crate) async fn create_band(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewBandSchema>,
) -> ServerResult<Json<Band>> {
    let band = context
        .verso
        .workspaces
        .create_band(body.name, &session.user())
        .await?;

    Ok(Json(band.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/bands/{id}/members",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Band, description = "User is a member and the band is now the active workspace"),
        (status = 404, description = "The invitation references a band that doesn't exist")
    )
)]
pub(crate) async fn join_band(
    session: Session,
    State(context): State<ServerContext>,
    Path(band_id): Path<String>,
) -> ServerResult<Json<Band>> {
    let (band, _) = context
        .verso
        .workspaces
        .join_from_invite(session.data(), &band_id)
        .await?;

    Ok(Json(band.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/bands/{id}",
    tag = "bands",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = LoginResult, description = "Band deleted; the returned session reflects the workspace fallback"),
        (status = 403, description = "Only the creator can delete a band")
    )
)]
pub(crate) async fn delete_band(
    session: Session,
    State(context): State<ServerContext>,
    Path(band_id): Path<String>,
) -> ServerResult<Json<LoginResult>> {
    let updated = context
        .verso
        .workspaces
        .delete_band(session.data(), &band_id)
        .await?;

    context.syncs.release(&band_id);

    Ok(Json(updated.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/workspace",
    tag = "bands",
    request_body = SwitchWorkspaceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = LoginResult),
        (status = 403, description = "The user doesn't belong to the target workspace")
    )
)]
pub(crate) async fn switch_workspace(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<SwitchWorkspaceSchema>,
) -> ServerResult<Json<LoginResult>> {
    let updated = context
        .verso
        .workspaces
        .switch(session.data(), &body.workspace_id)
        .await?;

    Ok(Json(updated.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_bands))
        .route("/", post(create_band))
        .route("/:id", delete(delete_band))
        .route("/:id/members", post(join_band))
}

pub fn workspace_router() -> Router {
    Router::new().route("/", put(switch_workspace))
}
