//! The `?rehearsal=<id>` deep-link flow: read-only cross-workspace access
//! by direct id, intentionally not filtered the way collection
//! subscriptions are.

use axum::{
    extract::{Path, State},
    routing::get,
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{Rehearsal, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/shared/rehearsals/{id}",
    tag = "shared",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Rehearsal),
        (status = 404, description = "The link references a rehearsal that doesn't exist")
    )
)]
pub(crate) async fn shared_rehearsal(
    _session: Session,
    State(context): State<ServerContext>,
    Path(rehearsal_id): Path<String>,
) -> ServerResult<Json<Rehearsal>> {
    let rehearsal = context
        .verso
        .workspaces
        .shared_rehearsal(&rehearsal_id)
        .await?;

    Ok(Json(rehearsal.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/rehearsals/:id", get(shared_rehearsal))
}
