use axum::{
    Json, Router,
    extract::{Path, State},
    routing::put,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::shots::{EditShotRequest, ShotDeletedResponse, ShotResponse},
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Corrections of the shot log.
pub fn router() -> Router<SharedState> {
    Router::new().route("/shots/{id}", put(edit_shot).delete(delete_shot))
}

/// Replace the outcome of a logged shot.
#[utoipa::path(
    put,
    path = "/shots/{id}",
    tag = "shots",
    params(("id" = String, Path, description = "Identifier of the shot")),
    request_body = EditShotRequest,
    responses(
        (status = 200, description = "Shot corrected", body = ShotResponse),
        (status = 404, description = "Unknown shot")
    )
)]
pub async fn edit_shot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<EditShotRequest>>,
) -> Result<Json<ShotResponse>, AppError> {
    Ok(Json(match_service::edit_shot(&state, id, payload).await?))
}

/// Withdraw a logged shot, giving back the cups it took when it still counts.
#[utoipa::path(
    delete,
    path = "/shots/{id}",
    tag = "shots",
    params(("id" = String, Path, description = "Identifier of the shot")),
    responses(
        (status = 200, description = "Shot removed", body = ShotDeletedResponse),
        (status = 404, description = "Unknown shot")
    )
)]
pub async fn delete_shot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShotDeletedResponse>, AppError> {
    Ok(Json(match_service::delete_shot(&state, id).await?))
}
