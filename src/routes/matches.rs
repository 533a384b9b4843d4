use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        matches::{
            CreateMatchRequest, ListMatchesQuery, LiveViewResponse, MatchListResponse,
            MatchSummary, UpdateMatchRequest,
        },
        shots::{
            AdvanceRequest, FormatChangeRequest, ShotListQuery, ShotListResponse, ShotRequest,
            ShotResponse,
        },
    },
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Match lifecycle, shot logging and the per-player tracker view.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", get(list_matches).post(create_match))
        .route("/matches/{id}", get(get_match).put(update_match))
        .route("/matches/{id}/rematch", post(rematch))
        .route("/matches/{id}/shots", get(list_shots).post(apply_shot))
        .route("/matches/{id}/advance", post(force_advance))
        .route("/matches/{id}/format", post(change_format))
        .route("/matches/{id}/live/{player}", get(live_view))
}

/// Open a match at a table and seat both teams.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    request_body = CreateMatchRequest,
    responses(
        (status = 200, description = "Match created", body = MatchSummary),
        (status = 400, description = "Invalid roster"),
        (status = 409, description = "A player is already seated elsewhere"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateMatchRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::create_match(&state, payload).await?))
}

/// List matches, newest first.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    params(ListMatchesQuery),
    responses((status = 200, description = "Stored matches", body = MatchListResponse))
)]
pub async fn list_matches(
    State(state): State<SharedState>,
    Query(query): Query<ListMatchesQuery>,
) -> Result<Json<MatchListResponse>, AppError> {
    let active_only = query.active.unwrap_or(false);
    Ok(Json(match_service::list_matches(&state, active_only).await?))
}

#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Match snapshot", body = MatchSummary),
        (status = 404, description = "Unknown match")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::get_match(&state, id).await?))
}

/// Rename the match or reseat its teams without touching the cups.
#[utoipa::path(
    put,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    request_body = UpdateMatchRequest,
    responses(
        (status = 200, description = "Match updated", body = MatchSummary),
        (status = 400, description = "Invalid roster"),
        (status = 404, description = "Unknown match or unregistered player"),
        (status = 409, description = "Match finished or a player is seated elsewhere")
    )
)]
pub async fn update_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateMatchRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::update_match(&state, id, payload).await?))
}

/// Replay the match with the same roster.
#[utoipa::path(
    post,
    path = "/matches/{id}/rematch",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "New round started", body = MatchSummary),
        (status = 409, description = "A player is already seated elsewhere")
    )
)]
pub async fn rematch(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(match_service::rematch(&state, id).await?))
}

/// Record a shot.
#[utoipa::path(
    post,
    path = "/matches/{id}/shots",
    tag = "shots",
    params(("id" = String, Path, description = "Identifier of the match")),
    request_body = ShotRequest,
    responses(
        (status = 200, description = "Shot recorded", body = ShotResponse),
        (status = 400, description = "Shooter not seated or invalid multiplier"),
        (status = 409, description = "Match finished or not the shooter's turn")
    )
)]
pub async fn apply_shot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ShotRequest>>,
) -> Result<Json<ShotResponse>, AppError> {
    Ok(Json(match_service::apply_shot(&state, id, payload).await?))
}

/// List the shots of a match, oldest first.
#[utoipa::path(
    get,
    path = "/matches/{id}/shots",
    tag = "shots",
    params(("id" = String, Path, description = "Identifier of the match"), ShotListQuery),
    responses((status = 200, description = "Shot log", body = ShotListResponse))
)]
pub async fn list_shots(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ShotListQuery>,
) -> Result<Json<ShotListResponse>, AppError> {
    Ok(Json(
        match_service::list_shots(&state, id, query.player).await?,
    ))
}

/// Remove the hits a team received from its table right away.
#[utoipa::path(
    post,
    path = "/matches/{id}/advance",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    request_body = AdvanceRequest,
    responses((status = 200, description = "Pending hits committed", body = MatchSummary))
)]
pub async fn force_advance(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AdvanceRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(
        match_service::force_advance(&state, id, &payload.player).await?,
    ))
}

/// Pick a new target layout without throwing.
#[utoipa::path(
    post,
    path = "/matches/{id}/format",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    request_body = FormatChangeRequest,
    responses((status = 200, description = "Format applied or ignored", body = MatchSummary))
)]
pub async fn change_format(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<FormatChangeRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    Ok(Json(
        match_service::change_format(&state, id, &payload.player, payload.format).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/matches/{id}/live/{player}",
    tag = "matches",
    params(
        ("id" = String, Path, description = "Identifier of the match"),
        ("player" = String, Path, description = "Seated player the view is built for")
    ),
    responses(
        (status = 200, description = "Tracker view", body = LiveViewResponse),
        (status = 404, description = "Unknown match or player not seated")
    )
)]
pub async fn live_view(
    State(state): State<SharedState>,
    Path((id, player)): Path<(Uuid, String)>,
) -> Result<Json<LiveViewResponse>, AppError> {
    Ok(Json(match_service::live_view(&state, id, &player).await?))
}
