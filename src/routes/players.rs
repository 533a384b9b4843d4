use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use axum_valid::Valid;

use crate::{
    dto::{
        matches::{FormatsResponse, PlayerMatchResponse},
        players::{PlayerListResponse, PlayerSummary, RegisterPlayerRequest},
    },
    error::AppError,
    services::{match_service, player_service},
    state::SharedState,
};

/// Player registry, player lookups and the static cup layout catalog.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", get(list_players).post(register_player))
        .route("/players/{player}", delete(delete_player))
        .route("/players/{player}/match", get(player_match))
        .route("/formats", get(list_formats))
}

#[utoipa::path(
    get,
    path = "/players",
    tag = "players",
    responses(
        (status = 200, description = "Registered players", body = PlayerListResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn list_players(
    State(state): State<SharedState>,
) -> Result<Json<PlayerListResponse>, AppError> {
    Ok(Json(player_service::list_players(&state).await?))
}

/// Register a player name so it can be seated.
#[utoipa::path(
    post,
    path = "/players",
    tag = "players",
    request_body = RegisterPlayerRequest,
    responses(
        (status = 200, description = "Player registered", body = PlayerSummary),
        (status = 400, description = "Invalid name"),
        (status = 409, description = "Name already taken")
    )
)]
pub async fn register_player(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RegisterPlayerRequest>>,
) -> Result<Json<PlayerSummary>, AppError> {
    Ok(Json(player_service::register_player(&state, payload).await?))
}

/// Remove a player who is not seated in any unfinished match.
#[utoipa::path(
    delete,
    path = "/players/{player}",
    tag = "players",
    params(("player" = String, Path, description = "Player name")),
    responses(
        (status = 204, description = "Player removed"),
        (status = 404, description = "Player is not registered"),
        (status = 409, description = "Player is seated in a match")
    )
)]
pub async fn delete_player(
    State(state): State<SharedState>,
    Path(player): Path<String>,
) -> Result<StatusCode, AppError> {
    player_service::delete_player(&state, &player).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Find the unfinished match a player is seated in.
#[utoipa::path(
    get,
    path = "/players/{player}/match",
    tag = "players",
    params(("player" = String, Path, description = "Player name")),
    responses(
        (status = 200, description = "Current match", body = PlayerMatchResponse),
        (status = 404, description = "Player is not seated")
    )
)]
pub async fn player_match(
    State(state): State<SharedState>,
    Path(player): Path<String>,
) -> Result<Json<PlayerMatchResponse>, AppError> {
    Ok(Json(match_service::player_match(&state, &player).await?))
}

#[utoipa::path(
    get,
    path = "/formats",
    tag = "players",
    responses((status = 200, description = "Cup layouts, largest first", body = FormatsResponse))
)]
pub async fn list_formats(State(state): State<SharedState>) -> Json<FormatsResponse> {
    Json(match_service::formats(&state))
}
