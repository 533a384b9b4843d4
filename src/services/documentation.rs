use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Beer Pong Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::event_stream,
        crate::routes::matches::create_match,
        crate::routes::matches::list_matches,
        crate::routes::matches::get_match,
        crate::routes::matches::update_match,
        crate::routes::matches::rematch,
        crate::routes::matches::apply_shot,
        crate::routes::matches::list_shots,
        crate::routes::matches::force_advance,
        crate::routes::matches::change_format,
        crate::routes::matches::live_view,
        crate::routes::shots::edit_shot,
        crate::routes::shots::delete_shot,
        crate::routes::players::list_players,
        crate::routes::players::register_player,
        crate::routes::players::delete_player,
        crate::routes::players::player_match,
        crate::routes::players::list_formats,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::UpdateMatchRequest,
            crate::dto::matches::MatchSummary,
            crate::dto::matches::MatchListResponse,
            crate::dto::matches::LiveViewResponse,
            crate::dto::matches::PlayerMatchResponse,
            crate::dto::matches::FormatsResponse,
            crate::dto::players::RegisterPlayerRequest,
            crate::dto::players::PlayerSummary,
            crate::dto::players::PlayerListResponse,
            crate::dto::shots::ShotRequest,
            crate::dto::shots::EditShotRequest,
            crate::dto::shots::AdvanceRequest,
            crate::dto::shots::FormatChangeRequest,
            crate::dto::shots::ShotResponse,
            crate::dto::shots::ShotListResponse,
            crate::dto::shots::ShotDeletedResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::MatchChangedEvent,
            crate::dto::sse::RedemptionStartedEvent,
            crate::dto::sse::RedemptionCancelledEvent,
            crate::dto::sse::ReversalEvent,
            crate::dto::sse::OvertimeStartedEvent,
            crate::dto::sse::FormatChangedEvent,
            crate::dto::sse::MatchFinishedEvent,
            crate::dto::sse::StateRecoveredEvent,
            crate::dto::sse::RosterUpdatedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events stream"),
        (name = "matches", description = "Match lifecycle and tracker views"),
        (name = "shots", description = "Shot logging and corrections"),
        (name = "players", description = "Player registry, lookups and cup layouts"),
    )
)]
pub struct ApiDoc;
