use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Players currently seated in an unfinished match.
    pub seated_players: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(seated_players: usize) -> Self {
        Self {
            status: "ok".to_string(),
            seated_players,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(seated_players: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            seated_players,
        }
    }
}
