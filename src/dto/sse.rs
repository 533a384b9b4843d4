use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{cups::CupFormat, game::Team};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after every persisted change of a match.
pub struct MatchChangedEvent {
    pub match_id: Uuid,
    pub version: u64,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a team starts its last-chance shots.
pub struct RedemptionStartedEvent {
    pub match_id: Uuid,
    pub team: Team,
    pub shots: i32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a correction returns a redeeming team to normal play.
pub struct RedemptionCancelledEvent {
    pub match_id: Uuid,
    pub team: Team,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the redemption roles flip.
pub struct ReversalEvent {
    pub match_id: Uuid,
    /// Team now redeeming.
    pub team: Team,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a tied redemption sends the match to sudden death.
pub struct OvertimeStartedEvent {
    pub match_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a team switches the layout it shoots at.
pub struct FormatChangedEvent {
    pub match_id: Uuid,
    pub team: Team,
    pub format: CupFormat,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a match is decided.
pub struct MatchFinishedEvent {
    pub match_id: Uuid,
    pub winner: Team,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a corrupted cup set had to be rebuilt.
pub struct StateRecoveredEvent {
    pub match_id: Uuid,
    pub team: Team,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the seats or the name of a table were edited.
pub struct RosterUpdatedEvent {
    pub match_id: Uuid,
}
