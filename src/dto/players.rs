use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerEntity,
    dto::{format_system_time, validation::validate_player_name},
};

/// Payload used to register a player name.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterPlayerRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
}

/// A registered player and the unfinished match they sit in, if any.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub name: String,
    /// RFC 3339 registration time.
    pub registered_at: String,
    pub match_id: Option<Uuid>,
}

impl PlayerSummary {
    pub fn new(entity: &PlayerEntity, match_id: Option<Uuid>) -> Self {
        Self {
            name: entity.name.clone(),
            registered_at: format_system_time(entity.registered_at),
            match_id,
        }
    }
}

/// Response payload listing the registry, sorted by name.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerListResponse {
    pub players: Vec<PlayerSummary>,
}
