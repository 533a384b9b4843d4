use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_system_time, matches::MatchSummary, validation::validate_player_name},
    state::{
        cups::CupFormat,
        game::{ShotOutcome, ShotRecord, Team, multiplier_tier},
        state_machine::{ShotEdit, ShotInput},
    },
};

fn default_multiplier() -> u8 {
    1
}

/// A shot thrown by a seated player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ShotRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub player: String,
    pub outcome: ShotOutcome,
    /// Cups the shooter claims to have hit.
    #[serde(default)]
    #[validate(length(max = 12))]
    pub hit_labels: Vec<String>,
    /// How many cups the hit is worth (1 to 6).
    #[serde(default = "default_multiplier")]
    #[validate(range(min = 1, max = 6))]
    pub multiplier: u8,
    /// Layout to aim at from now on. Applied once per team, only on a hit.
    #[serde(default)]
    pub format: Option<CupFormat>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub note: Option<String>,
    #[serde(default)]
    #[validate(length(max = 40))]
    pub drink: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub stance: Option<String>,
}

impl From<ShotRequest> for ShotInput {
    fn from(value: ShotRequest) -> Self {
        Self {
            player: value.player.trim().to_owned(),
            outcome: value.outcome,
            hit_labels: value.hit_labels,
            multiplier: value.multiplier,
            format_request: value.format,
            note: value.note.unwrap_or_default(),
            drink: value.drink,
            stance: value.stance,
        }
    }
}

/// Correction of a historical shot.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct EditShotRequest {
    pub outcome: ShotOutcome,
    #[serde(default)]
    #[validate(length(max = 12))]
    pub hit_labels: Vec<String>,
    #[serde(default = "default_multiplier")]
    #[validate(range(min = 1, max = 6))]
    pub multiplier: u8,
    /// Replaces the note when present.
    #[serde(default)]
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

impl EditShotRequest {
    pub fn edit(&self) -> ShotEdit {
        ShotEdit {
            outcome: self.outcome,
            hit_labels: self.hit_labels.clone(),
            multiplier: self.multiplier,
        }
    }
}

/// Filters accepted by the shot listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShotListQuery {
    /// Only return shots thrown by this player.
    #[serde(default)]
    pub player: Option<String>,
}

/// Acknowledge received hits without throwing.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AdvanceRequest {
    /// Seated player whose team takes the damage.
    #[validate(custom(function = "validate_player_name"))]
    pub player: String,
}

/// Change the layout a team shoots at without throwing.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct FormatChangeRequest {
    #[validate(custom(function = "validate_player_name"))]
    pub player: String,
    pub format: CupFormat,
}

/// Shot log entry.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct ShotSummary {
    pub id: Uuid,
    pub match_id: Uuid,
    pub round: u32,
    pub player: String,
    pub team: Team,
    pub outcome: ShotOutcome,
    pub multiplier: u8,
    /// `single`, `double`, ... up to `sextuple`.
    pub multiplier_tier: String,
    pub hit_labels: Vec<String>,
    pub format: CupFormat,
    pub own_cups: i32,
    pub opponent_cups: i32,
    pub redemption_shot: bool,
    pub overtime: bool,
    pub note: Option<String>,
    pub drink: String,
    pub stance: String,
    pub timestamp: String,
}

impl From<&ShotRecord> for ShotSummary {
    fn from(value: &ShotRecord) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            round: value.round,
            player: value.player.clone(),
            team: value.team,
            outcome: value.outcome,
            multiplier: value.multiplier,
            multiplier_tier: multiplier_tier(value.multiplier).to_owned(),
            hit_labels: value.hit_labels.clone(),
            format: value.format,
            own_cups: value.own_cups,
            opponent_cups: value.opponent_cups,
            redemption_shot: value.redemption_shot,
            overtime: value.overtime,
            note: (!value.note.is_empty()).then(|| value.note.clone()),
            drink: value.metadata.drink.clone(),
            stance: value.metadata.stance.clone(),
            timestamp: format_system_time(value.timestamp),
        }
    }
}

/// Response payload listing shots, oldest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShotListResponse {
    pub shots: Vec<ShotSummary>,
}

/// Recorded (or corrected) shot together with the resulting match.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShotResponse {
    pub shot: ShotSummary,
    #[serde(rename = "match")]
    pub match_state: MatchSummary,
}

/// Outcome of deleting a shot.
#[derive(Debug, Serialize, ToSchema)]
pub struct ShotDeletedResponse {
    pub id: Uuid,
    #[serde(rename = "match")]
    pub match_state: MatchSummary,
}
