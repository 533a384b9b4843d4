use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::game::{ShotOutcome, Team};

/// Persisted representation of a match and both of its sides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Stable identifier for the match.
    pub id: Uuid,
    /// Display name of the table.
    pub name: String,
    /// Rematch counter, starting at 1.
    pub round: u32,
    /// Monotonic version bumped on every persisted mutation.
    pub version: u64,
    /// Serialized status (`running`, `redemption_t1`, `redemption_t2`, `finished`).
    pub status: String,
    /// Whether the overtime sub-mode is active.
    pub overtime: bool,
    /// Side of team 1.
    pub t1: TeamSideEntity,
    /// Side of team 2.
    pub t2: TeamSideEntity,
    /// Remaining shots of the current redemption window.
    pub redemption_shots_left: i32,
    /// Hits landed during the current redemption window.
    pub redemption_hits: i32,
    /// Counter identifying the current redemption window.
    pub redemption_serial: u32,
    /// Winner once the match is finished.
    pub winning_team: Option<Team>,
    /// Round robin cursor.
    pub turn_cursor: u32,
    pub start_time: SystemTime,
    pub end_time: Option<SystemTime>,
}

/// One team's seats, cups and format bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamSideEntity {
    /// Seat occupants, in seat order. Empty seats are `None`.
    pub players: Vec<Option<String>>,
    /// Standing cups of this team.
    pub cups: Vec<String>,
    /// Hits received but not yet committed.
    pub pending: Vec<String>,
    /// Layout key this team shoots at.
    pub format_target: String,
    /// Whether this team already spent its format change.
    pub format_locked: bool,
    /// Bumped whenever this team's cups are rebuilt or cleared.
    pub cup_generation: u32,
    /// Bumped whenever this team's pending hits are committed.
    pub commit_serial: u32,
}

/// Persisted shot log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShotEntity {
    pub id: Uuid,
    pub match_id: Uuid,
    pub round: u32,
    pub player: String,
    pub team: Team,
    pub outcome: ShotOutcome,
    pub multiplier: u8,
    /// Cups the shooter reported as hit.
    pub hit_labels: Vec<String>,
    /// Entries actually pushed onto the opponent's pending list.
    pub damage: Vec<String>,
    /// Layout key the shooter was aiming at.
    pub format: String,
    pub own_cups: i32,
    pub opponent_cups: i32,
    pub redemption_shot: bool,
    pub overtime: bool,
    pub target_generation: u32,
    pub target_commit_serial: u32,
    pub redemption_serial: u32,
    pub note: String,
    pub drink: String,
    pub stance: String,
    pub timestamp: SystemTime,
}

/// Registered player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Unique, trimmed display name.
    pub name: String,
    pub registered_at: SystemTime,
}
