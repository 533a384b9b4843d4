use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::MatchPhase;

/// Publicly visible match status exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleMatchStatus {
    /// Normal play.
    Running,
    /// Sudden death on single cups.
    Overtime,
    /// One team is taking its last-chance shots.
    Redemption,
    /// A winner has been decided.
    Finished,
}

impl From<&MatchPhase> for VisibleMatchStatus {
    fn from(value: &MatchPhase) -> Self {
        match value {
            MatchPhase::Running => VisibleMatchStatus::Running,
            MatchPhase::Overtime => VisibleMatchStatus::Overtime,
            MatchPhase::Redemption(_) => VisibleMatchStatus::Redemption,
            MatchPhase::Finished => VisibleMatchStatus::Finished,
        }
    }
}
