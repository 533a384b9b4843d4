//! Who is entitled to throw next.

use crate::state::{
    game::{SEATS_PER_TEAM, Team},
    state_machine::{MatchError, MatchState, MatchStatus},
};

/// Shot ordering enforced on a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnPolicy {
    /// Anyone seated may shoot at any time.
    #[default]
    FreeForAll,
    /// Seats take turns alternating teams; a redeeming team shoots alone.
    RoundRobin,
}

impl TurnPolicy {
    /// Player expected to throw next, `None` when any seated player may.
    pub fn expected_shooter<'a>(&self, state: &'a MatchState) -> Option<&'a str> {
        match self {
            TurnPolicy::FreeForAll => None,
            TurnPolicy::RoundRobin => {
                let rotation = rotation(state);
                if rotation.is_empty() {
                    return None;
                }
                let index = state.turn_cursor() as usize % rotation.len();
                Some(rotation[index])
            }
        }
    }

    /// Reject a shot thrown out of turn.
    pub fn check(&self, state: &MatchState, player: &str) -> Result<(), MatchError> {
        match self.expected_shooter(state) {
            Some(expected) if expected != player => Err(MatchError::NotYourTurn {
                player: player.to_owned(),
                expected: expected.to_owned(),
            }),
            _ => Ok(()),
        }
    }
}

/// Seats in throwing order: T1 p1, T2 p1, T1 p2, T2 p2, empty seats skipped.
fn rotation(state: &MatchState) -> Vec<&str> {
    let roster = state.roster();
    let teams: &[Team] = match state.status() {
        MatchStatus::Redemption(team) => match team {
            Team::T1 => &[Team::T1],
            Team::T2 => &[Team::T2],
        },
        _ => &Team::ALL,
    };
    (0..SEATS_PER_TEAM)
        .flat_map(move |seat| {
            teams
                .iter()
                .filter_map(move |team| roster.seats(*team)[seat].as_deref())
        })
        .collect()
}
