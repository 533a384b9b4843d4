use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_system_time, phase::VisibleMatchStatus, validation::validate_player_names},
    state::{
        cups::{CupFormat, FormatCatalog},
        game::Team,
        state_machine::{MatchPhase, MatchState},
    },
};

/// Payload used to open a new match at a table.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateMatchRequest {
    /// Table name. Defaults to `Table N`.
    #[validate(length(min = 1, max = 60))]
    pub name: Option<String>,
    /// Players of team 1, in seat order.
    #[validate(length(min = 1, max = 2), custom(function = "validate_player_names"))]
    pub t1: Vec<String>,
    /// Players of team 2, in seat order.
    #[validate(length(min = 1, max = 2), custom(function = "validate_player_names"))]
    pub t2: Vec<String>,
}

/// Payload used to reseat an unfinished match. Cups and history are kept.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateMatchRequest {
    /// New table name. The current one is kept when absent.
    #[validate(length(min = 1, max = 60))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 2), custom(function = "validate_player_names"))]
    pub t1: Vec<String>,
    #[validate(length(min = 1, max = 2), custom(function = "validate_player_names"))]
    pub t2: Vec<String>,
}

/// Filters accepted by the match listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListMatchesQuery {
    /// Only return unfinished matches.
    #[serde(default)]
    pub active: Option<bool>,
}

/// One side of the table as seen by an observer.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamSideSummary {
    pub players: Vec<String>,
    /// Standing cups, provisional hits included.
    pub cups: Vec<String>,
    /// Cups hit but not yet removed.
    pub pending: Vec<String>,
    pub live_count: i32,
    /// Layout of this side's cups.
    pub layout: CupFormat,
    /// Layout this side is shooting at.
    pub target_format: CupFormat,
    pub format_locked: bool,
}

/// Counters of an ongoing redemption.
#[derive(Debug, Serialize, ToSchema)]
pub struct RedemptionSummary {
    /// Redeeming team.
    pub team: Team,
    pub shots_left: i32,
    pub hits: i32,
}

/// Full snapshot of a match.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchSummary {
    pub id: Uuid,
    pub name: String,
    pub round: u32,
    pub version: u64,
    pub status: VisibleMatchStatus,
    pub overtime: bool,
    pub t1: TeamSideSummary,
    pub t2: TeamSideSummary,
    pub redemption: Option<RedemptionSummary>,
    pub winning_team: Option<Team>,
    pub start_time: String,
    pub end_time: Option<String>,
}

fn side_summary(state: &MatchState, team: Team) -> TeamSideSummary {
    let cups = state.cups(team);
    TeamSideSummary {
        players: state.roster().players(team).map(str::to_owned).collect(),
        cups: cups.active().as_slice().to_vec(),
        pending: cups.pending().as_slice().to_vec(),
        live_count: cups.live_count(),
        layout: state.format_target(team.other()),
        target_format: state.format_target(team),
        format_locked: state.format_locked(team),
    }
}

fn redemption_summary(state: &MatchState) -> Option<RedemptionSummary> {
    let MatchPhase::Redemption(team) = state.phase() else {
        return None;
    };
    state.redemption().map(|counters| RedemptionSummary {
        team,
        shots_left: counters.shots_left,
        hits: counters.hits,
    })
}

impl From<&MatchState> for MatchSummary {
    fn from(value: &MatchState) -> Self {
        Self {
            id: value.id(),
            name: value.name().to_owned(),
            round: value.round(),
            version: value.version(),
            status: (&value.phase()).into(),
            overtime: value.is_overtime(),
            t1: side_summary(value, Team::T1),
            t2: side_summary(value, Team::T2),
            redemption: redemption_summary(value),
            winning_team: value.winning_team(),
            start_time: format_system_time(value.start_time()),
            end_time: value.end_time().map(format_system_time),
        }
    }
}

/// Response payload listing matches.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchListResponse {
    pub matches: Vec<MatchSummary>,
}

/// Whether the viewer won or lost.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Win,
    Loss,
}

/// Final result from the viewer's side.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchResultView {
    pub outcome: MatchOutcome,
    /// Own live count minus the opponent's.
    pub cup_difference: i32,
}

/// Redemption details from the viewer's side.
#[derive(Debug, Serialize, ToSchema)]
pub struct LiveRedemption {
    pub shots_left: i32,
    pub hits: i32,
    /// Whether the viewer's team is the one redeeming.
    pub is_me: bool,
    /// Cups the redeeming team still has to sink to tie.
    pub cups_to_tie: i32,
}

/// Tracker view of a match from one seated player's perspective.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct LiveViewResponse {
    pub match_id: Uuid,
    pub match_name: String,
    pub player: String,
    pub team: Team,
    pub teammate: Option<String>,
    pub status: VisibleMatchStatus,
    pub my_cups: Vec<String>,
    pub my_pending: Vec<String>,
    pub my_live_count: i32,
    pub opponent_cups: Vec<String>,
    pub opponent_pending: Vec<String>,
    pub opponent_live_count: i32,
    /// Layout of the viewer's own cups.
    pub my_layout: CupFormat,
    /// Layout the viewer is shooting at.
    pub target_format: CupFormat,
    pub format_locked: bool,
    /// Player expected to throw next under the configured turn policy.
    pub expected_shooter: Option<String>,
    pub redemption: Option<LiveRedemption>,
    pub result: Option<MatchResultView>,
}

impl LiveViewResponse {
    /// Project `state` for `player`, who must be seated on `team`.
    pub fn build(
        state: &MatchState,
        player: &str,
        team: Team,
        expected_shooter: Option<&str>,
    ) -> Self {
        let opponent = team.other();
        let mine = state.cups(team);
        let theirs = state.cups(opponent);

        let redemption = match state.phase() {
            MatchPhase::Redemption(redeemer) => state.redemption().map(|counters| LiveRedemption {
                shots_left: counters.shots_left,
                hits: counters.hits,
                is_me: redeemer == team,
                cups_to_tie: state.live_count(redeemer.other()).max(0),
            }),
            _ => None,
        };

        let result = state.winning_team().map(|winner| MatchResultView {
            outcome: if winner == team {
                MatchOutcome::Win
            } else {
                MatchOutcome::Loss
            },
            cup_difference: mine.live_count() - theirs.live_count(),
        });

        Self {
            match_id: state.id(),
            match_name: state.name().to_owned(),
            player: player.to_owned(),
            team,
            teammate: state.roster().teammate(player).map(str::to_owned),
            status: (&state.phase()).into(),
            my_cups: mine.active().as_slice().to_vec(),
            my_pending: mine.pending().as_slice().to_vec(),
            my_live_count: mine.live_count(),
            opponent_cups: theirs.active().as_slice().to_vec(),
            opponent_pending: theirs.pending().as_slice().to_vec(),
            opponent_live_count: theirs.live_count(),
            my_layout: state.format_target(opponent),
            target_format: state.format_target(team),
            format_locked: state.format_locked(team),
            expected_shooter: expected_shooter.map(str::to_owned),
            redemption,
            result,
        }
    }
}

/// Match a player is currently seated in.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerMatchResponse {
    pub player: String,
    pub match_id: Uuid,
}

/// One cup layout of the catalog.
#[derive(Debug, Serialize, ToSchema)]
pub struct FormatLayout {
    pub format: CupFormat,
    pub name: String,
    pub labels: Vec<String>,
}

/// Response payload listing every cup layout, largest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct FormatsResponse {
    pub formats: Vec<FormatLayout>,
}

impl From<&FormatCatalog> for FormatsResponse {
    fn from(value: &FormatCatalog) -> Self {
        Self {
            formats: value
                .iter()
                .map(|(format, labels)| FormatLayout {
                    format,
                    name: format.display_name().to_owned(),
                    labels: labels.to_vec(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        game::{Roster, ShotOutcome},
        state_machine::ShotInput,
        turn::TurnPolicy,
    };

    fn hit(state: &mut MatchState, player: &str, label: &str) {
        state
            .apply_shot(
                ShotInput {
                    player: player.into(),
                    outcome: ShotOutcome::Hit,
                    hit_labels: vec![label.into()],
                    multiplier: 1,
                    format_request: None,
                    note: String::new(),
                    drink: None,
                    stance: None,
                },
                TurnPolicy::FreeForAll,
                &FormatCatalog::default(),
            )
            .unwrap();
    }

    fn new_match() -> MatchState {
        let roster = Roster::new(
            vec!["alice".into(), "bob".into()],
            vec!["carol".into()],
        )
        .unwrap();
        MatchState::new(Uuid::new_v4(), "Table 1".into(), roster, &FormatCatalog::default())
    }

    #[test]
    fn live_view_is_projected_from_the_players_side() {
        let mut state = new_match();
        hit(&mut state, "alice", "3 Left");

        let view = LiveViewResponse::build(&state, "carol", Team::T2, None);
        assert_eq!(view.my_pending, vec!["3 Left".to_owned()]);
        assert_eq!(view.my_live_count, 5);
        assert_eq!(view.opponent_live_count, 6);
        assert_eq!(view.teammate, None);
        assert_eq!(view.status, VisibleMatchStatus::Running);
        assert!(view.redemption.is_none());

        let view = LiveViewResponse::build(&state, "alice", Team::T1, Some("carol"));
        assert_eq!(view.teammate.as_deref(), Some("bob"));
        assert_eq!(view.expected_shooter.as_deref(), Some("carol"));
    }

    #[test]
    fn live_view_reports_redemption_and_result() {
        let mut state = new_match();
        for label in ["3 Left", "3 Center", "3 Right", "2 Left", "2 Right", "1 Center"] {
            hit(&mut state, "alice", label);
        }

        let view = LiveViewResponse::build(&state, "carol", Team::T2, None);
        let redemption = view.redemption.unwrap();
        assert!(redemption.is_me);
        assert_eq!(redemption.cups_to_tie, 6);
        assert_eq!(view.status, VisibleMatchStatus::Redemption);

        let summary = MatchSummary::from(&state);
        assert_eq!(summary.redemption.unwrap().team, Team::T2);
        assert_eq!(summary.t2.layout, CupFormat::Pyramid);
        assert!(!summary.overtime);
    }

    #[test]
    fn formats_are_listed_largest_first() {
        let response = FormatsResponse::from(&FormatCatalog::default());
        assert_eq!(response.formats.len(), 6);
        assert_eq!(response.formats[0].format, CupFormat::Pyramid);
        assert_eq!(response.formats[5].labels, vec!["Single".to_owned()]);
        assert_eq!(response.formats[3].name, "Vertical Line");
    }
}
