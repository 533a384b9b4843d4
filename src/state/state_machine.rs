//! Match rules engine: status transitions, redemption, reversal, overtime and shot corrections.
//!
//! [`MatchState`] is the aggregate the services load, mutate and save. Operations return typed
//! [`MatchError`]s and leave the match untouched when they fail.

use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, TeamSideEntity},
    state::{
        cups::{CupFormat, CupSet, CupSetCorruption, DamageStage, FormatCatalog},
        game::{Roster, ShotMetadata, ShotOutcome, ShotRecord, Team, TeamPair},
        turn::TurnPolicy,
    },
};

/// Smallest accepted hit multiplier.
pub const MIN_MULTIPLIER: u8 = 1;
/// Largest accepted hit multiplier (every cup of a pyramid in one throw).
pub const MAX_MULTIPLIER: u8 = 6;

/// A live count strictly below this ends the match on the spot.
const OVERKILL_THRESHOLD: i32 = -1;
/// Shots granted when the eliminating team has a single cup left, and after a reversal.
const DOUBLE_CHANCE_SHOTS: i32 = 2;
/// Upper bound on chained transitions evaluated after one operation.
const MAX_CASCADE: usize = 8;

/// Persisted status of a match. Overtime is a mode layered on `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    /// Normal play, overtime included.
    Running,
    /// The given team is taking its last-chance shots.
    Redemption(Team),
    /// A winner has been decided. Only history corrections are accepted.
    Finished,
}

impl MatchStatus {
    /// Stable key used in persisted records.
    pub fn key(self) -> &'static str {
        match self {
            MatchStatus::Running => "running",
            MatchStatus::Redemption(Team::T1) => "redemption_t1",
            MatchStatus::Redemption(Team::T2) => "redemption_t2",
            MatchStatus::Finished => "finished",
        }
    }

    /// Inverse of [`MatchStatus::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "running" => Some(MatchStatus::Running),
            "redemption_t1" => Some(MatchStatus::Redemption(Team::T1)),
            "redemption_t2" => Some(MatchStatus::Redemption(Team::T2)),
            "finished" => Some(MatchStatus::Finished),
            _ => None,
        }
    }
}

/// The single description of where a match stands, combining status and overtime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Regular play on the chosen layouts.
    Running,
    /// Sudden death on single cups after a tied redemption.
    Overtime,
    /// The given team is redeeming.
    Redemption(Team),
    /// The match is over.
    Finished,
}

/// Counters of the current redemption window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedemptionCounters {
    /// Shots the redeeming team may still throw.
    pub shots_left: i32,
    /// Cups the redeeming team sank during the window, multipliers included.
    pub hits: i32,
    /// Identifies the window; bumped every time a redemption starts.
    pub serial: u32,
}

/// Notable transitions produced by an operation, for presentation layers to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// `team` ran out of cups and gets `shots` throws to tie.
    RedemptionStarted {
        /// Redeeming team.
        team: Team,
        /// Shots granted.
        shots: i32,
    },
    /// Roles flipped: `team` now redeems and the previous redeemer's side was cleared.
    Reversal {
        /// New redeeming team.
        team: Team,
    },
    /// A correction gave cups back to a redeeming team, returning the match to normal play.
    RedemptionCancelled {
        /// Team that was redeeming.
        team: Team,
    },
    /// Both sides were reset to a single cup.
    OvertimeStarted,
    /// `team` now shoots at `format` and the opposing cups were rebuilt.
    FormatChanged {
        /// Team that asked for the change.
        team: Team,
        /// Layout it shoots at from now on.
        format: CupFormat,
    },
    /// The match is over.
    Finished {
        /// Winning team.
        winner: Team,
    },
    /// A corrupted cup set was rebuilt from its format target.
    StateRecovered {
        /// Team whose cups were rebuilt.
        team: Team,
    },
    /// Seats or table name were edited.
    RosterUpdated,
}

/// Errors raised by the rules engine. Every error is returned before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The turn policy expects another shooter.
    #[error("it is not {player}'s turn, {expected} is up")]
    NotYourTurn {
        /// Player who tried to shoot.
        player: String,
        /// Player the policy expects.
        expected: String,
    },
    /// Mutation attempted on a finished match.
    #[error("match is finished")]
    MatchFinished,
    /// The named player has no seat in this match.
    #[error("player `{0}` is not seated in this match")]
    NotSeated(String),
    /// Hit multiplier outside `MIN_MULTIPLIER..=MAX_MULTIPLIER`.
    #[error("multiplier {0} is outside 1..=6")]
    InvalidMultiplier(u8),
    /// A cup set no longer matches the layout it should follow.
    #[error("cup set of team {team} is corrupted: {source}")]
    StateCorrupted {
        /// Team owning the broken cup set.
        team: Team,
        /// What the consistency check found.
        #[source]
        source: CupSetCorruption,
    },
}

/// A stored match could not be decoded at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchDecodeError {
    /// Status key not produced by [`MatchStatus::key`].
    #[error("unknown match status `{0}`")]
    UnknownStatus(String),
    /// Format key not produced by [`CupFormat::key`].
    #[error("unknown cup format `{0}`")]
    UnknownFormat(String),
}

/// A shot as submitted by a player.
#[derive(Debug, Clone)]
pub struct ShotInput {
    /// Seated shooter.
    pub player: String,
    pub outcome: ShotOutcome,
    /// Cups the shooter claims, in preference order.
    pub hit_labels: Vec<String>,
    /// Cups the hit is worth. Ignored on misses.
    pub multiplier: u8,
    /// Layout the shooter wants to aim at from now on. Only considered on a hit.
    pub format_request: Option<CupFormat>,
    /// Free text kept with the record.
    pub note: String,
    /// Drink name, normalised when recorded.
    pub drink: Option<String>,
    /// Stance name, defaulted from the seat when absent.
    pub stance: Option<String>,
}

/// Replacement outcome for a historical shot.
#[derive(Debug, Clone)]
pub struct ShotEdit {
    /// Corrected outcome.
    pub outcome: ShotOutcome,
    /// Corrected cup choice.
    pub hit_labels: Vec<String>,
    /// Corrected multiplier.
    pub multiplier: u8,
}

/// Result of a successfully applied shot.
#[derive(Debug, Clone)]
pub struct AppliedShot {
    /// Log entry to persist.
    pub record: ShotRecord,
    /// Transitions the shot triggered, in order.
    pub events: Vec<MatchEvent>,
}

/// Aggregate root of a match: roster, both cup sets and the status machine around them.
///
/// Every mutating operation works on a copy and only replaces `self` once the copy passed its
/// consistency check, so a rejected operation leaves the match untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchState {
    id: Uuid,
    name: String,
    round: u32,
    version: u64,
    roster: Roster,
    status: MatchStatus,
    overtime: bool,
    /// Cups standing on each side of the table.
    cups: TeamPair<CupSet>,
    /// Layout each team shoots at, i.e. the layout of the opposing cups.
    format_target: TeamPair<CupFormat>,
    format_locked: TeamPair<bool>,
    cup_generation: TeamPair<u32>,
    commit_serial: TeamPair<u32>,
    redemption: RedemptionCounters,
    winning_team: Option<Team>,
    turn_cursor: u32,
    start_time: SystemTime,
    end_time: Option<SystemTime>,
}

impl MatchState {
    /// Fresh match with both sides on the starting layout.
    pub fn new(id: Uuid, name: String, roster: Roster, catalog: &FormatCatalog) -> Self {
        let full = CupSet::full(catalog.labels(CupFormat::STARTING));
        Self {
            id,
            name,
            round: 1,
            version: 0,
            roster,
            status: MatchStatus::Running,
            overtime: false,
            cups: TeamPair::splat(full),
            format_target: TeamPair::splat(CupFormat::STARTING),
            format_locked: TeamPair::splat(false),
            cup_generation: TeamPair::default(),
            commit_serial: TeamPair::default(),
            redemption: RedemptionCounters::default(),
            winning_team: None,
            turn_cursor: 0,
            start_time: SystemTime::now(),
            end_time: None,
        }
    }

    /// Stable identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rematch counter, starting at 1.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Revision of the match, bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Seat assignment.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Persisted status.
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Whether the match is in sudden death.
    pub fn is_overtime(&self) -> bool {
        self.overtime
    }

    /// Whether a winner has been decided.
    pub fn is_finished(&self) -> bool {
        self.status == MatchStatus::Finished
    }

    /// Status and overtime folded into one value.
    pub fn phase(&self) -> MatchPhase {
        match self.status {
            MatchStatus::Finished => MatchPhase::Finished,
            MatchStatus::Redemption(team) => MatchPhase::Redemption(team),
            MatchStatus::Running if self.overtime => MatchPhase::Overtime,
            MatchStatus::Running => MatchPhase::Running,
        }
    }

    /// Cups standing on `team`'s side.
    pub fn cups(&self, team: Team) -> &CupSet {
        &self.cups[team]
    }

    /// Standing cups of `team` minus its provisional hits.
    pub fn live_count(&self, team: Team) -> i32 {
        self.cups[team].live_count()
    }

    /// Layout `team` is shooting at.
    pub fn format_target(&self, team: Team) -> CupFormat {
        self.format_target[team]
    }

    /// Whether `team` already spent its format change.
    pub fn format_locked(&self, team: Team) -> bool {
        self.format_locked[team]
    }

    /// Redemption counters, only meaningful while a team is redeeming.
    pub fn redemption(&self) -> Option<RedemptionCounters> {
        matches!(self.status, MatchStatus::Redemption(_)).then_some(self.redemption)
    }

    /// Winner of a finished match.
    pub fn winning_team(&self) -> Option<Team> {
        self.winning_team
    }

    /// Shots thrown since the last turn reset.
    pub fn turn_cursor(&self) -> u32 {
        self.turn_cursor
    }

    /// When the current round started.
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// When the match finished.
    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    /// Record one shot and run the transition rules.
    pub fn apply_shot(
        &mut self,
        shot: ShotInput,
        policy: TurnPolicy,
        catalog: &FormatCatalog,
    ) -> Result<AppliedShot, MatchError> {
        if self.is_finished() {
            return Err(MatchError::MatchFinished);
        }
        let (team, seat) = self
            .roster
            .seat_of(&shot.player)
            .ok_or_else(|| MatchError::NotSeated(shot.player.clone()))?;
        let is_hit = shot.outcome == ShotOutcome::Hit;
        if is_hit && !(MIN_MULTIPLIER..=MAX_MULTIPLIER).contains(&shot.multiplier) {
            return Err(MatchError::InvalidMultiplier(shot.multiplier));
        }
        policy.check(self, &shot.player)?;

        let target = team.other();
        let mut next = self.clone();
        let mut events = Vec::new();

        if next.status != MatchStatus::Redemption(target) {
            next.commit(team);
        }

        let multiplier = if is_hit { shot.multiplier } else { 0 };
        let mut hit_labels = Vec::new();
        let mut damage = Vec::new();
        if is_hit {
            if let Some(format) = shot.format_request {
                events.extend(next.resolve_format_request(team, format, catalog));
            }
            hit_labels = stat_labels(&shot.hit_labels, multiplier);
            damage = next.cups[target].register_hits(&shot.hit_labels, multiplier);
        }

        let redemption_shot = next.status == MatchStatus::Redemption(team);
        let record_context = (
            next.format_target[team],
            next.cup_generation[target],
            next.commit_serial[target],
            next.redemption.serial,
            next.overtime,
        );
        if redemption_shot {
            next.redemption.hits += i32::from(multiplier);
            next.redemption.shots_left -= 1;
        }
        next.turn_cursor = next.turn_cursor.wrapping_add(1);

        next.check_integrity(catalog)?;
        next.evaluate(catalog, &mut events);
        next.version += 1;

        let (format, target_generation, target_commit_serial, redemption_serial, overtime) =
            record_context;
        let record = ShotRecord {
            id: Uuid::new_v4(),
            match_id: next.id,
            round: next.round,
            player: shot.player,
            team,
            outcome: shot.outcome,
            multiplier: if is_hit { multiplier } else { shot.multiplier.max(MIN_MULTIPLIER) },
            hit_labels,
            damage,
            format,
            own_cups: next.live_count(team),
            opponent_cups: next.live_count(target),
            redemption_shot,
            overtime,
            target_generation,
            target_commit_serial,
            redemption_serial,
            note: shot.note,
            metadata: ShotMetadata::resolve(shot.drink.as_deref(), shot.stance.as_deref(), seat),
            timestamp: SystemTime::now(),
        };

        *self = next;
        Ok(AppliedShot { record, events })
    }

    /// Change the layout `team` shoots at without throwing a ball.
    ///
    /// Returns `None` when the request is ignored (same layout, already used, or outside
    /// normal play).
    pub fn change_format(
        &mut self,
        team: Team,
        format: CupFormat,
        catalog: &FormatCatalog,
    ) -> Result<Vec<MatchEvent>, MatchError> {
        if self.is_finished() {
            return Err(MatchError::MatchFinished);
        }
        let mut next = self.clone();
        let Some(event) = next.resolve_format_request(team, format, catalog) else {
            return Ok(Vec::new());
        };
        let mut events = vec![event];
        next.check_integrity(catalog)?;
        next.evaluate(catalog, &mut events);
        next.version += 1;
        *self = next;
        Ok(events)
    }

    /// Lock in the hits `damaged_team` received without waiting for its next shot.
    ///
    /// Only normal play (overtime included) commits anything; during a redemption the call is
    /// ignored.
    pub fn force_advance(
        &mut self,
        damaged_team: Team,
        catalog: &FormatCatalog,
    ) -> Result<Vec<MatchEvent>, MatchError> {
        if self.is_finished() {
            return Err(MatchError::MatchFinished);
        }
        if self.status != MatchStatus::Running || self.cups[damaged_team].pending().is_empty() {
            return Ok(Vec::new());
        }
        let mut next = self.clone();
        next.commit(damaged_team);
        let mut events = Vec::new();
        next.check_integrity(catalog)?;
        next.evaluate(catalog, &mut events);
        next.version += 1;
        *self = next;
        Ok(events)
    }

    /// Withdraw a historical shot.
    ///
    /// Shots of a finished match, of an earlier round, or aimed at cups that have since been
    /// rebuilt are history only: the cups are left alone.
    pub fn undo_shot(
        &mut self,
        record: &ShotRecord,
        catalog: &FormatCatalog,
    ) -> Result<Vec<MatchEvent>, MatchError> {
        if !self.correction_applies(record) {
            return Ok(Vec::new());
        }
        let mut next = self.clone();
        next.withdraw(record);
        next.turn_cursor = next.turn_cursor.saturating_sub(1);
        let mut events = Vec::new();
        next.check_integrity(catalog)?;
        next.reevaluate_after_correction(catalog, &mut events);
        next.version += 1;
        *self = next;
        Ok(events)
    }

    /// Replace the outcome of a historical shot, returning the corrected record.
    pub fn redo_shot(
        &mut self,
        record: &ShotRecord,
        edit: ShotEdit,
        catalog: &FormatCatalog,
    ) -> Result<(ShotRecord, Vec<MatchEvent>), MatchError> {
        let is_hit = edit.outcome == ShotOutcome::Hit;
        if is_hit && !(MIN_MULTIPLIER..=MAX_MULTIPLIER).contains(&edit.multiplier) {
            return Err(MatchError::InvalidMultiplier(edit.multiplier));
        }
        let multiplier = if is_hit { edit.multiplier } else { 0 };

        let mut updated = record.clone();
        updated.outcome = edit.outcome;
        updated.multiplier = edit.multiplier.max(MIN_MULTIPLIER);
        updated.hit_labels = stat_labels(&edit.hit_labels, multiplier);

        if !self.correction_applies(record) {
            updated.damage = updated.hit_labels.clone();
            return Ok((updated, Vec::new()));
        }

        let target = record.team.other();
        let mut next = self.clone();
        next.withdraw(record);

        updated.damage = if is_hit {
            let stage = if next.commit_serial[target] > record.target_commit_serial {
                DamageStage::Committed
            } else {
                DamageStage::Pending
            };
            next.cups[target].redo_hit(&edit.hit_labels, multiplier, stage)
        } else {
            Vec::new()
        };
        if next.in_same_redemption(record) {
            next.redemption.hits += i32::from(multiplier);
            next.redemption.shots_left -= 1;
        }
        updated.opponent_cups =
            record.opponent_cups + record.damage.len() as i32 - updated.damage.len() as i32;

        let mut events = Vec::new();
        next.check_integrity(catalog)?;
        next.reevaluate_after_correction(catalog, &mut events);
        next.version += 1;
        *self = next;
        Ok((updated, events))
    }

    /// Reseat the table and optionally rename it, keeping cups and status as they are.
    ///
    /// Shots already thrown stay attributed to the team they were thrown for.
    pub fn update_roster(
        &mut self,
        name: Option<String>,
        roster: Roster,
    ) -> Result<MatchEvent, MatchError> {
        if self.is_finished() {
            return Err(MatchError::MatchFinished);
        }
        if let Some(name) = name {
            self.name = name;
        }
        self.roster = roster;
        self.version += 1;
        info!(match_id = %self.id, name = %self.name, "roster updated");
        Ok(MatchEvent::RosterUpdated)
    }

    /// Reset the match for another round with the same roster.
    pub fn rematch(&mut self, catalog: &FormatCatalog) {
        let labels = catalog.labels(CupFormat::STARTING);
        for team in Team::ALL {
            self.cups[team].init(labels);
            self.cup_generation[team] += 1;
        }
        self.status = MatchStatus::Running;
        self.overtime = false;
        self.format_target = TeamPair::splat(CupFormat::STARTING);
        self.format_locked = TeamPair::splat(false);
        self.redemption = RedemptionCounters {
            serial: self.redemption.serial,
            ..RedemptionCounters::default()
        };
        self.winning_team = None;
        self.turn_cursor = 0;
        self.start_time = SystemTime::now();
        self.end_time = None;
        self.round += 1;
        self.version += 1;
        info!(match_id = %self.id, round = self.round, "rematch started");
    }

    /// Verify both cup sets against the layouts they are supposed to follow.
    pub fn check_integrity(&self, catalog: &FormatCatalog) -> Result<(), MatchError> {
        for team in Team::ALL {
            let format = self.format_target[team.other()];
            self.cups[team]
                .validate(format, catalog.labels(format))
                .map_err(|source| MatchError::StateCorrupted { team, source })?;
        }
        Ok(())
    }

    /// Rebuild `team`'s cups from the layout its opponent is targeting.
    ///
    /// The version is left alone: a caller that saves the repaired match calls
    /// [`MatchState::mark_repaired`] once, however many sides were rebuilt.
    pub fn recover(&mut self, team: Team, catalog: &FormatCatalog) -> MatchEvent {
        let format = self.format_target[team.other()];
        self.cups[team].init(catalog.labels(format));
        self.cup_generation[team] += 1;
        info!(match_id = %self.id, team = %team, format = %format, "cup set rebuilt");
        MatchEvent::StateRecovered { team }
    }

    /// Count in-place repairs as one new revision.
    pub fn mark_repaired(&mut self) {
        self.version += 1;
    }

    fn commit(&mut self, team: Team) {
        let removed = self.cups[team].commit_pending();
        self.commit_serial[team] += 1;
        if removed > 0 {
            debug!(match_id = %self.id, team = %team, removed, "pending hits committed");
        }
    }

    /// First distinct request wins; later requests and requests outside normal play are ignored.
    fn resolve_format_request(
        &mut self,
        team: Team,
        format: CupFormat,
        catalog: &FormatCatalog,
    ) -> Option<MatchEvent> {
        if format == self.format_target[team] {
            return None;
        }
        if self.format_locked[team] || self.overtime || self.status != MatchStatus::Running {
            debug!(
                match_id = %self.id,
                team = %team,
                requested = %format,
                kept = %self.format_target[team],
                "format change ignored"
            );
            return None;
        }
        let target = team.other();
        self.format_target[team] = format;
        self.format_locked[team] = true;
        self.cups[target].init(catalog.labels(format));
        self.cup_generation[target] += 1;
        info!(match_id = %self.id, team = %team, format = %format, "format changed");
        Some(MatchEvent::FormatChanged { team, format })
    }

    fn correction_applies(&self, record: &ShotRecord) -> bool {
        !self.is_finished()
            && record.round == self.round
            && record.target_generation == self.cup_generation[record.team.other()]
    }

    fn in_same_redemption(&self, record: &ShotRecord) -> bool {
        record.redemption_shot
            && self.status == MatchStatus::Redemption(record.team)
            && record.redemption_serial == self.redemption.serial
    }

    fn withdraw(&mut self, record: &ShotRecord) {
        if record.outcome == ShotOutcome::Hit {
            self.cups[record.team.other()].undo_hit(&record.damage);
        }
        if self.in_same_redemption(record) {
            if record.outcome == ShotOutcome::Hit {
                self.redemption.hits =
                    (self.redemption.hits - i32::from(record.multiplier)).max(0);
            }
            self.redemption.shots_left += 1;
        }
    }

    fn reevaluate_after_correction(&mut self, catalog: &FormatCatalog, events: &mut Vec<MatchEvent>) {
        if let MatchStatus::Redemption(team) = self.status
            && self.live_count(team) > 0
        {
            self.status = MatchStatus::Running;
            self.redemption = RedemptionCounters {
                serial: self.redemption.serial,
                ..RedemptionCounters::default()
            };
            self.turn_cursor = 0;
            info!(match_id = %self.id, team = %team, "redemption cancelled by correction");
            events.push(MatchEvent::RedemptionCancelled { team });
        }
        self.evaluate(catalog, events);
    }

    fn evaluate(&mut self, catalog: &FormatCatalog, events: &mut Vec<MatchEvent>) {
        for _ in 0..MAX_CASCADE {
            match self.next_transition(catalog) {
                Some(event) => events.push(event),
                None => return,
            }
        }
    }

    fn next_transition(&mut self, catalog: &FormatCatalog) -> Option<MatchEvent> {
        match self.status {
            MatchStatus::Finished => None,
            MatchStatus::Running => {
                // Most eliminated side first, T1 on ties.
                let team = if self.live_count(Team::T2) < self.live_count(Team::T1) {
                    Team::T2
                } else {
                    Team::T1
                };
                let live = self.live_count(team);
                if live < OVERKILL_THRESHOLD {
                    Some(self.finish(team.other()))
                } else if live <= 0 {
                    Some(self.enter_redemption(team))
                } else {
                    None
                }
            }
            MatchStatus::Redemption(redeemer) => {
                let eliminator = redeemer.other();
                let target = self.live_count(eliminator);
                if target < OVERKILL_THRESHOLD {
                    return Some(self.finish(redeemer));
                }
                if self.live_count(redeemer) < OVERKILL_THRESHOLD {
                    return Some(self.finish(eliminator));
                }
                if self.redemption.shots_left > 0 {
                    return None;
                }
                Some(match target {
                    0 => self.start_overtime(catalog),
                    OVERKILL_THRESHOLD => self.reverse(redeemer),
                    _ => self.finish(eliminator),
                })
            }
        }
    }

    fn enter_redemption(&mut self, team: Team) -> MatchEvent {
        let opponent_live = self.live_count(team.other());
        let shots = if opponent_live == 1 {
            DOUBLE_CHANCE_SHOTS
        } else {
            opponent_live.max(0)
        };
        self.status = MatchStatus::Redemption(team);
        self.redemption = RedemptionCounters {
            shots_left: shots,
            hits: 0,
            serial: self.redemption.serial + 1,
        };
        self.turn_cursor = 0;
        info!(match_id = %self.id, team = %team, shots, "redemption started");
        MatchEvent::RedemptionStarted { team, shots }
    }

    fn reverse(&mut self, redeemer: Team) -> MatchEvent {
        let team = redeemer.other();
        self.cups[team].clear();
        self.cup_generation[team] += 1;
        self.status = MatchStatus::Redemption(team);
        self.redemption = RedemptionCounters {
            shots_left: DOUBLE_CHANCE_SHOTS,
            hits: 0,
            serial: self.redemption.serial + 1,
        };
        self.turn_cursor = 0;
        info!(match_id = %self.id, team = %team, "reversal, roles flipped");
        MatchEvent::Reversal { team }
    }

    fn start_overtime(&mut self, catalog: &FormatCatalog) -> MatchEvent {
        let labels = catalog.labels(CupFormat::OVERTIME);
        for team in Team::ALL {
            self.cups[team].init(labels);
            self.cup_generation[team] += 1;
        }
        self.format_target = TeamPair::splat(CupFormat::OVERTIME);
        self.format_locked = TeamPair::splat(true);
        self.redemption = RedemptionCounters {
            serial: self.redemption.serial,
            ..RedemptionCounters::default()
        };
        self.status = MatchStatus::Running;
        self.overtime = true;
        self.turn_cursor = 0;
        info!(match_id = %self.id, "overtime started");
        MatchEvent::OvertimeStarted
    }

    fn finish(&mut self, winner: Team) -> MatchEvent {
        self.status = MatchStatus::Finished;
        self.winning_team = Some(winner);
        self.end_time = Some(SystemTime::now());
        info!(match_id = %self.id, winner = %winner, "match finished");
        MatchEvent::Finished { winner }
    }
}

/// Distinct chosen labels, capped at the multiplier, kept for statistics.
fn stat_labels(chosen: &[String], multiplier: u8) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for label in chosen {
        if labels.len() == usize::from(multiplier) {
            break;
        }
        if !labels.contains(label) {
            labels.push(label.clone());
        }
    }
    labels
}

fn side_entity(state: &MatchState, team: Team) -> TeamSideEntity {
    let cups = &state.cups[team];
    TeamSideEntity {
        players: state.roster.seats(team).to_vec(),
        cups: cups.active().as_slice().to_vec(),
        pending: cups.pending().as_slice().to_vec(),
        format_target: state.format_target[team].key().to_owned(),
        format_locked: state.format_locked[team],
        cup_generation: state.cup_generation[team],
        commit_serial: state.commit_serial[team],
    }
}

impl From<&MatchState> for MatchEntity {
    fn from(value: &MatchState) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            round: value.round,
            version: value.version,
            status: value.status.key().to_owned(),
            overtime: value.overtime,
            t1: side_entity(value, Team::T1),
            t2: side_entity(value, Team::T2),
            redemption_shots_left: value.redemption.shots_left,
            redemption_hits: value.redemption.hits,
            redemption_serial: value.redemption.serial,
            winning_team: value.winning_team,
            turn_cursor: value.turn_cursor,
            start_time: value.start_time,
            end_time: value.end_time,
        }
    }
}

impl TryFrom<MatchEntity> for MatchState {
    type Error = MatchDecodeError;

    fn try_from(value: MatchEntity) -> Result<Self, Self::Error> {
        let status = MatchStatus::from_key(&value.status)
            .ok_or_else(|| MatchDecodeError::UnknownStatus(value.status.clone()))?;
        let format = |side: &TeamSideEntity| {
            CupFormat::from_key(&side.format_target)
                .ok_or_else(|| MatchDecodeError::UnknownFormat(side.format_target.clone()))
        };
        let format_target = TeamPair::new(format(&value.t1)?, format(&value.t2)?);
        let roster = Roster::from_seats(&value.t1.players, &value.t2.players);

        Ok(Self {
            id: value.id,
            name: value.name,
            round: value.round,
            version: value.version,
            roster,
            status,
            overtime: value.overtime,
            cups: TeamPair::new(
                CupSet::from_parts(value.t1.cups, value.t1.pending),
                CupSet::from_parts(value.t2.cups, value.t2.pending),
            ),
            format_target,
            format_locked: TeamPair::new(value.t1.format_locked, value.t2.format_locked),
            cup_generation: TeamPair::new(value.t1.cup_generation, value.t2.cup_generation),
            commit_serial: TeamPair::new(value.t1.commit_serial, value.t2.commit_serial),
            redemption: RedemptionCounters {
                shots_left: value.redemption_shots_left,
                hits: value.redemption_hits,
                serial: value.redemption_serial,
            },
            winning_team: value.winning_team,
            turn_cursor: value.turn_cursor,
            start_time: value.start_time,
            end_time: value.end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cups::OVERKILL_LABEL;

    const PYRAMID: [&str; 6] = [
        "3 Left", "3 Center", "3 Right", "2 Left", "2 Right", "1 Center",
    ];

    fn catalog() -> FormatCatalog {
        FormatCatalog::default()
    }

    fn new_match() -> MatchState {
        let roster = Roster::new(
            vec!["alice".into(), "bob".into()],
            vec!["carol".into(), "dave".into()],
        )
        .unwrap();
        MatchState::new(Uuid::new_v4(), "Table 1".into(), roster, &catalog())
    }

    fn shot(player: &str, outcome: ShotOutcome, labels: &[&str], multiplier: u8) -> ShotInput {
        ShotInput {
            player: player.into(),
            outcome,
            hit_labels: labels.iter().map(|l| (*l).to_owned()).collect(),
            multiplier,
            format_request: None,
            note: String::new(),
            drink: None,
            stance: None,
        }
    }

    fn hit(state: &mut MatchState, player: &str, labels: &[&str]) -> AppliedShot {
        state
            .apply_shot(
                shot(player, ShotOutcome::Hit, labels, labels.len().max(1) as u8),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap()
    }

    fn miss(state: &mut MatchState, player: &str) -> AppliedShot {
        state
            .apply_shot(
                shot(player, ShotOutcome::Miss, &[], 1),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap()
    }

    fn assert_live_invariant(state: &MatchState) {
        for team in Team::ALL {
            let cups = state.cups(team);
            assert_eq!(
                state.live_count(team),
                cups.active().len() as i32 - cups.pending().len() as i32
            );
        }
    }

    /// T1 clears five T2 cups, leaving T2 on one standing cup and T1 on `t1_left`.
    fn t2_redeeming_against(t1_left: usize) -> MatchState {
        let mut state = new_match();
        for label in &PYRAMID[..6 - t1_left] {
            hit(&mut state, "carol", &[label]);
        }
        for label in &PYRAMID {
            hit(&mut state, "alice", &[label]);
        }
        state
    }

    #[test]
    fn six_distinct_hits_send_the_target_into_redemption() {
        let mut state = new_match();
        let mut last = None;
        for label in PYRAMID {
            last = Some(hit(&mut state, "alice", &[label]));
            assert_live_invariant(&state);
        }

        assert_eq!(state.live_count(Team::T2), 0);
        assert_eq!(state.status(), MatchStatus::Redemption(Team::T2));
        let events = last.unwrap().events;
        assert_eq!(
            events,
            vec![MatchEvent::RedemptionStarted {
                team: Team::T2,
                shots: 6
            }]
        );
    }

    #[test]
    fn single_cup_target_grants_two_redemption_shots() {
        let state = t2_redeeming_against(1);
        assert_eq!(state.status(), MatchStatus::Redemption(Team::T2));
        let counters = state.redemption().unwrap();
        assert_eq!(counters.shots_left, 2);
        assert_eq!(counters.hits, 0);
        assert_eq!(state.live_count(Team::T1), 1);
    }

    #[test]
    fn two_redemption_misses_hand_the_win_to_the_eliminator() {
        let mut state = t2_redeeming_against(1);
        miss(&mut state, "carol");
        assert_eq!(state.redemption().unwrap().shots_left, 1);
        let applied = miss(&mut state, "dave");

        assert_eq!(state.status(), MatchStatus::Finished);
        assert_eq!(state.winning_team(), Some(Team::T1));
        assert!(state.end_time().is_some());
        assert_eq!(applied.events, vec![MatchEvent::Finished { winner: Team::T1 }]);
        assert!(applied.record.redemption_shot);
    }

    #[test]
    fn tying_the_target_starts_overtime_on_single_cups() {
        let mut state = t2_redeeming_against(1);
        hit(&mut state, "carol", &["1 Center"]);
        assert_eq!(state.redemption().unwrap().hits, 1);
        let applied = miss(&mut state, "dave");

        assert_eq!(applied.events, vec![MatchEvent::OvertimeStarted]);
        assert_eq!(state.phase(), MatchPhase::Overtime);
        let single = vec!["Single".to_owned()];
        for team in Team::ALL {
            assert_eq!(state.cups(team).active().as_slice(), single.as_slice());
            assert!(state.cups(team).pending().is_empty());
            assert_eq!(state.format_target(team), CupFormat::SingleCenter);
            assert!(state.format_locked(team));
        }
        assert!(state.redemption().is_none());
    }

    #[test]
    fn overshooting_by_one_flips_the_redemption() {
        let mut state = t2_redeeming_against(1);
        let applied = state
            .apply_shot(
                shot("carol", ShotOutcome::Hit, &["1 Center"], 2),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap();
        assert!(applied.events.is_empty());
        assert_eq!(state.live_count(Team::T1), -1);

        let applied = miss(&mut state, "dave");
        assert_eq!(applied.events, vec![MatchEvent::Reversal { team: Team::T1 }]);
        assert_eq!(state.status(), MatchStatus::Redemption(Team::T1));
        assert_eq!(state.redemption().unwrap().shots_left, 2);
        assert_eq!(state.redemption().unwrap().hits, 0);
        assert!(state.cups(Team::T1).active().is_empty());
        assert!(state.cups(Team::T1).pending().is_empty());
    }

    #[test]
    fn overkill_in_normal_play_ends_the_match() {
        let mut state = new_match();
        for label in &PYRAMID[..5] {
            hit(&mut state, "alice", &[label]);
        }
        assert_eq!(state.status(), MatchStatus::Running);
        let applied = state
            .apply_shot(
                shot("bob", ShotOutcome::Hit, &["1 Center"], 3),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap();

        assert_eq!(state.live_count(Team::T2), -2);
        assert_eq!(applied.events, vec![MatchEvent::Finished { winner: Team::T1 }]);
        assert_eq!(state.winning_team(), Some(Team::T1));
        assert_eq!(
            applied.record.damage,
            vec!["1 Center".to_owned(), OVERKILL_LABEL.into(), OVERKILL_LABEL.into()]
        );
    }

    #[test]
    fn redeemer_overkill_wins_immediately() {
        let mut state = t2_redeeming_against(1);
        let applied = state
            .apply_shot(
                shot("carol", ShotOutcome::Hit, &["1 Center"], 3),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap();
        assert_eq!(applied.events, vec![MatchEvent::Finished { winner: Team::T2 }]);
    }

    #[test]
    fn finished_matches_reject_shots() {
        let mut state = t2_redeeming_against(1);
        miss(&mut state, "carol");
        miss(&mut state, "carol");
        let err = state
            .apply_shot(
                shot("alice", ShotOutcome::Miss, &[], 1),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap_err();
        assert_eq!(err, MatchError::MatchFinished);
        assert_eq!(
            state.force_advance(Team::T2, &catalog()),
            Err(MatchError::MatchFinished)
        );
    }

    #[test]
    fn pending_hits_commit_on_the_damaged_teams_next_shot() {
        let mut state = new_match();
        hit(&mut state, "alice", &["3 Left"]);
        assert_eq!(state.cups(Team::T2).pending().len(), 1);
        assert_eq!(state.cups(Team::T2).active().len(), 6);

        miss(&mut state, "carol");
        assert!(state.cups(Team::T2).pending().is_empty());
        assert_eq!(state.cups(Team::T2).active().len(), 5);
        assert_eq!(state.live_count(Team::T2), 5);
    }

    #[test]
    fn redeeming_opponent_keeps_damage_visible() {
        let mut state = t2_redeeming_against(2);
        assert_eq!(state.status(), MatchStatus::Redemption(Team::T2));
        hit(&mut state, "carol", &["1 Center"]);
        assert_eq!(state.cups(Team::T1).pending().len(), 1);

        // T1 shooting during T2's redemption must not take its own cups down yet.
        miss(&mut state, "alice");
        assert_eq!(state.cups(Team::T1).pending().len(), 1);
        assert!(state.force_advance(Team::T1, &catalog()).unwrap().is_empty());
        assert_eq!(state.cups(Team::T1).pending().len(), 1);
    }

    #[test]
    fn force_advance_commits_pending_damage() {
        let mut state = new_match();
        hit(&mut state, "alice", &["3 Left", "3 Right"]);
        let version = state.version();
        state.force_advance(Team::T2, &catalog()).unwrap();

        assert!(state.cups(Team::T2).pending().is_empty());
        assert_eq!(state.cups(Team::T2).active().len(), 4);
        assert_eq!(state.version(), version + 1);
    }

    #[test]
    fn second_format_request_is_ignored() {
        let mut state = new_match();
        let mut first = shot("alice", ShotOutcome::Hit, &["D3 Center"], 1);
        first.format_request = Some(CupFormat::Diamond);
        let applied = state
            .apply_shot(first, TurnPolicy::FreeForAll, &catalog())
            .unwrap();
        assert_eq!(
            applied.events,
            vec![MatchEvent::FormatChanged {
                team: Team::T1,
                format: CupFormat::Diamond
            }]
        );
        assert_eq!(state.cups(Team::T2).active().len(), 4);
        assert_eq!(state.live_count(Team::T2), 3);

        let mut second = shot("bob", ShotOutcome::Hit, &["D2 Left"], 1);
        second.format_request = Some(CupFormat::Triangle);
        let applied = state
            .apply_shot(second, TurnPolicy::FreeForAll, &catalog())
            .unwrap();
        assert!(applied.events.is_empty());
        assert_eq!(applied.record.format, CupFormat::Diamond);
        assert_eq!(state.format_target(Team::T1), CupFormat::Diamond);
        assert_eq!(state.live_count(Team::T2), 2);
    }

    #[test]
    fn format_requests_on_misses_are_ignored() {
        let mut state = new_match();
        let mut input = shot("alice", ShotOutcome::Miss, &[], 1);
        input.format_request = Some(CupFormat::Triangle);
        state
            .apply_shot(input, TurnPolicy::FreeForAll, &catalog())
            .unwrap();
        assert_eq!(state.format_target(Team::T1), CupFormat::Pyramid);
        assert!(!state.format_locked(Team::T1));
    }

    #[test]
    fn standalone_format_change_rebuilds_the_opponent() {
        let mut state = new_match();
        hit(&mut state, "alice", &["3 Left"]);
        let events = state
            .change_format(Team::T1, CupFormat::Triangle, &catalog())
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(state.live_count(Team::T2), 3);
        assert!(state.cups(Team::T2).pending().is_empty());

        let events = state
            .change_format(Team::T1, CupFormat::VerticalLine, &catalog())
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(state.format_target(Team::T1), CupFormat::Triangle);
    }

    #[test]
    fn undo_then_redo_restores_identical_cups() {
        let mut state = new_match();
        let applied = hit(&mut state, "alice", &["3 Left", "3 Center"]);
        miss(&mut state, "carol");
        let before = state.clone();

        state.undo_shot(&applied.record, &catalog()).unwrap();
        assert_eq!(state.live_count(Team::T2), 6);
        assert_live_invariant(&state);

        let mut edited = before.clone();
        let (record, _) = edited
            .redo_shot(
                &applied.record,
                ShotEdit {
                    outcome: ShotOutcome::Hit,
                    hit_labels: applied.record.hit_labels.clone(),
                    multiplier: 2,
                },
                &catalog(),
            )
            .unwrap();
        assert_eq!(record.damage, applied.record.damage);
        for team in Team::ALL {
            assert_eq!(edited.cups(team), before.cups(team));
        }
    }

    #[test]
    fn editing_a_hit_into_a_miss_gives_cups_back() {
        let mut state = new_match();
        let applied = hit(&mut state, "alice", &["3 Left"]);
        let (record, _) = state
            .redo_shot(
                &applied.record,
                ShotEdit {
                    outcome: ShotOutcome::Miss,
                    hit_labels: Vec::new(),
                    multiplier: 1,
                },
                &catalog(),
            )
            .unwrap();
        assert!(record.damage.is_empty());
        assert_eq!(record.opponent_cups, 6);
        assert_eq!(state.live_count(Team::T2), 6);
        assert!(state.cups(Team::T2).pending().is_empty());
    }

    #[test]
    fn undoing_a_redemption_shot_restores_the_counters() {
        let mut state = t2_redeeming_against(1);
        let applied = miss(&mut state, "carol");
        assert_eq!(state.redemption().unwrap().shots_left, 1);

        state.undo_shot(&applied.record, &catalog()).unwrap();
        let counters = state.redemption().unwrap();
        assert_eq!(counters.shots_left, 2);
        assert_eq!(counters.hits, 0);
    }

    #[test]
    fn undoing_the_eliminating_hit_cancels_redemption() {
        let mut state = new_match();
        let mut last = None;
        for label in PYRAMID {
            last = Some(hit(&mut state, "alice", &[label]));
        }
        assert_eq!(state.status(), MatchStatus::Redemption(Team::T2));

        let events = state
            .undo_shot(&last.unwrap().record, &catalog())
            .unwrap();
        assert_eq!(events, vec![MatchEvent::RedemptionCancelled { team: Team::T2 }]);
        assert_eq!(state.status(), MatchStatus::Running);
        assert_eq!(state.live_count(Team::T2), 1);
    }

    #[test]
    fn corrections_on_finished_matches_only_touch_history() {
        let mut state = t2_redeeming_against(1);
        let first = miss(&mut state, "carol");
        miss(&mut state, "carol");
        let finished = state.clone();

        assert!(state.undo_shot(&first.record, &catalog()).unwrap().is_empty());
        let (record, events) = state
            .redo_shot(
                &first.record,
                ShotEdit {
                    outcome: ShotOutcome::Hit,
                    hit_labels: vec!["1 Center".into()],
                    multiplier: 1,
                },
                &catalog(),
            )
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(record.outcome, ShotOutcome::Hit);
        assert_eq!(state, finished);
    }

    #[test]
    fn undo_after_format_change_leaves_rebuilt_cups_alone() {
        let mut state = new_match();
        let applied = hit(&mut state, "alice", &["3 Left"]);
        state
            .change_format(Team::T1, CupFormat::Triangle, &catalog())
            .unwrap();
        let snapshot = state.clone();

        state.undo_shot(&applied.record, &catalog()).unwrap();
        assert_eq!(state, snapshot);
    }

    #[test]
    fn rematch_resets_everything_but_the_roster() {
        let mut state = t2_redeeming_against(1);
        miss(&mut state, "carol");
        miss(&mut state, "carol");
        let roster = state.roster().clone();

        state.rematch(&catalog());
        assert_eq!(state.status(), MatchStatus::Running);
        assert_eq!(state.round(), 2);
        assert_eq!(state.winning_team(), None);
        assert_eq!(state.end_time(), None);
        assert_eq!(state.roster(), &roster);
        for team in Team::ALL {
            assert_eq!(state.live_count(team), 6);
            assert!(!state.format_locked(team));
        }
    }

    #[test]
    fn unseated_players_and_bad_multipliers_are_rejected() {
        let mut state = new_match();
        let err = state
            .apply_shot(
                shot("mallory", ShotOutcome::Miss, &[], 1),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap_err();
        assert_eq!(err, MatchError::NotSeated("mallory".into()));

        let err = state
            .apply_shot(
                shot("alice", ShotOutcome::Hit, &[], 7),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap_err();
        assert_eq!(err, MatchError::InvalidMultiplier(7));
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn corrupted_cups_are_detected_and_recovered() {
        let state = new_match();
        let mut entity = MatchEntity::from(&state);
        entity.t2.cups.push("Mystery Cup".into());
        let mut decoded = MatchState::try_from(entity).unwrap();

        let err = decoded.check_integrity(&catalog()).unwrap_err();
        assert!(matches!(err, MatchError::StateCorrupted { team: Team::T2, .. }));

        let event = decoded.recover(Team::T2, &catalog());
        assert_eq!(event, MatchEvent::StateRecovered { team: Team::T2 });
        assert!(decoded.check_integrity(&catalog()).is_ok());
        assert_eq!(decoded.live_count(Team::T2), 6);
    }

    #[test]
    fn entity_round_trip_preserves_the_match() {
        let mut state = t2_redeeming_against(2);
        hit(&mut state, "carol", &["1 Center"]);
        let decoded = MatchState::try_from(MatchEntity::from(&state)).unwrap();
        assert_eq!(decoded, state);

        let mut entity = MatchEntity::from(&state);
        entity.status = "halftime".into();
        assert_eq!(
            MatchState::try_from(entity),
            Err(MatchDecodeError::UnknownStatus("halftime".into()))
        );
    }

    #[test]
    fn a_last_cup_double_hit_starts_redemption_at_minus_one() {
        let mut state = new_match();
        for label in &PYRAMID[..5] {
            hit(&mut state, "alice", &[label]);
        }
        let applied = state
            .apply_shot(
                shot("bob", ShotOutcome::Hit, &["1 Center"], 2),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap();

        assert_eq!(state.live_count(Team::T2), -1);
        assert_eq!(state.status(), MatchStatus::Redemption(Team::T2));
        assert_eq!(state.winning_team(), None);
        assert_eq!(
            applied.events,
            vec![MatchEvent::RedemptionStarted {
                team: Team::T2,
                shots: 6
            }]
        );
    }

    #[test]
    fn eliminator_overkill_during_redemption_ends_the_match() {
        let mut state = t2_redeeming_against(2);
        assert_eq!(state.live_count(Team::T2), 0);

        let applied = state
            .apply_shot(
                shot("alice", ShotOutcome::Hit, &["1 Center"], 2),
                TurnPolicy::FreeForAll,
                &catalog(),
            )
            .unwrap();

        assert_eq!(state.live_count(Team::T2), -2);
        assert_eq!(applied.events, vec![MatchEvent::Finished { winner: Team::T1 }]);
        assert_eq!(state.winning_team(), Some(Team::T1));
        assert!(!applied.record.redemption_shot);
    }

    #[test]
    fn live_counts_never_drift_across_corrections() {
        let mut state = new_match();
        let first = hit(&mut state, "alice", &["3 Left", "3 Center"]);
        assert_live_invariant(&state);
        miss(&mut state, "carol");
        assert_live_invariant(&state);
        let second = hit(&mut state, "bob", &["2 Left"]);
        assert_live_invariant(&state);
        let third = hit(&mut state, "carol", &["3 Right"]);
        assert_live_invariant(&state);
        assert_eq!(state.live_count(Team::T2), 3);
        assert_eq!(state.live_count(Team::T1), 5);

        state.force_advance(Team::T1, &catalog()).unwrap();
        assert_live_invariant(&state);
        assert!(state.cups(Team::T1).pending().is_empty());

        state
            .redo_shot(
                &second.record,
                ShotEdit {
                    outcome: ShotOutcome::Miss,
                    hit_labels: Vec::new(),
                    multiplier: 1,
                },
                &catalog(),
            )
            .unwrap();
        assert_live_invariant(&state);
        assert_eq!(state.live_count(Team::T2), 4);

        state.undo_shot(&first.record, &catalog()).unwrap();
        assert_live_invariant(&state);
        state.undo_shot(&third.record, &catalog()).unwrap();
        assert_live_invariant(&state);

        for team in Team::ALL {
            assert_eq!(state.live_count(team), 6);
            assert!(state.cups(team).pending().is_empty());
            assert!(state.check_integrity(&catalog()).is_ok());
        }
        assert_eq!(state.status(), MatchStatus::Running);
    }

    #[test]
    fn force_advance_is_ignored_during_redemption() {
        let mut state = t2_redeeming_against(2);
        hit(&mut state, "carol", &["1 Center"]);
        let version = state.version();

        assert!(state.force_advance(Team::T1, &catalog()).unwrap().is_empty());
        assert!(state.force_advance(Team::T2, &catalog()).unwrap().is_empty());
        assert_eq!(state.version(), version);
        assert_eq!(state.cups(Team::T1).pending().len(), 1);
    }

    #[test]
    fn recovering_both_sides_leaves_the_version_alone() {
        let state = new_match();
        let mut entity = MatchEntity::from(&state);
        entity.t1.cups.push("Mystery Cup".into());
        entity.t2.cups.push("Mystery Cup".into());
        let mut decoded = MatchState::try_from(entity).unwrap();

        decoded.recover(Team::T1, &catalog());
        decoded.recover(Team::T2, &catalog());
        assert!(decoded.check_integrity(&catalog()).is_ok());
        assert_eq!(decoded.version(), state.version());

        decoded.mark_repaired();
        assert_eq!(decoded.version(), state.version() + 1);
    }

    #[test]
    fn roster_updates_keep_the_cups_in_play() {
        let mut state = new_match();
        hit(&mut state, "alice", &["3 Left"]);
        let roster = Roster::new(vec!["alice".into()], vec!["erin".into(), "carol".into()]).unwrap();

        let event = state.update_roster(Some("Table 9".into()), roster).unwrap();
        assert_eq!(event, MatchEvent::RosterUpdated);
        assert_eq!(state.name(), "Table 9");
        assert_eq!(state.roster().team_of("erin"), Some(Team::T2));
        assert_eq!(state.roster().team_of("bob"), None);
        assert_eq!(state.live_count(Team::T2), 5);
        assert_eq!(state.version(), 2);

        let mut finished = t2_redeeming_against(1);
        miss(&mut finished, "carol");
        miss(&mut finished, "carol");
        let roster = finished.roster().clone();
        assert_eq!(
            finished.update_roster(None, roster),
            Err(MatchError::MatchFinished)
        );
    }
}
