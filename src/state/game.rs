//! Table-side vocabulary: teams, rosters, shot outcomes and the shot log record.

use std::{
    fmt,
    ops::{Index, IndexMut},
    time::SystemTime,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::ShotEntity,
    state::cups::CupFormat,
};

/// Players seated on each side of the table.
pub const SEATS_PER_TEAM: usize = 2;

/// Drink recorded when the shooter does not name one.
pub const DEFAULT_DRINK: &str = "Beer";

/// One side of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// First team, seated on the left of the score sheet.
    T1,
    /// Second team.
    T2,
}

impl Team {
    /// Both teams, in seating order.
    pub const ALL: [Team; 2] = [Team::T1, Team::T2];

    /// The team across the table.
    pub fn other(self) -> Team {
        match self {
            Team::T1 => Team::T2,
            Team::T2 => Team::T1,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::T1 => f.write_str("t1"),
            Team::T2 => f.write_str("t2"),
        }
    }
}

/// One value per team, indexable by [`Team`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeamPair<T> {
    /// Value of team 1.
    pub t1: T,
    /// Value of team 2.
    pub t2: T,
}

impl<T> TeamPair<T> {
    /// Pair from both values, team 1 first.
    pub fn new(t1: T, t2: T) -> Self {
        Self { t1, t2 }
    }
}

impl<T: Clone> TeamPair<T> {
    /// Same value on both sides.
    pub fn splat(value: T) -> Self {
        Self {
            t1: value.clone(),
            t2: value,
        }
    }
}

impl<T> Index<Team> for TeamPair<T> {
    type Output = T;

    fn index(&self, team: Team) -> &T {
        match team {
            Team::T1 => &self.t1,
            Team::T2 => &self.t2,
        }
    }
}

impl<T> IndexMut<Team> for TeamPair<T> {
    fn index_mut(&mut self, team: Team) -> &mut T {
        match team {
            Team::T1 => &mut self.t1,
            Team::T2 => &mut self.t2,
        }
    }
}

/// Validation failures raised while seating players.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    /// Same name in two seats.
    #[error("player `{0}` appears more than once in the match")]
    DuplicatePlayer(String),
    /// Player already seated in another unfinished match.
    #[error("player `{player}` is already playing match {match_id}")]
    PlayerBusy {
        /// Busy player.
        player: String,
        /// Match the player sits in.
        match_id: Uuid,
    },
    /// A team without any player.
    #[error("team {0} needs at least one player")]
    EmptyTeam(Team),
    /// More players than seats.
    #[error("team {0} has more than two players")]
    TooManyPlayers(Team),
    /// Name missing from the player registry.
    #[error("player `{0}` is not registered")]
    UnknownPlayer(String),
}

/// Seat assignment of a match. A seat may stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    seats: TeamPair<[Option<String>; SEATS_PER_TEAM]>,
}

impl Roster {
    /// Seat the given players, rejecting duplicates and empty teams.
    ///
    /// Names are trimmed; blank names leave the seat empty.
    pub fn new(t1: Vec<String>, t2: Vec<String>) -> Result<Self, RosterError> {
        let mut roster = Roster::default();
        for (team, players) in [(Team::T1, t1), (Team::T2, t2)] {
            let names: Vec<String> = players
                .into_iter()
                .map(|name| name.trim().to_owned())
                .filter(|name| !name.is_empty())
                .collect();
            if names.is_empty() {
                return Err(RosterError::EmptyTeam(team));
            }
            if names.len() > SEATS_PER_TEAM {
                return Err(RosterError::TooManyPlayers(team));
            }
            for (seat, name) in names.into_iter().enumerate() {
                if roster.team_of(&name).is_some() {
                    return Err(RosterError::DuplicatePlayer(name));
                }
                roster.seats[team][seat] = Some(name);
            }
        }
        Ok(roster)
    }

    /// Rebuild a roster from persisted seats without re-validating it.
    pub fn from_seats(t1: &[Option<String>], t2: &[Option<String>]) -> Self {
        fn fill(source: &[Option<String>]) -> [Option<String>; SEATS_PER_TEAM] {
            let mut seats: [Option<String>; SEATS_PER_TEAM] = Default::default();
            for (slot, value) in seats.iter_mut().zip(source) {
                *slot = value.clone();
            }
            seats
        }
        Self {
            seats: TeamPair::new(fill(t1), fill(t2)),
        }
    }

    /// Raw seats of a team, empty slots included.
    pub fn seats(&self, team: Team) -> &[Option<String>; SEATS_PER_TEAM] {
        &self.seats[team]
    }

    /// Seated players of a team.
    pub fn players(&self, team: Team) -> impl Iterator<Item = &str> {
        self.seats[team].iter().flatten().map(String::as_str)
    }

    /// Every seated player, T1 first.
    pub fn all_players(&self) -> impl Iterator<Item = &str> {
        self.players(Team::T1).chain(self.players(Team::T2))
    }

    /// Team and seat index of a player.
    pub fn seat_of(&self, player: &str) -> Option<(Team, usize)> {
        Team::ALL.into_iter().find_map(|team| {
            self.seats[team]
                .iter()
                .position(|seat| seat.as_deref() == Some(player))
                .map(|seat| (team, seat))
        })
    }

    /// Team a player is seated on.
    pub fn team_of(&self, player: &str) -> Option<Team> {
        self.seat_of(player).map(|(team, _)| team)
    }

    /// The other player of the same team, if the seat is taken.
    pub fn teammate(&self, player: &str) -> Option<&str> {
        let (team, seat) = self.seat_of(player)?;
        self.seats[team]
            .iter()
            .enumerate()
            .find(|(index, _)| *index != seat)
            .and_then(|(_, name)| name.as_deref())
    }
}

/// What happened to a thrown ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShotOutcome {
    /// Nothing touched.
    Miss,
    /// Touched a rim without dropping in.
    Rim,
    /// At least one cup sunk.
    Hit,
}

/// Free-form context recorded with a shot for statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotMetadata {
    /// Capitalised drink name.
    pub drink: String,
    /// Lowercase stance, `left` or `right` unless the shooter said otherwise.
    pub stance: String,
}

impl ShotMetadata {
    /// Normalise user supplied metadata, defaulting the stance from the seat.
    pub fn resolve(drink: Option<&str>, stance: Option<&str>, seat: usize) -> Self {
        Self {
            drink: normalize_drink(drink),
            stance: stance
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_lowercase)
                .unwrap_or_else(|| default_stance(seat).to_owned()),
        }
    }
}

/// Trimmed drink name with a capital first letter, [`DEFAULT_DRINK`] when blank.
pub fn normalize_drink(drink: Option<&str>) -> String {
    let trimmed = drink.map(str::trim).unwrap_or_default();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => DEFAULT_DRINK.to_owned(),
    }
}

/// First seat stands left of the table, second seat right.
pub fn default_stance(seat: usize) -> &'static str {
    if seat == 0 { "left" } else { "right" }
}

/// Human readable tier for a hit multiplier.
pub fn multiplier_tier(multiplier: u8) -> &'static str {
    match multiplier {
        0 | 1 => "single",
        2 => "double",
        3 => "triple",
        4 => "quadruple",
        5 => "quintuple",
        _ => "sextuple",
    }
}

/// Immutable log entry describing one shot and the context it was thrown in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotRecord {
    /// Stable identifier.
    pub id: Uuid,
    /// Match the shot belongs to.
    pub match_id: Uuid,
    /// Match round the shot was thrown in.
    pub round: u32,
    /// Shooter.
    pub player: String,
    /// Shooter's team at the time of the throw.
    pub team: Team,
    pub outcome: ShotOutcome,
    /// Cups the shot was worth; at least 1 even for misses.
    pub multiplier: u8,
    /// Cups the shooter picked, truncated to the multiplier.
    pub hit_labels: Vec<String>,
    /// Entries pushed onto the opponent's pending list, placeholders included.
    pub damage: Vec<String>,
    /// Layout the shooter was aiming at.
    pub format: CupFormat,
    /// Shooter's live count right after the shot.
    pub own_cups: i32,
    /// Opponent's live count right after the shot.
    pub opponent_cups: i32,
    /// Thrown by a redeeming team.
    pub redemption_shot: bool,
    /// Thrown during overtime.
    pub overtime: bool,
    /// Generation of the opponent's cups the damage landed on.
    pub target_generation: u32,
    /// Commit serial of the opponent's cups when the shot was thrown.
    pub target_commit_serial: u32,
    /// Redemption window the shot belongs to, meaningful when `redemption_shot` is set.
    pub redemption_serial: u32,
    /// Free text, empty when none was given.
    pub note: String,
    pub metadata: ShotMetadata,
    /// When the shot was thrown.
    pub timestamp: SystemTime,
}

/// A stored record carries a format key this build does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record references unknown cup format `{0}`")]
pub struct UnknownFormat(pub String);

impl TryFrom<ShotEntity> for ShotRecord {
    type Error = UnknownFormat;

    fn try_from(value: ShotEntity) -> Result<Self, Self::Error> {
        let format = CupFormat::from_key(&value.format).ok_or(UnknownFormat(value.format))?;
        Ok(Self {
            id: value.id,
            match_id: value.match_id,
            round: value.round,
            player: value.player,
            team: value.team,
            outcome: value.outcome,
            multiplier: value.multiplier,
            hit_labels: value.hit_labels,
            damage: value.damage,
            format,
            own_cups: value.own_cups,
            opponent_cups: value.opponent_cups,
            redemption_shot: value.redemption_shot,
            overtime: value.overtime,
            target_generation: value.target_generation,
            target_commit_serial: value.target_commit_serial,
            redemption_serial: value.redemption_serial,
            note: value.note,
            metadata: ShotMetadata {
                drink: value.drink,
                stance: value.stance,
            },
            timestamp: value.timestamp,
        })
    }
}

impl From<ShotRecord> for ShotEntity {
    fn from(value: ShotRecord) -> Self {
        Self {
            id: value.id,
            match_id: value.match_id,
            round: value.round,
            player: value.player,
            team: value.team,
            outcome: value.outcome,
            multiplier: value.multiplier,
            hit_labels: value.hit_labels,
            damage: value.damage,
            format: value.format.key().to_owned(),
            own_cups: value.own_cups,
            opponent_cups: value.opponent_cups,
            redemption_shot: value.redemption_shot,
            overtime: value.overtime,
            target_generation: value.target_generation,
            target_commit_serial: value.target_commit_serial,
            redemption_serial: value.redemption_serial,
            note: value.note,
            drink: value.metadata.drink,
            stance: value.metadata.stance,
            timestamp: value.timestamp,
        }
    }
}
