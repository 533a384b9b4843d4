//! BSON documents for the `matches`, `shots` and `players` collections.
//!
//! Identifiers are stored as hyphenated strings so filters and documents always agree.

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{MatchEntity, PlayerEntity, ShotEntity, TeamSideEntity},
    state::game::{ShotOutcome, Team},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    round: u32,
    pub version: i64,
    status: String,
    overtime: bool,
    t1: TeamSideEntity,
    t2: TeamSideEntity,
    redemption_shots_left: i32,
    redemption_hits: i32,
    redemption_serial: u32,
    winning_team: Option<Team>,
    turn_cursor: u32,
    start_time: DateTime,
    end_time: Option<DateTime>,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            round: value.round,
            version: version_as_bson(value.version),
            status: value.status,
            overtime: value.overtime,
            t1: value.t1,
            t2: value.t2,
            redemption_shots_left: value.redemption_shots_left,
            redemption_hits: value.redemption_hits,
            redemption_serial: value.redemption_serial,
            winning_team: value.winning_team,
            turn_cursor: value.turn_cursor,
            start_time: DateTime::from_system_time(value.start_time),
            end_time: value.end_time.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<MongoMatchDocument> for MatchEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoMatchDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(&value.id)?,
            name: value.name,
            round: value.round,
            version: u64::try_from(value.version).unwrap_or_default(),
            status: value.status,
            overtime: value.overtime,
            t1: value.t1,
            t2: value.t2,
            redemption_shots_left: value.redemption_shots_left,
            redemption_hits: value.redemption_hits,
            redemption_serial: value.redemption_serial,
            winning_team: value.winning_team,
            turn_cursor: value.turn_cursor,
            start_time: value.start_time.to_system_time(),
            end_time: value.end_time.map(DateTime::to_system_time),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoShotDocument {
    #[serde(rename = "_id")]
    id: String,
    match_id: String,
    round: u32,
    player: String,
    team: Team,
    outcome: ShotOutcome,
    multiplier: u8,
    hit_labels: Vec<String>,
    damage: Vec<String>,
    format: String,
    own_cups: i32,
    opponent_cups: i32,
    redemption_shot: bool,
    overtime: bool,
    target_generation: u32,
    target_commit_serial: u32,
    redemption_serial: u32,
    #[serde(default)]
    note: String,
    drink: String,
    stance: String,
    timestamp: DateTime,
}

impl From<ShotEntity> for MongoShotDocument {
    fn from(value: ShotEntity) -> Self {
        Self {
            id: value.id.to_string(),
            match_id: value.match_id.to_string(),
            round: value.round,
            player: value.player,
            team: value.team,
            outcome: value.outcome,
            multiplier: value.multiplier,
            hit_labels: value.hit_labels,
            damage: value.damage,
            format: value.format,
            own_cups: value.own_cups,
            opponent_cups: value.opponent_cups,
            redemption_shot: value.redemption_shot,
            overtime: value.overtime,
            target_generation: value.target_generation,
            target_commit_serial: value.target_commit_serial,
            redemption_serial: value.redemption_serial,
            note: value.note,
            drink: value.drink,
            stance: value.stance,
            timestamp: DateTime::from_system_time(value.timestamp),
        }
    }
}

impl TryFrom<MongoShotDocument> for ShotEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoShotDocument) -> MongoResult<Self> {
        Ok(Self {
            id: parse_id(&value.id)?,
            match_id: parse_id(&value.match_id)?,
            round: value.round,
            player: value.player,
            team: value.team,
            outcome: value.outcome,
            multiplier: value.multiplier,
            hit_labels: value.hit_labels,
            damage: value.damage,
            format: value.format,
            own_cups: value.own_cups,
            opponent_cups: value.opponent_cups,
            redemption_shot: value.redemption_shot,
            overtime: value.overtime,
            target_generation: value.target_generation,
            target_commit_serial: value.target_commit_serial,
            redemption_serial: value.redemption_serial,
            note: value.note,
            drink: value.drink,
            stance: value.stance,
            timestamp: value.timestamp.to_system_time(),
        })
    }
}

/// Players are keyed by their name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    name: String,
    registered_at: DateTime,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            name: value.name,
            registered_at: DateTime::from_system_time(value.registered_at),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            name: value.name,
            registered_at: value.registered_at.to_system_time(),
        }
    }
}

pub fn version_as_bson(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn parse_id(raw: &str) -> MongoResult<Uuid> {
    Uuid::parse_str(raw).map_err(|source| MongoDaoError::MalformedId {
        id: raw.to_owned(),
        source,
    })
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}
