use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save match `{id}`")]
    SaveMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("match `{id}` was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict { id: Uuid, expected: u64, found: u64 },
    #[error("failed to load match `{id}`")]
    LoadMatch {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list matches")]
    ListMatches {
        #[source]
        source: MongoError,
    },
    #[error("failed to save shot `{id}`")]
    SaveShot {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load shot `{id}`")]
    LoadShot {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete shot `{id}`")]
    DeleteShot {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list shots of match `{match_id}`")]
    ListShots {
        match_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to find the latest shot of `{player}`")]
    LatestShot {
        player: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save player `{name}`")]
    SavePlayer {
        name: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load player `{name}`")]
    LoadPlayer {
        name: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to list players")]
    ListPlayers {
        #[source]
        source: MongoError,
    },
    #[error("failed to delete player `{name}`")]
    DeletePlayer {
        name: String,
        #[source]
        source: MongoError,
    },
    #[error("stored document `{id}` has a malformed identifier")]
    MalformedId {
        id: String,
        #[source]
        source: uuid::Error,
    },
}
