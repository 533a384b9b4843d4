mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoMatchStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::VersionConflict {
                id,
                expected,
                found,
            } => StorageError::Conflict {
                id,
                expected,
                found,
            },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
