pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{MatchEntity, PlayerEntity, ShotEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for matches, their shot logs and the player registry.
///
/// `save_match` is optimistic: an entity whose `version` is not exactly one above the stored
/// version is rejected with [`StorageError::Conflict`](crate::dao::storage::StorageError).
pub trait MatchStore: Send + Sync {
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    fn list_matches(&self, active_only: bool)
    -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;
    fn append_shot(&self, shot: ShotEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_shot(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ShotEntity>>>;
    fn update_shot(&self, shot: ShotEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_shot(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Shots of a match in chronological order, optionally restricted to one player.
    fn list_shots(
        &self,
        match_id: Uuid,
        player: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<ShotEntity>>>;
    /// Most recent shot thrown by `player` in any match.
    fn latest_shot_by(&self, player: String)
    -> BoxFuture<'static, StorageResult<Option<ShotEntity>>>;
    /// Register a player. Returns `false` when the name is already taken.
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<bool>>;
    fn find_player(&self, name: String) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Registered players sorted by name.
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    fn delete_player(&self, name: String) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
