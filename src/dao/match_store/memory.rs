use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    match_store::MatchStore,
    models::{MatchEntity, PlayerEntity, ShotEntity},
    storage::{StorageError, StorageResult},
};

/// Process-local store backed by concurrent maps. Data does not survive a restart.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    matches: DashMap<Uuid, MatchEntity>,
    shots: DashMap<Uuid, ShotEntity>,
    players: DashMap<String, PlayerEntity>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn save_match_sync(&self, entity: MatchEntity) -> StorageResult<()> {
        let id = entity.id;
        let incoming = entity.version;
        match self.inner.matches.entry(id) {
            Entry::Occupied(mut slot) => {
                let found = slot.get().version;
                if found + 1 != incoming {
                    return Err(StorageError::Conflict {
                        id,
                        expected: incoming.saturating_sub(1),
                        found,
                    });
                }
                slot.insert(entity);
            }
            Entry::Vacant(slot) => {
                slot.insert(entity);
            }
        }
        debug!(match_id = %id, version = incoming, "match stored in memory");
        Ok(())
    }

    fn list_shots_sync(&self, match_id: Uuid, player: Option<String>) -> Vec<ShotEntity> {
        let mut shots: Vec<ShotEntity> = self
            .inner
            .shots
            .iter()
            .filter(|entry| entry.match_id == match_id)
            .filter(|entry| player.as_deref().is_none_or(|p| entry.player == p))
            .map(|entry| entry.value().clone())
            .collect();
        shots.sort_by_key(|shot| shot.timestamp);
        shots
    }

    fn save_player_sync(&self, player: PlayerEntity) -> bool {
        match self.inner.players.entry(player.name.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(player);
                true
            }
        }
    }
}

impl MatchStore for MemoryMatchStore {
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_match_sync(entity) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.matches.get(&id).map(|m| m.value().clone())) })
    }

    fn list_matches(
        &self,
        active_only: bool,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut matches: Vec<MatchEntity> = store
                .inner
                .matches
                .iter()
                .filter(|entry| !active_only || entry.status != "finished")
                .map(|entry| entry.value().clone())
                .collect();
            matches.sort_by_key(|m| std::cmp::Reverse(m.start_time));
            Ok(matches)
        })
    }

    fn append_shot(&self, shot: ShotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.shots.insert(shot.id, shot);
            Ok(())
        })
    }

    fn find_shot(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ShotEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.shots.get(&id).map(|s| s.value().clone())) })
    }

    fn update_shot(&self, shot: ShotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.shots.insert(shot.id, shot);
            Ok(())
        })
    }

    fn delete_shot(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.shots.remove(&id).is_some()) })
    }

    fn list_shots(
        &self,
        match_id: Uuid,
        player: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<ShotEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.list_shots_sync(match_id, player)) })
    }

    fn latest_shot_by(
        &self,
        player: String,
    ) -> BoxFuture<'static, StorageResult<Option<ShotEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .shots
                .iter()
                .filter(|entry| entry.player == player)
                .max_by_key(|entry| entry.timestamp)
                .map(|entry| entry.value().clone()))
        })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.save_player_sync(player)) })
    }

    fn find_player(
        &self,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.players.get(&name).map(|p| p.value().clone())) })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut players: Vec<PlayerEntity> = store
                .inner
                .players
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            players.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(players)
        })
    }

    fn delete_player(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.players.remove(&name).is_some()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
