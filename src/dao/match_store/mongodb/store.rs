use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoMatchDocument, MongoPlayerDocument, MongoShotDocument, doc_id, version_as_bson},
};
use crate::dao::{
    match_store::MatchStore,
    models::{MatchEntity, PlayerEntity, ShotEntity},
    storage::StorageResult,
};

const MATCH_COLLECTION_NAME: &str = "matches";
const SHOT_COLLECTION_NAME: &str = "shots";
const PLAYER_COLLECTION_NAME: &str = "players";
const FINISHED_STATUS: &str = "finished";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB-backed [`MatchStore`] keeping matches, shots and players in their own collections.
#[derive(Clone)]
pub struct MongoMatchStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoMatchStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let status_index = IndexModel::builder()
            .keys(doc! {"status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("match_status_idx".to_owned()))
                    .build(),
            )
            .build();
        self.matches()
            .await
            .create_index(status_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION_NAME,
                index: "status",
                source,
            })?;

        let player_index = IndexModel::builder()
            .keys(doc! {"match_id": 1, "player": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("shot_match_player_idx".to_owned()))
                    .build(),
            )
            .build();
        self.shots()
            .await
            .create_index(player_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SHOT_COLLECTION_NAME,
                index: "match_id,player",
                source,
            })?;

        let latest_index = IndexModel::builder()
            .keys(doc! {"player": 1, "timestamp": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("shot_player_time_idx".to_owned()))
                    .build(),
            )
            .build();
        self.shots()
            .await
            .create_index(latest_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SHOT_COLLECTION_NAME,
                index: "player,timestamp",
                source,
            })?;

        Ok(())
    }

    async fn matches(&self) -> Collection<MongoMatchDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoMatchDocument>(MATCH_COLLECTION_NAME)
    }

    async fn shots(&self) -> Collection<MongoShotDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoShotDocument>(SHOT_COLLECTION_NAME)
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    /// Replace the stored match only if it still carries the previous version.
    async fn save_match(&self, entity: MatchEntity) -> MongoResult<()> {
        let id = entity.id;
        let incoming = entity.version;
        let document = MongoMatchDocument::from(entity);
        let collection = self.matches().await;

        if incoming > 0 {
            let mut filter = doc_id(id);
            filter.insert("version", version_as_bson(incoming - 1));
            let result = collection
                .replace_one(filter, &document)
                .await
                .map_err(|source| MongoDaoError::SaveMatch { id, source })?;
            if result.matched_count > 0 {
                debug!(match_id = %id, version = incoming, "match stored");
                return Ok(());
            }
        }

        let stored = collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?
            .map(|existing| u64::try_from(existing.version).unwrap_or_default());
        if let Some(found) = stored {
            return Err(MongoDaoError::VersionConflict {
                id,
                expected: incoming.saturating_sub(1),
                found,
            });
        }

        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveMatch { id, source })?;
        debug!(match_id = %id, version = incoming, "match inserted");
        Ok(())
    }

    async fn find_match(&self, id: Uuid) -> MongoResult<Option<MatchEntity>> {
        let collection = self.matches().await;
        collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadMatch { id, source })?
            .map(MatchEntity::try_from)
            .transpose()
    }

    async fn list_matches(&self, active_only: bool) -> MongoResult<Vec<MatchEntity>> {
        let filter = if active_only {
            doc! {"status": {"$ne": FINISHED_STATUS}}
        } else {
            doc! {}
        };
        let collection = self.matches().await;

        let documents: Vec<MongoMatchDocument> = collection
            .find(filter)
            .sort(doc! {"start_time": -1})
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListMatches { source })?;

        documents.into_iter().map(MatchEntity::try_from).collect()
    }

    async fn save_shot(&self, shot: ShotEntity) -> MongoResult<()> {
        let id = shot.id;
        let document = MongoShotDocument::from(shot);
        let collection = self.shots().await;
        collection
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveShot { id, source })?;
        Ok(())
    }

    async fn find_shot(&self, id: Uuid) -> MongoResult<Option<ShotEntity>> {
        let collection = self.shots().await;
        collection
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadShot { id, source })?
            .map(ShotEntity::try_from)
            .transpose()
    }

    async fn delete_shot(&self, id: Uuid) -> MongoResult<bool> {
        let collection = self.shots().await;
        let result = collection
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteShot { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_shots(
        &self,
        match_id: Uuid,
        player: Option<String>,
    ) -> MongoResult<Vec<ShotEntity>> {
        let mut filter = doc! {"match_id": match_id.to_string()};
        if let Some(player) = player {
            filter.insert("player", player);
        }
        let collection = self.shots().await;

        let documents: Vec<MongoShotDocument> = collection
            .find(filter)
            .sort(doc! {"timestamp": 1})
            .await
            .map_err(|source| MongoDaoError::ListShots { match_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListShots { match_id, source })?;

        documents.into_iter().map(ShotEntity::try_from).collect()
    }

    async fn latest_shot_by(&self, player: String) -> MongoResult<Option<ShotEntity>> {
        let collection = self.shots().await;
        collection
            .find_one(doc! {"player": &player})
            .sort(doc! {"timestamp": -1})
            .await
            .map_err(|source| MongoDaoError::LatestShot { player, source })?
            .map(ShotEntity::try_from)
            .transpose()
    }

    /// Insert a player, reporting a taken name as `false` through the unique `_id`.
    async fn save_player(&self, player: PlayerEntity) -> MongoResult<bool> {
        let name = player.name.clone();
        let collection = self.players().await;
        match collection.insert_one(MongoPlayerDocument::from(player)).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::SavePlayer { name, source }),
        }
    }

    async fn find_player(&self, name: String) -> MongoResult<Option<PlayerEntity>> {
        let collection = self.players().await;
        let document = collection
            .find_one(doc! {"_id": &name})
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { name, source })?;
        Ok(document.map(PlayerEntity::from))
    }

    async fn list_players(&self) -> MongoResult<Vec<PlayerEntity>> {
        let collection = self.players().await;
        let documents: Vec<MongoPlayerDocument> = collection
            .find(doc! {})
            .sort(doc! {"_id": 1})
            .await
            .map_err(|source| MongoDaoError::ListPlayers { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPlayers { source })?;
        Ok(documents.into_iter().map(PlayerEntity::from).collect())
    }

    async fn delete_player(&self, name: String) -> MongoResult<bool> {
        let collection = self.players().await;
        let result = collection
            .delete_one(doc! {"_id": &name})
            .await
            .map_err(|source| MongoDaoError::DeletePlayer { name, source })?;
        Ok(result.deleted_count > 0)
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

impl MatchStore for MongoMatchStore {
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_match(entity).await.map_err(Into::into) })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_match(id).await.map_err(Into::into) })
    }

    fn list_matches(
        &self,
        active_only: bool,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches(active_only).await.map_err(Into::into) })
    }

    fn append_shot(&self, shot: ShotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_shot(shot).await.map_err(Into::into) })
    }

    fn find_shot(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ShotEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_shot(id).await.map_err(Into::into) })
    }

    fn update_shot(&self, shot: ShotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_shot(shot).await.map_err(Into::into) })
    }

    fn delete_shot(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_shot(id).await.map_err(Into::into) })
    }

    fn list_shots(
        &self,
        match_id: Uuid,
        player: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<ShotEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_shots(match_id, player).await.map_err(Into::into) })
    }

    fn latest_shot_by(
        &self,
        player: String,
    ) -> BoxFuture<'static, StorageResult<Option<ShotEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_shot_by(player).await.map_err(Into::into) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.save_player(player).await.map_err(Into::into) })
    }

    fn find_player(
        &self,
        name: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(name).await.map_err(Into::into) })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_players().await.map_err(Into::into) })
    }

    fn delete_player(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_player(name).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
