use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::MatchStore,
        models::{MatchEntity, ShotEntity},
        storage::{StorageError, StorageResult},
    },
    dto::{
        matches::{
            CreateMatchRequest, FormatsResponse, LiveViewResponse, MatchListResponse,
            MatchSummary, PlayerMatchResponse, UpdateMatchRequest,
        },
        shots::{
            EditShotRequest, ShotDeletedResponse, ShotListResponse, ShotRequest, ShotResponse,
            ShotSummary,
        },
    },
    error::ServiceError,
    services::{
        player_service::ensure_registered,
        sse_events::{broadcast_match_changed, broadcast_match_events},
    },
    state::{
        SharedState,
        cups::CupFormat,
        game::{Roster, ShotRecord, Team},
        state_machine::{MatchError, MatchEvent, MatchState, ShotInput},
    },
};

/// Open a new match and seat its players.
pub async fn create_match(
    state: &SharedState,
    request: CreateMatchRequest,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let CreateMatchRequest { name, t1, t2 } = request;

    let roster = Roster::new(t1, t2)?;
    ensure_registered(&store, &roster).await?;
    let id = Uuid::new_v4();
    state.players().try_seat(&roster, id)?;

    let saved = async {
        let name = match name.map(|name| name.trim().to_owned()) {
            Some(name) if !name.is_empty() => name,
            _ => {
                let existing = store.list_matches(false).await?.len();
                format!("Table {}", existing + 1)
            }
        };
        let match_state = MatchState::new(id, name, roster.clone(), state.formats());
        persist_match(&store, &match_state).await?;
        Ok::<_, ServiceError>(match_state)
    }
    .await;
    let match_state = saved.inspect_err(|_| state.players().release(&roster, id))?;

    info!(match_id = %id, name = %match_state.name(), "match created");
    broadcast_match_changed(state, id, match_state.version());
    Ok((&match_state).into())
}

/// List stored matches, newest first.
pub async fn list_matches(
    state: &SharedState,
    active_only: bool,
) -> Result<MatchListResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let entities = store.list_matches(active_only).await?;

    let mut matches = Vec::with_capacity(entities.len());
    for entity in entities {
        let id = entity.id;
        match MatchState::try_from(entity) {
            Ok(match_state) => matches.push(MatchSummary::from(&match_state)),
            Err(err) => warn!(match_id = %id, error = %err, "skipping undecodable match"),
        }
    }
    Ok(MatchListResponse { matches })
}

pub async fn get_match(state: &SharedState, id: Uuid) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let (match_state, _) = load_match(state, &store, id).await?;
    Ok((&match_state).into())
}

/// Start another round with the same roster.
pub async fn rematch(state: &SharedState, id: Uuid) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let _gate = state.lock_match(id).await;
    let mut match_state = load_for_update(state, &store, id).await?;

    let was_finished = match_state.is_finished();
    state.players().try_seat(match_state.roster(), id)?;
    match_state.rematch(state.formats());

    if let Err(err) = persist_match(&store, &match_state).await {
        if was_finished {
            state.players().release(match_state.roster(), id);
        }
        return Err(err);
    }
    publish(state, &match_state, &[]);
    Ok((&match_state).into())
}

/// Rename a match or reseat its teams. Cups, history and phase are kept.
pub async fn update_match(
    state: &SharedState,
    id: Uuid,
    request: UpdateMatchRequest,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let UpdateMatchRequest { name, t1, t2 } = request;
    let roster = Roster::new(t1, t2)?;
    ensure_registered(&store, &roster).await?;

    let _gate = state.lock_match(id).await;
    let mut match_state = load_for_update(state, &store, id).await?;
    let previous = match_state.roster().clone();
    let name = name
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty());
    let event = match_state
        .update_roster(name, roster)
        .map_err(|err| rejected(id, "roster update", err))?;

    let current = match_state.roster();
    state.players().try_seat(current, id)?;
    if let Err(err) = persist_match(&store, &match_state).await {
        let joined = current
            .all_players()
            .filter(|player| previous.team_of(player).is_none());
        state.players().release_players(joined, id);
        return Err(err);
    }
    let left = previous
        .all_players()
        .filter(|player| current.team_of(player).is_none());
    state.players().release_players(left, id);

    publish(state, &match_state, &[event]);
    Ok((&match_state).into())
}

/// Record a shot and run the match transitions.
pub async fn apply_shot(
    state: &SharedState,
    match_id: Uuid,
    request: ShotRequest,
) -> Result<ShotResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let _gate = state.lock_match(match_id).await;
    let mut match_state = load_for_update(state, &store, match_id).await?;

    let mut input = ShotInput::from(request);
    if input.drink.as_deref().is_none_or(|drink| drink.trim().is_empty()) {
        input.drink = store
            .latest_shot_by(input.player.clone())
            .await?
            .map(|shot| shot.drink);
    }
    let applied = match_state
        .apply_shot(input, state.turn_policy(), state.formats())
        .map_err(|err| rejected(match_id, "shot", err))?;

    let shot_id = applied.record.id;
    store
        .append_shot(ShotEntity::from(applied.record.clone()))
        .await?;
    persist_or_revert(&store, &match_state, store.delete_shot(shot_id)).await?;
    debug!(
        match_id = %match_id,
        player = %applied.record.player,
        outcome = ?applied.record.outcome,
        version = match_state.version(),
        "shot recorded"
    );

    publish(state, &match_state, &applied.events);
    Ok(ShotResponse {
        shot: (&applied.record).into(),
        match_state: (&match_state).into(),
    })
}

/// Shots of a match, oldest first.
pub async fn list_shots(
    state: &SharedState,
    match_id: Uuid,
    player: Option<String>,
) -> Result<ShotListResponse, ServiceError> {
    let store = state.require_match_store().await?;
    if store.find_match(match_id).await?.is_none() {
        return Err(match_not_found(match_id));
    }
    let player = player
        .map(|player| player.trim().to_owned())
        .filter(|player| !player.is_empty());

    let mut shots = Vec::new();
    for entity in store.list_shots(match_id, player).await? {
        let id = entity.id;
        match ShotRecord::try_from(entity) {
            Ok(record) => shots.push(ShotSummary::from(&record)),
            Err(err) => warn!(shot_id = %id, error = %err, "skipping undecodable shot"),
        }
    }
    Ok(ShotListResponse { shots })
}

/// Commit the hits the player's team landed without waiting for the opponents to throw.
pub async fn force_advance(
    state: &SharedState,
    match_id: Uuid,
    player: &str,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let _gate = state.lock_match(match_id).await;
    let mut match_state = load_for_update(state, &store, match_id).await?;

    let team = seated_team(&match_state, player)?;
    let version = match_state.version();
    let events = match_state
        .force_advance(team.other(), state.formats())
        .map_err(|err| rejected(match_id, "advance", err))?;

    if match_state.version() != version {
        persist_match(&store, &match_state).await?;
        publish(state, &match_state, &events);
    }
    Ok((&match_state).into())
}

/// Switch the layout the player's team shoots at without throwing.
pub async fn change_format(
    state: &SharedState,
    match_id: Uuid,
    player: &str,
    format: CupFormat,
) -> Result<MatchSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let _gate = state.lock_match(match_id).await;
    let mut match_state = load_for_update(state, &store, match_id).await?;

    let team = seated_team(&match_state, player)?;
    let version = match_state.version();
    let events = match_state
        .change_format(team, format, state.formats())
        .map_err(|err| rejected(match_id, "format change", err))?;

    if match_state.version() == version {
        debug!(match_id = %match_id, team = %team, format = %format, "format request ignored");
    } else {
        persist_match(&store, &match_state).await?;
        publish(state, &match_state, &events);
    }
    Ok((&match_state).into())
}

/// Correct the outcome of a logged shot.
pub async fn edit_shot(
    state: &SharedState,
    shot_id: Uuid,
    request: EditShotRequest,
) -> Result<ShotResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let match_id = load_shot(&store, shot_id).await?.match_id;
    let _gate = state.lock_match(match_id).await;
    let record = load_shot(&store, shot_id).await?;
    let mut match_state = load_for_update(state, &store, match_id).await?;

    let version = match_state.version();
    let (mut updated, events) = match_state
        .redo_shot(&record, request.edit(), state.formats())
        .map_err(|err| rejected(match_id, "shot edit", err))?;
    if let Some(note) = request.note {
        updated.note = note;
    }

    store.update_shot(ShotEntity::from(updated.clone())).await?;
    if match_state.version() != version {
        let restore = store.update_shot(ShotEntity::from(record.clone()));
        persist_or_revert(&store, &match_state, restore).await?;
    }
    info!(match_id = %match_id, shot_id = %shot_id, outcome = ?updated.outcome, "shot corrected");

    publish(state, &match_state, &events);
    Ok(ShotResponse {
        shot: (&updated).into(),
        match_state: (&match_state).into(),
    })
}

/// Withdraw a logged shot.
pub async fn delete_shot(
    state: &SharedState,
    shot_id: Uuid,
) -> Result<ShotDeletedResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let match_id = load_shot(&store, shot_id).await?.match_id;
    let _gate = state.lock_match(match_id).await;
    let record = load_shot(&store, shot_id).await?;
    let mut match_state = load_for_update(state, &store, match_id).await?;

    let version = match_state.version();
    let events = match_state
        .undo_shot(&record, state.formats())
        .map_err(|err| rejected(match_id, "shot removal", err))?;

    if !store.delete_shot(shot_id).await? {
        return Err(shot_not_found(shot_id));
    }
    if match_state.version() != version {
        let restore = store.append_shot(ShotEntity::from(record.clone()));
        persist_or_revert(&store, &match_state, restore).await?;
    }
    info!(match_id = %match_id, shot_id = %shot_id, "shot withdrawn");

    publish(state, &match_state, &events);
    Ok(ShotDeletedResponse {
        id: shot_id,
        match_state: (&match_state).into(),
    })
}

/// Tracker view of a match from a seated player's side.
pub async fn live_view(
    state: &SharedState,
    match_id: Uuid,
    player: &str,
) -> Result<LiveViewResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let (match_state, _) = load_match(state, &store, match_id).await?;

    let player = player.trim();
    let team = match_state.roster().team_of(player).ok_or_else(|| {
        ServiceError::NotFound(format!("player `{player}` is not seated in match `{match_id}`"))
    })?;
    let expected = state.turn_policy().expected_shooter(&match_state);
    Ok(LiveViewResponse::build(&match_state, player, team, expected))
}

/// Unfinished match the player is seated in.
pub async fn player_match(
    state: &SharedState,
    player: &str,
) -> Result<PlayerMatchResponse, ServiceError> {
    state.require_match_store().await?;
    let player = player.trim();
    let match_id = state
        .players()
        .match_of(player)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player}` is not seated")))?;
    Ok(PlayerMatchResponse {
        player: player.to_owned(),
        match_id,
    })
}

pub fn formats(state: &SharedState) -> FormatsResponse {
    state.formats().into()
}

/// Reseat every player of the unfinished matches held by `store`.
///
/// Returns the number of matches that were indexed.
pub async fn rebuild_player_index(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
) -> Result<usize, StorageError> {
    let rosters: Vec<(Roster, Uuid)> = store
        .list_matches(true)
        .await?
        .into_iter()
        .filter_map(|entity| {
            let id = entity.id;
            match MatchState::try_from(entity) {
                Ok(match_state) => Some((match_state.roster().clone(), id)),
                Err(err) => {
                    warn!(match_id = %id, error = %err, "undecodable match left out of the player index");
                    None
                }
            }
        })
        .collect();

    state
        .players()
        .rebuild(rosters.iter().map(|(roster, id)| (roster, *id)));
    Ok(rosters.len())
}

/// Load a match, rebuilding any corrupted cup set in memory.
///
/// The version stays the stored one. Returns the recovery events alongside the match.
async fn load_match(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    id: Uuid,
) -> Result<(MatchState, Vec<MatchEvent>), ServiceError> {
    let entity = store
        .find_match(id)
        .await?
        .ok_or_else(|| match_not_found(id))?;
    let mut match_state = MatchState::try_from(entity).map_err(|err| {
        error!(match_id = %id, error = %err, "stored match could not be decoded");
        ServiceError::from(err)
    })?;

    let mut recovered = Vec::new();
    for _ in Team::ALL {
        match match_state.check_integrity(state.formats()) {
            Ok(()) => break,
            Err(MatchError::StateCorrupted { team, source }) => {
                error!(
                    match_id = %id,
                    team = %team,
                    error = %source,
                    "corrupted cup set; rebuilding from format target"
                );
                recovered.push(match_state.recover(team, state.formats()));
            }
            Err(err) => return Err(err.into()),
        }
    }
    match_state.check_integrity(state.formats())?;
    Ok((match_state, recovered))
}

/// Load a match for mutation. A recovered match is saved before anything else happens to it.
async fn load_for_update(
    state: &SharedState,
    store: &Arc<dyn MatchStore>,
    id: Uuid,
) -> Result<MatchState, ServiceError> {
    let (mut match_state, recovered) = load_match(state, store, id).await?;
    if !recovered.is_empty() {
        match_state.mark_repaired();
        persist_match(store, &match_state).await?;
        publish(state, &match_state, &recovered);
    }
    Ok(match_state)
}

async fn load_shot(store: &Arc<dyn MatchStore>, id: Uuid) -> Result<ShotRecord, ServiceError> {
    let entity = store
        .find_shot(id)
        .await?
        .ok_or_else(|| shot_not_found(id))?;
    ShotRecord::try_from(entity).map_err(|err| {
        error!(shot_id = %id, error = %err, "stored shot could not be decoded");
        ServiceError::Corrupted(err.to_string())
    })
}

async fn persist_match(
    store: &Arc<dyn MatchStore>,
    match_state: &MatchState,
) -> Result<(), ServiceError> {
    store.save_match(MatchEntity::from(match_state)).await?;
    Ok(())
}

/// Save the match, undoing the shot log write `revert` stands for when the save fails.
async fn persist_or_revert<T>(
    store: &Arc<dyn MatchStore>,
    match_state: &MatchState,
    revert: BoxFuture<'static, StorageResult<T>>,
) -> Result<(), ServiceError> {
    let Err(err) = persist_match(store, match_state).await else {
        return Ok(());
    };
    if let Err(revert_err) = revert.await {
        error!(
            match_id = %match_state.id(),
            error = %revert_err,
            "shot log out of step with its match; revert failed"
        );
    }
    Err(err)
}

/// Keep the player index in line with the match and notify subscribers.
fn publish(state: &SharedState, match_state: &MatchState, events: &[MatchEvent]) {
    let id = match_state.id();
    if match_state.is_finished() {
        state.players().release(match_state.roster(), id);
    } else {
        state.players().seat(match_state.roster(), id);
    }
    broadcast_match_changed(state, id, match_state.version());
    broadcast_match_events(state, id, events);
}

fn seated_team(match_state: &MatchState, player: &str) -> Result<Team, ServiceError> {
    let player = player.trim();
    match_state
        .roster()
        .team_of(player)
        .ok_or_else(|| MatchError::NotSeated(player.to_owned()).into())
}

fn rejected(match_id: Uuid, operation: &str, err: MatchError) -> ServiceError {
    match &err {
        MatchError::StateCorrupted { team, source } => error!(
            match_id = %match_id,
            team = %team,
            error = %source,
            "{operation} would corrupt the cup set; rejected"
        ),
        _ => debug!(match_id = %match_id, error = %err, "{operation} rejected"),
    }
    err.into()
}

fn match_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("match `{id}` not found"))
}

fn shot_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("shot `{id}` not found"))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::SystemTime,
    };

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{match_store::memory::MemoryMatchStore, models::PlayerEntity},
        dto::phase::VisibleMatchStatus,
        state::{AppState, cups::FormatCatalog, game::ShotOutcome, turn::TurnPolicy},
    };

    const REGISTERED: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];

    /// Memory store whose match saves can be switched off.
    #[derive(Clone, Default)]
    struct FailingSaves {
        inner: MemoryMatchStore,
        fail: Arc<AtomicBool>,
    }

    impl MatchStore for FailingSaves {
        fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
            if self.fail.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err(StorageError::unavailable(
                        "saves disabled".into(),
                        std::io::Error::other("offline"),
                    ))
                });
            }
            self.inner.save_match(entity)
        }
        fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
            self.inner.find_match(id)
        }
        fn list_matches(
            &self,
            active_only: bool,
        ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
            self.inner.list_matches(active_only)
        }
        fn append_shot(&self, shot: ShotEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.append_shot(shot)
        }
        fn find_shot(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ShotEntity>>> {
            self.inner.find_shot(id)
        }
        fn update_shot(&self, shot: ShotEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.update_shot(shot)
        }
        fn delete_shot(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_shot(id)
        }
        fn list_shots(
            &self,
            match_id: Uuid,
            player: Option<String>,
        ) -> BoxFuture<'static, StorageResult<Vec<ShotEntity>>> {
            self.inner.list_shots(match_id, player)
        }
        fn latest_shot_by(
            &self,
            player: String,
        ) -> BoxFuture<'static, StorageResult<Option<ShotEntity>>> {
            self.inner.latest_shot_by(player)
        }
        fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.save_player(player)
        }
        fn find_player(
            &self,
            name: String,
        ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
            self.inner.find_player(name)
        }
        fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
            self.inner.list_players()
        }
        fn delete_player(&self, name: String) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_player(name)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    const PYRAMID: [&str; 6] = [
        "3 Left", "3 Center", "3 Right", "2 Left", "2 Right", "1 Center",
    ];

    async fn install(state: &SharedState, store: Arc<dyn MatchStore>) {
        for name in REGISTERED {
            let player = PlayerEntity {
                name: name.into(),
                registered_at: SystemTime::now(),
            };
            assert!(store.save_player(player).await.unwrap());
        }
        state.set_match_store(store).await;
    }

    async fn setup_with(config: AppConfig) -> (SharedState, Arc<dyn MatchStore>) {
        let state = AppState::new(config);
        let store: Arc<dyn MatchStore> = Arc::new(MemoryMatchStore::new());
        install(&state, store.clone()).await;
        (state, store)
    }

    async fn setup_failing() -> (SharedState, Arc<AtomicBool>) {
        let state = AppState::new(AppConfig::default());
        let store = FailingSaves::default();
        let fail = store.fail.clone();
        install(&state, Arc::new(store)).await;
        (state, fail)
    }

    async fn setup() -> (SharedState, Arc<dyn MatchStore>) {
        setup_with(AppConfig::default()).await
    }

    fn create_request(t1: &[&str], t2: &[&str]) -> CreateMatchRequest {
        CreateMatchRequest {
            name: None,
            t1: t1.iter().map(|p| (*p).to_owned()).collect(),
            t2: t2.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    fn shot(player: &str, outcome: ShotOutcome, labels: &[&str]) -> ShotRequest {
        ShotRequest {
            player: player.into(),
            outcome,
            hit_labels: labels.iter().map(|l| (*l).to_owned()).collect(),
            multiplier: labels.len().max(1) as u8,
            format: None,
            note: None,
            drink: None,
            stance: None,
        }
    }

    async fn new_match(state: &SharedState) -> Uuid {
        create_match(state, create_request(&["alice", "bob"], &["carol"]))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn matches_get_default_table_names() {
        let (state, _) = setup().await;
        let first = create_match(&state, create_request(&["alice"], &["bob"]))
            .await
            .unwrap();
        let mut request = create_request(&["carol"], &["dave"]);
        request.name = Some("  ".into());
        let second = create_match(&state, request).await.unwrap();

        assert_eq!(first.name, "Table 1");
        assert_eq!(second.name, "Table 2");
        assert_eq!(first.version, 0);
        assert_eq!(
            player_match(&state, "dave").await.unwrap().match_id,
            second.id
        );
        assert_eq!(list_matches(&state, true).await.unwrap().matches.len(), 2);
    }

    #[tokio::test]
    async fn rosters_are_validated_on_creation() {
        let (state, _) = setup().await;
        let err = create_match(&state, create_request(&["alice"], &["alice"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        new_match(&state).await;
        let err = create_match(&state, create_request(&["carol"], &["erin"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err = create_match(&state, create_request(&["dave"], &["zed"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(matches!(
            player_match(&state, "dave").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn degraded_mode_rejects_calls() {
        let state = AppState::new(AppConfig::default());
        let err = create_match(&state, create_request(&["alice"], &["bob"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
        assert_eq!(formats(&state).formats.len(), 6);
    }

    #[tokio::test]
    async fn a_full_match_releases_its_players() {
        let (state, _) = setup().await;
        let id = new_match(&state).await;
        let mut receiver = state.sse().subscribe();

        for label in &PYRAMID[..5] {
            apply_shot(&state, id, shot("carol", ShotOutcome::Hit, &[label]))
                .await
                .unwrap();
        }
        for label in PYRAMID {
            apply_shot(&state, id, shot("alice", ShotOutcome::Hit, &[label]))
                .await
                .unwrap();
        }
        let view = live_view(&state, id, "carol").await.unwrap();
        assert_eq!(view.status, VisibleMatchStatus::Redemption);
        assert_eq!(view.redemption.as_ref().unwrap().shots_left, 2);

        apply_shot(&state, id, shot("carol", ShotOutcome::Miss, &[]))
            .await
            .unwrap();
        let response = apply_shot(&state, id, shot("carol", ShotOutcome::Miss, &[]))
            .await
            .unwrap();

        assert_eq!(response.match_state.status, VisibleMatchStatus::Finished);
        assert_eq!(response.match_state.winning_team, Some(Team::T1));
        assert!(response.shot.redemption_shot);
        assert!(matches!(
            player_match(&state, "alice").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(list_matches(&state, true).await.unwrap().matches.is_empty());

        let err = apply_shot(&state, id, shot("alice", ShotOutcome::Miss, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let mut names = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            names.extend(event.event);
        }
        assert!(names.contains(&"match.redemption_started".to_owned()));
        assert!(names.contains(&"match.finished".to_owned()));
    }

    #[tokio::test]
    async fn deleting_a_shot_restores_the_cups() {
        let (state, _) = setup().await;
        let id = new_match(&state).await;
        let response = apply_shot(&state, id, shot("alice", ShotOutcome::Hit, &["3 Left"]))
            .await
            .unwrap();
        assert_eq!(response.match_state.t2.live_count, 5);

        let deleted = delete_shot(&state, response.shot.id).await.unwrap();
        assert_eq!(deleted.match_state.t2.live_count, 6);
        assert!(deleted.match_state.t2.pending.is_empty());
        assert!(list_shots(&state, id, None).await.unwrap().shots.is_empty());

        let err = delete_shot(&state, response.shot.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn editing_a_shot_rewrites_history_and_cups() {
        let (state, _) = setup().await;
        let id = new_match(&state).await;
        let response = apply_shot(&state, id, shot("alice", ShotOutcome::Hit, &["3 Left"]))
            .await
            .unwrap();

        let edited = edit_shot(
            &state,
            response.shot.id,
            EditShotRequest {
                outcome: ShotOutcome::Miss,
                hit_labels: Vec::new(),
                multiplier: 1,
                note: Some("bounced out".into()),
            },
        )
        .await
        .unwrap();

        assert_eq!(edited.shot.outcome, ShotOutcome::Miss);
        assert_eq!(edited.shot.note.as_deref(), Some("bounced out"));
        assert_eq!(edited.match_state.t2.live_count, 6);

        let shots = list_shots(&state, id, Some("alice".into())).await.unwrap().shots;
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].outcome, ShotOutcome::Miss);
        assert!(list_shots(&state, id, Some("carol".into())).await.unwrap().shots.is_empty());
    }

    #[tokio::test]
    async fn advance_and_format_change_act_on_the_players_team() {
        let (state, _) = setup().await;
        let id = new_match(&state).await;
        apply_shot(&state, id, shot("alice", ShotOutcome::Hit, &["3 Left", "3 Right"]))
            .await
            .unwrap();

        let untouched = force_advance(&state, id, "carol").await.unwrap();
        assert_eq!(untouched.t2.pending.len(), 2);

        let summary = force_advance(&state, id, "alice").await.unwrap();
        assert!(summary.t2.pending.is_empty());
        assert_eq!(summary.t2.cups.len(), 4);
        assert_eq!(summary.version, untouched.version + 1);

        let summary = change_format(&state, id, "bob", CupFormat::Triangle)
            .await
            .unwrap();
        assert_eq!(summary.t1.target_format, CupFormat::Triangle);
        assert!(summary.t1.format_locked);
        assert_eq!(summary.t2.live_count, 3);

        let ignored = change_format(&state, id, "alice", CupFormat::Diamond)
            .await
            .unwrap();
        assert_eq!(ignored.version, summary.version);

        let err = force_advance(&state, id, "mallory").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn rematch_starts_a_new_round() {
        let (state, _) = setup().await;
        let id = new_match(&state).await;
        apply_shot(&state, id, shot("alice", ShotOutcome::Hit, &["3 Left"]))
            .await
            .unwrap();

        let summary = rematch(&state, id).await.unwrap();
        assert_eq!(summary.round, 2);
        assert_eq!(summary.t2.live_count, 6);
        assert_eq!(player_match(&state, "carol").await.unwrap().match_id, id);
    }

    #[tokio::test]
    async fn live_view_requires_a_seated_player() {
        let (state, _) = setup().await;
        let id = new_match(&state).await;
        let err = live_view(&state, id, "mallory").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = get_match(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn round_robin_rejects_out_of_turn_shots() {
        let config = AppConfig::new(FormatCatalog::default(), TurnPolicy::RoundRobin);
        let (state, _) = setup_with(config).await;
        let id = new_match(&state).await;

        let err = apply_shot(&state, id, shot("carol", ShotOutcome::Miss, &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        apply_shot(&state, id, shot("alice", ShotOutcome::Miss, &[]))
            .await
            .unwrap();
        let view = live_view(&state, id, "alice").await.unwrap();
        assert_eq!(view.expected_shooter.as_deref(), Some("carol"));
    }

    #[tokio::test]
    async fn corrupted_cups_are_rebuilt_before_the_next_shot() {
        let (state, store) = setup().await;
        let id = new_match(&state).await;

        let mut entity = store.find_match(id).await.unwrap().unwrap();
        entity.t2.cups.push("Mystery Cup".into());
        entity.version += 1;
        store.save_match(entity).await.unwrap();

        let response = apply_shot(&state, id, shot("alice", ShotOutcome::Hit, &["3 Left"]))
            .await
            .unwrap();
        assert_eq!(response.match_state.t2.live_count, 5);
        assert!(!response.match_state.t2.cups.contains(&"Mystery Cup".to_owned()));
    }

    #[tokio::test]
    async fn repairing_both_sides_takes_a_single_version() {
        let (state, store) = setup().await;
        let id = new_match(&state).await;

        let mut entity = store.find_match(id).await.unwrap().unwrap();
        entity.t1.cups.push("Ghost Cup".into());
        entity.t2.cups.push("Mystery Cup".into());
        entity.version += 1;
        store.save_match(entity).await.unwrap();

        let read = get_match(&state, id).await.unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.t1.live_count, 6);
        assert_eq!(store.find_match(id).await.unwrap().unwrap().version, 1);

        let response = apply_shot(&state, id, shot("alice", ShotOutcome::Hit, &["3 Left"]))
            .await
            .unwrap();
        assert_eq!(response.match_state.version, 3);
        assert_eq!(response.match_state.t2.live_count, 5);
        assert_eq!(store.find_match(id).await.unwrap().unwrap().version, 3);
    }

    #[tokio::test]
    async fn failed_match_saves_leave_the_shot_log_alone() {
        let (state, fail) = setup_failing().await;
        let id = new_match(&state).await;
        let kept = apply_shot(&state, id, shot("alice", ShotOutcome::Hit, &["3 Left"]))
            .await
            .unwrap();

        fail.store(true, Ordering::SeqCst);
        let err = apply_shot(&state, id, shot("bob", ShotOutcome::Hit, &["3 Right"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(delete_shot(&state, kept.shot.id).await.is_err());

        fail.store(false, Ordering::SeqCst);
        let shots = list_shots(&state, id, None).await.unwrap().shots;
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].id, kept.shot.id);
        assert_eq!(get_match(&state, id).await.unwrap().t2.live_count, 5);
    }

    #[tokio::test]
    async fn failed_creation_frees_the_seats() {
        let (state, fail) = setup_failing().await;
        fail.store(true, Ordering::SeqCst);
        let err = create_match(&state, create_request(&["alice"], &["bob"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(state.players().is_empty());

        fail.store(false, Ordering::SeqCst);
        create_match(&state, create_request(&["alice"], &["bob"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_creations_seat_a_player_once() {
        let (state, _) = setup().await;
        let (first, second) = tokio::join!(
            create_match(&state, create_request(&["alice"], &["bob"])),
            create_match(&state, create_request(&["alice"], &["carol"])),
        );
        assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
        assert_eq!(list_matches(&state, true).await.unwrap().matches.len(), 1);
    }

    #[tokio::test]
    async fn rosters_can_change_mid_match() {
        let (state, _) = setup().await;
        let id = new_match(&state).await;
        apply_shot(&state, id, shot("alice", ShotOutcome::Hit, &["3 Left"]))
            .await
            .unwrap();

        let request = UpdateMatchRequest {
            name: Some("Final".into()),
            t1: vec!["alice".into()],
            t2: vec!["carol".into(), "erin".into()],
        };
        let summary = update_match(&state, id, request).await.unwrap();
        assert_eq!(summary.name, "Final");
        assert_eq!(summary.t2.players, ["carol", "erin"]);
        assert_eq!(summary.t2.live_count, 5);
        assert_eq!(player_match(&state, "erin").await.unwrap().match_id, id);
        assert!(player_match(&state, "bob").await.is_err());

        let other = create_match(&state, create_request(&["bob"], &["dave"]))
            .await
            .unwrap();
        let request = UpdateMatchRequest {
            name: None,
            t1: vec!["alice".into(), "dave".into()],
            t2: vec!["carol".into()],
        };
        let err = update_match(&state, id, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(player_match(&state, "dave").await.unwrap().match_id, other.id);
        assert_eq!(player_match(&state, "erin").await.unwrap().match_id, id);
    }

    #[tokio::test]
    async fn drink_defaults_to_the_players_last_one() {
        let (state, _) = setup().await;
        let id = new_match(&state).await;
        let mut first = shot("alice", ShotOutcome::Miss, &[]);
        first.drink = Some("cider".into());
        apply_shot(&state, id, first).await.unwrap();

        let second = apply_shot(&state, id, shot("alice", ShotOutcome::Miss, &[]))
            .await
            .unwrap();
        assert_eq!(second.shot.drink, "Cider");

        let fresh = apply_shot(&state, id, shot("bob", ShotOutcome::Miss, &[]))
            .await
            .unwrap();
        assert_eq!(fresh.shot.drink, crate::state::game::DEFAULT_DRINK);
    }

    #[tokio::test]
    async fn player_index_is_rebuilt_from_unfinished_matches() {
        let (state, store) = setup().await;
        let id = new_match(&state).await;

        let fresh = AppState::new(AppConfig::default());
        let indexed = rebuild_player_index(&fresh, &store).await.unwrap();
        assert_eq!(indexed, 1);
        assert_eq!(fresh.players().match_of("bob"), Some(id));
    }
}
