use std::{sync::Arc, time::SystemTime};

use tracing::{debug, info};

use crate::{
    dao::{match_store::MatchStore, models::PlayerEntity},
    dto::players::{PlayerListResponse, PlayerSummary, RegisterPlayerRequest},
    error::ServiceError,
    state::{
        SharedState,
        game::{Roster, RosterError},
    },
};

/// Add a name to the player registry.
pub async fn register_player(
    state: &SharedState,
    request: RegisterPlayerRequest,
) -> Result<PlayerSummary, ServiceError> {
    let store = state.require_match_store().await?;
    let entity = PlayerEntity {
        name: request.name.trim().to_owned(),
        registered_at: SystemTime::now(),
    };

    if !store.save_player(entity.clone()).await? {
        debug!(player = %entity.name, "player name already taken");
        return Err(ServiceError::InvalidState(format!(
            "player `{}` is already registered",
            entity.name
        )));
    }
    info!(player = %entity.name, "player registered");
    Ok(PlayerSummary::new(&entity, None))
}

/// Every registered player with the match they are seated in.
pub async fn list_players(state: &SharedState) -> Result<PlayerListResponse, ServiceError> {
    let store = state.require_match_store().await?;
    let players = store
        .list_players()
        .await?
        .iter()
        .map(|entity| PlayerSummary::new(entity, state.players().match_of(&entity.name)))
        .collect();
    Ok(PlayerListResponse { players })
}

/// Remove a player from the registry. Seated players stay until their match ends.
pub async fn delete_player(state: &SharedState, name: &str) -> Result<(), ServiceError> {
    let store = state.require_match_store().await?;
    let name = name.trim();
    if let Some(match_id) = state.players().match_of(name) {
        return Err(RosterError::PlayerBusy {
            player: name.to_owned(),
            match_id,
        }
        .into());
    }
    if !store.delete_player(name.to_owned()).await? {
        return Err(ServiceError::NotFound(format!("player `{name}` is not registered")));
    }
    info!(player = %name, "player removed");
    Ok(())
}

/// Reject rosters naming anyone missing from the registry.
pub(crate) async fn ensure_registered(
    store: &Arc<dyn MatchStore>,
    roster: &Roster,
) -> Result<(), ServiceError> {
    for player in roster.all_players() {
        if store.find_player(player.to_owned()).await?.is_none() {
            return Err(RosterError::UnknownPlayer(player.to_owned()).into());
        }
    }
    Ok(())
}
