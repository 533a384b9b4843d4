pub mod cups;
pub mod game;
pub mod players;
pub mod sse;
pub mod state_machine;
pub mod turn;

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::match_store::MatchStore,
    error::ServiceError,
    state::{cups::FormatCatalog, players::PlayerIndex, sse::SseHub, turn::TurnPolicy},
};

pub type SharedState = Arc<AppState>;

/// Capacity of the public SSE broadcast channel.
const SSE_CAPACITY: usize = 64;

/// Central application state: configuration, storage handle, per-match gates and indexes.
pub struct AppState {
    config: AppConfig,
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    sse: SseHub,
    players: PlayerIndex,
    /// Held only weakly: a gate lives as long as someone holds or awaits it.
    match_gates: DashMap<Uuid, Weak<Mutex<()>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            match_store: RwLock::new(None),
            sse: SseHub::new(SSE_CAPACITY),
            players: PlayerIndex::new(),
            match_gates: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    pub fn formats(&self) -> &FormatCatalog {
        self.config.formats()
    }

    pub fn turn_policy(&self) -> TurnPolicy {
        self.config.turn_policy()
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.match_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current match store, or [`ServiceError::Degraded`] while running without storage.
    pub async fn require_match_store(&self) -> Result<Arc<dyn MatchStore>, ServiceError> {
        if *self.degraded.borrow() {
            return Err(ServiceError::Degraded);
        }
        self.match_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new match store implementation and leave degraded mode.
    ///
    /// Returns whether the application was degraded before.
    pub async fn set_match_store(&self, store: Arc<dyn MatchStore>) -> bool {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false)
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag, notifying watchers only when the value changes.
    ///
    /// Returns whether the flag flipped.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Index of players seated in unfinished matches.
    pub fn players(&self) -> &PlayerIndex {
        &self.players
    }

    /// Serialise mutations of one match; other matches stay independent.
    ///
    /// Gates nobody holds any more are swept on the way, so finished matches do not pile up.
    pub async fn lock_match(&self, match_id: Uuid) -> OwnedMutexGuard<()> {
        self.match_gates.retain(|_, gate| gate.strong_count() > 0);
        let gate = {
            let mut slot = self.match_gates.entry(match_id).or_default();
            match slot.upgrade() {
                Some(gate) => gate,
                None => {
                    let gate = Arc::new(Mutex::new(()));
                    *slot = Arc::downgrade(&gate);
                    gate
                }
            }
        };
        gate.lock_owned().await
    }
}
