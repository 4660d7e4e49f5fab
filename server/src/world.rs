//! Shared handle to the authoritative match.
//!
//! Sessions never touch [`GameState`] directly. Their intents travel as
//! [`GameEvent`]s to the tick loop, which applies a whole batch and advances
//! the simulation under a single write lock via [`WorldStore::apply_tick`].
//! Admission and disconnect cleanup use the short membership helpers.

use crate::config::GameConfig;
use crate::game::{GameState, MatchPhase, Pickup, TickOutcome};
use log::info;
use shared::{ClientCommand, InputKey, PickupStatus, WorldSnapshot};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Intent queued for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Press { player_id: u32, key: InputKey },
    Release { player_id: u32, key: InputKey },
    Restart { player_id: u32 },
    /// Raised by the pickup spawner once its delay has elapsed.
    SpawnPickup,
}

impl GameEvent {
    pub fn from_command(player_id: u32, command: ClientCommand) -> Self {
        match command {
            ClientCommand::Press(key) => GameEvent::Press { player_id, key },
            ClientCommand::Release(key) => GameEvent::Release { player_id, key },
            ClientCommand::Restart => GameEvent::Restart { player_id },
        }
    }
}

/// Result of one [`WorldStore::apply_tick`] call.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// A restart was applied before simulating.
    pub reset: bool,
    /// Pickup placed by a spawn event this tick.
    pub spawned: Option<Pickup>,
    /// State after simulating; `None` while the match is over.
    pub snapshot: Option<WorldSnapshot>,
    pub outcome: TickOutcome,
}

#[derive(Clone)]
pub struct WorldStore {
    state: Arc<RwLock<GameState>>,
}

impl WorldStore {
    pub fn new(config: GameConfig) -> Self {
        Self::from_state(GameState::new(config))
    }

    pub fn from_state(state: GameState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn insert_player(&self, id: u32) -> bool {
        self.state.write().await.add_player(id)
    }

    pub async fn remove_player(&self, id: u32) -> bool {
        self.state.write().await.remove_player(id)
    }

    pub async fn player_count(&self) -> usize {
        self.state.read().await.player_count()
    }

    pub async fn phase(&self) -> MatchPhase {
        self.state.read().await.phase()
    }

    pub async fn pickup_status(&self) -> PickupStatus {
        Pickup::status(self.state.read().await.pickup())
    }

    pub async fn snapshot(&self) -> WorldSnapshot {
        self.state.read().await.snapshot()
    }

    /// Applies queued events in arrival order, then advances one tick.
    ///
    /// Inputs reaching a finished match only update held keys; a restart
    /// takes effect before this tick's simulation.
    pub async fn apply_tick(&self, events: &[GameEvent]) -> TickReport {
        let mut state = self.state.write().await;
        let mut report = TickReport::default();

        for event in events {
            match *event {
                GameEvent::Press { player_id, key } => state.press(player_id, key),
                GameEvent::Release { player_id, key } => state.release(player_id, key),
                GameEvent::Restart { player_id } => {
                    info!("Player {} requested a restart", player_id);
                    state.reset();
                    report.reset = true;
                    report.spawned = None;
                }
                GameEvent::SpawnPickup => {
                    if let Some(pickup) = state.spawn_pickup() {
                        report.spawned = Some(pickup);
                    }
                }
            }
        }

        let was_running = state.phase() == MatchPhase::Running;
        report.outcome = state.tick();
        if was_running {
            report.snapshot = Some(state.snapshot());
        }

        report
    }
}
