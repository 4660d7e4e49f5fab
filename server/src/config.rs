//! Gameplay tuning and network settings.
//!
//! Keep gameplay numbers in [`GameConfig`] and socket/runtime settings in
//! [`ServerConfig`]; the defaults reproduce the classic two-player duel.

use shared::{
    ARENA_HEIGHT, ARENA_WIDTH, DEFAULT_PORT, MAX_HEALTH, MAX_PLAYERS, PICKUP_SIZE, PLAYER_SIZE,
};
use std::time::Duration;

/// Distance of a start position from the arena's left or right edge.
pub const START_INSET: i32 = 50;

/// Gameplay tuning for one match.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub arena_width: i32,
    pub arena_height: i32,

    /// Side length of the square player hit-box.
    pub player_size: i32,
    /// Distance moved per tick for each held direction key.
    pub player_speed: i32,
    pub max_health: i32,
    /// Player slots; a pickup only spawns once all of them are filled.
    pub max_players: usize,

    /// Horizontal distance a projectile travels per tick.
    pub projectile_speed: i32,
    /// Live projectiles a single player may own.
    pub projectile_cap: usize,
    pub projectile_damage: i32,
    /// Cooldown after a shot, counted down by the tick period.
    pub fire_cooldown_ms: u32,

    pub pickup_size: i32,
    /// Keeps spawned pickups this far away from the arena edges.
    pub pickup_margin: i32,
    pub pickup_heal: i32,
    pub first_pickup_delay: Duration,
    pub pickup_respawn_delay: Duration,

    pub tick_interval: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            arena_width: ARENA_WIDTH,
            arena_height: ARENA_HEIGHT,
            player_size: PLAYER_SIZE,
            player_speed: 2,
            max_health: MAX_HEALTH,
            max_players: MAX_PLAYERS,
            projectile_speed: 4,
            projectile_cap: 10,
            projectile_damage: 10,
            fire_cooldown_ms: 100,
            pickup_size: PICKUP_SIZE,
            pickup_margin: 40,
            pickup_heal: 10,
            first_pickup_delay: Duration::from_secs(5),
            pickup_respawn_delay: Duration::from_secs(10),
            tick_interval: Duration::from_millis(2),
        }
    }
}

impl GameConfig {
    /// Tick period in whole milliseconds, never zero.
    pub fn tick_ms(&self) -> u32 {
        (self.tick_interval.as_millis() as u32).max(1)
    }
}

/// Network and runtime settings for the server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of the queue carrying session intents to the tick loop.
    pub event_channel_capacity: usize,
    /// Lines buffered per client before snapshots are dropped for it.
    pub outbound_queue_len: usize,
    /// Time given to writer tasks to flush the shutdown notice.
    pub shutdown_grace: Duration,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            event_channel_capacity: 1024,
            outbound_queue_len: 1024,
            shutdown_grace: Duration::from_millis(100),
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
