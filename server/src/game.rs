//! Authoritative match simulation.
//!
//! [`GameState`] is plain synchronous data; all locking lives in
//! [`crate::world::WorldStore`]. One call to [`GameState::tick`] is one
//! simulation step: movement, firing, cooldowns, projectile flight, hits,
//! out-of-bounds cleanup and pickup collection, in that order.

use crate::config::{GameConfig, START_INSET};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Color, InputKey, PickupStatus, PlayerView, ProjectileView, WorldSnapshot};
use std::collections::{BTreeMap, HashSet};

/// Start position, colours and firing heading of a player slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub x: i32,
    pub y: i32,
    pub player_color: Color,
    pub projectile_color: Color,
    pub heading: i32,
}

/// Layout for a player identity. Only the two duel slots are defined.
pub fn slot_layout(id: u32, config: &GameConfig) -> Option<SlotLayout> {
    let y = config.arena_height / 2;
    match id {
        0 => Some(SlotLayout {
            x: START_INSET,
            y,
            player_color: Color::Yellow,
            projectile_color: Color::Blue,
            heading: 1,
        }),
        1 => Some(SlotLayout {
            x: config.arena_width - config.player_size - START_INSET,
            y,
            player_color: Color::Green,
            projectile_color: Color::Red,
            heading: -1,
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projectile {
    pub x: i32,
    pub y: i32,
    /// +1 flies right, -1 flies left.
    pub direction: i32,
    pub color: Color,
}

impl Projectile {
    fn advance(&mut self, speed: i32) {
        self.x += speed * self.direction;
    }
}

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub health: i32,
    pub cooldown_ms: u32,
    pub heading: i32,
    pub player_color: Color,
    pub projectile_color: Color,
    pub keys: HashSet<InputKey>,
    pub projectiles: Vec<Projectile>,
}

impl PlayerState {
    pub fn new(id: u32, layout: SlotLayout, health: i32) -> Self {
        Self {
            id,
            x: layout.x,
            y: layout.y,
            health,
            cooldown_ms: 0,
            heading: layout.heading,
            player_color: layout.player_color,
            projectile_color: layout.projectile_color,
            keys: HashSet::new(),
            projectiles: Vec::new(),
        }
    }

    /// Inclusive point-in-hit-box test.
    fn contains_point(&self, x: i32, y: i32, size: i32) -> bool {
        x >= self.x && x <= self.x + size && y >= self.y && y <= self.y + size
    }

    fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            x: self.x,
            y: self.y,
            health: self.health,
            player_color: self.player_color,
            projectile_color: self.projectile_color,
            projectiles: self
                .projectiles
                .iter()
                .map(|p| ProjectileView {
                    x: p.x,
                    y: p.y,
                    direction: p.direction,
                    color: p.color,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pickup {
    pub x: i32,
    pub y: i32,
}

impl Pickup {
    pub fn status(pickup: Option<Pickup>) -> PickupStatus {
        match pickup {
            Some(Pickup { x, y }) => PickupStatus::Present { x, y },
            None => PickupStatus::Absent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Running,
    GameOver { winner: u32 },
}

/// What happened during one tick that needs a control message.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// Set on the tick that ended the match.
    pub winner: Option<u32>,
    /// Player that collected the pickup this tick.
    pub pickup_taken_by: Option<u32>,
}

pub struct GameState {
    config: GameConfig,
    tick: u64,
    players: BTreeMap<u32, PlayerState>,
    pickup: Option<Pickup>,
    phase: MatchPhase,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        Self {
            config,
            tick: 0,
            players: BTreeMap::new(),
            pickup: None,
            phase: MatchPhase::Running,
            rng,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn pickup(&self) -> Option<Pickup> {
        self.pickup
    }

    pub fn player(&self, id: u32) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut PlayerState> {
        self.players.get_mut(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Adds a player at its slot's start position. Returns false for
    /// identities without a layout.
    pub fn add_player(&mut self, id: u32) -> bool {
        let Some(layout) = slot_layout(id, &self.config) else {
            return false;
        };

        let player = PlayerState::new(id, layout, self.config.max_health);
        info!("Added player {} at ({}, {})", id, player.x, player.y);
        self.players.insert(id, player);
        true
    }

    pub fn remove_player(&mut self, id: u32) -> bool {
        let removed = self.players.remove(&id).is_some();
        if removed {
            info!("Removed player {}", id);
        }
        removed
    }

    pub fn press(&mut self, id: u32, key: InputKey) {
        if let Some(player) = self.players.get_mut(&id) {
            player.keys.insert(key);
        }
    }

    pub fn release(&mut self, id: u32, key: InputKey) {
        if let Some(player) = self.players.get_mut(&id) {
            player.keys.remove(&key);
        }
    }

    /// Places a pickup at a random spot inside the margin, if the match is
    /// running with every slot filled and no pickup is live.
    pub fn spawn_pickup(&mut self) -> Option<Pickup> {
        if self.phase != MatchPhase::Running
            || self.pickup.is_some()
            || self.players.len() < self.config.max_players
        {
            return None;
        }

        let margin = self.config.pickup_margin;
        let max_x = (self.config.arena_width - margin).max(margin + 1);
        let max_y = (self.config.arena_height - margin).max(margin + 1);
        let pickup = Pickup {
            x: self.rng.gen_range(margin..max_x),
            y: self.rng.gen_range(margin..max_y),
        };

        info!("Pickup spawned at ({}, {})", pickup.x, pickup.y);
        self.pickup = Some(pickup);
        Some(pickup)
    }

    /// Advances the match by one tick. Does nothing once the match is over.
    pub fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.phase != MatchPhase::Running {
            return outcome;
        }

        self.tick += 1;
        let config = &self.config;
        let tick_ms = config.tick_ms();

        for player in self.players.values_mut() {
            apply_movement(player, config);
            apply_fire(player, config);
            player.cooldown_ms = player.cooldown_ms.saturating_sub(tick_ms);
        }

        for player in self.players.values_mut() {
            for projectile in &mut player.projectiles {
                projectile.advance(config.projectile_speed);
            }
        }

        if let Some(winner) = self.resolve_hits() {
            info!("Game over, player {} wins", winner);
            self.phase = MatchPhase::GameOver { winner };
            outcome.winner = Some(winner);
            return outcome;
        }

        let width = self.config.arena_width;
        for player in self.players.values_mut() {
            player.projectiles.retain(|p| p.x >= 0 && p.x <= width);
        }

        outcome.pickup_taken_by = self.collect_pickup();
        outcome
    }

    /// Checks every projectile against every player except its owner.
    ///
    /// Returns the winner on the first hit that takes a player to zero
    /// health; remaining projectiles are left untouched for that tick.
    fn resolve_hits(&mut self) -> Option<u32> {
        let size = self.config.player_size;
        let damage = self.config.projectile_damage;
        let shooter_ids: Vec<u32> = self.players.keys().copied().collect();

        for shooter_id in shooter_ids {
            let mut shots = match self.players.get_mut(&shooter_id) {
                Some(shooter) => std::mem::take(&mut shooter.projectiles),
                None => continue,
            };

            let mut winner = None;
            let mut i = 0;
            while i < shots.len() {
                let Projectile { x, y, .. } = shots[i];
                let target = self
                    .players
                    .values_mut()
                    .find(|t| t.id != shooter_id && t.contains_point(x, y, size));

                let Some(target) = target else {
                    i += 1;
                    continue;
                };

                target.health = (target.health - damage).max(0);
                shots.remove(i);
                info!(
                    "Player {} hit by player {}, health left: {}",
                    target.id, shooter_id, target.health
                );

                if target.health <= 0 {
                    winner = Some(shooter_id);
                    break;
                }
            }

            if let Some(shooter) = self.players.get_mut(&shooter_id) {
                shooter.projectiles = shots;
            }
            if winner.is_some() {
                return winner;
            }
        }

        None
    }

    /// Heals the first player overlapping the pickup and removes it.
    fn collect_pickup(&mut self) -> Option<u32> {
        let pickup = self.pickup?;
        let size = self.config.player_size;
        let pickup_size = self.config.pickup_size;
        let max_health = self.config.max_health;
        let heal = self.config.pickup_heal;

        let player = self.players.values_mut().find(|p| {
            p.x < pickup.x + pickup_size
                && p.x + size > pickup.x
                && p.y < pickup.y + pickup_size
                && p.y + size > pickup.y
        })?;

        player.health = (player.health + heal).min(max_health);
        info!(
            "Player {} collected the pickup, health now {}",
            player.id, player.health
        );
        let id = player.id;
        self.pickup = None;
        Some(id)
    }

    /// Starts a fresh match with the players currently connected.
    pub fn reset(&mut self) {
        for player in self.players.values_mut() {
            if let Some(layout) = slot_layout(player.id, &self.config) {
                player.x = layout.x;
                player.y = layout.y;
            }
            player.health = self.config.max_health;
            player.cooldown_ms = 0;
            player.keys.clear();
            player.projectiles.clear();
        }

        self.pickup = None;
        self.phase = MatchPhase::Running;
        info!("Match reset with {} players", self.players.len());
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            players: self.players.values().map(PlayerState::view).collect(),
        }
    }
}

fn apply_movement(player: &mut PlayerState, config: &GameConfig) {
    let speed = config.player_speed;
    let max_x = config.arena_width - config.player_size;
    let max_y = config.arena_height - config.player_size;

    if player.keys.contains(&InputKey::Up) {
        player.y = (player.y - speed).max(0);
    }
    if player.keys.contains(&InputKey::Left) {
        player.x = (player.x - speed).max(0);
    }
    if player.keys.contains(&InputKey::Down) {
        player.y = (player.y + speed).min(max_y);
    }
    if player.keys.contains(&InputKey::Right) {
        player.x = (player.x + speed).min(max_x);
    }
}

fn apply_fire(player: &mut PlayerState, config: &GameConfig) {
    if !player.keys.contains(&InputKey::Fire)
        || player.cooldown_ms > 0
        || player.projectiles.len() >= config.projectile_cap
    {
        return;
    }

    let half = config.player_size / 2;
    player.projectiles.push(Projectile {
        x: player.x + half,
        y: player.y + half,
        direction: player.heading,
        color: player.projectile_color,
    });
    player.cooldown_ms = config.fire_cooldown_ms;
}
