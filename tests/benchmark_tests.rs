//! Performance benchmarks for the tick and broadcast path

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::GameConfig;
use server::game::GameState;
use shared::{InputKey, ServerMessage};
use std::time::Instant;

fn busy_duel(config: GameConfig) -> GameState {
    let mut game = GameState::with_rng(config, StdRng::seed_from_u64(42));
    game.add_player(0);
    game.add_player(1);
    for id in [0, 1] {
        game.press(id, InputKey::Fire);
        game.press(id, InputKey::Up);
    }
    game
}

/// Benchmarks full ticks with both players firing continuously
#[test]
fn benchmark_tick_with_live_projectiles() {
    let config = GameConfig {
        fire_cooldown_ms: 0,
        projectile_damage: 0,
        ..GameConfig::default()
    };
    let mut game = busy_duel(config);

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        game.tick();
    }

    let duration = start.elapsed();
    println!(
        "Tick: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // A 2ms tick budget leaves plenty of headroom; this is a coarse bound
    assert!(duration.as_millis() < 2_000);
}

/// Benchmarks snapshot construction and JSON encoding
#[test]
fn benchmark_snapshot_encoding() {
    let config = GameConfig {
        fire_cooldown_ms: 0,
        projectile_damage: 0,
        ..GameConfig::default()
    };
    let mut game = busy_duel(config);
    for _ in 0..20 {
        game.tick();
    }

    let iterations = 10_000;
    let start = Instant::now();
    let mut total_bytes = 0;

    for _ in 0..iterations {
        let line = ServerMessage::Snapshot(game.snapshot()).encode().unwrap();
        total_bytes += line.len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} iterations in {:?} ({:.2} μs/iter, {} bytes/msg)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        total_bytes / iterations
    );

    assert!(duration.as_millis() < 2_000);
}

/// Benchmarks decoding on the client side of the wire
#[test]
fn benchmark_snapshot_decoding() {
    let mut game = busy_duel(GameConfig::default());
    for _ in 0..500 {
        game.tick();
    }
    let line = ServerMessage::Snapshot(game.snapshot()).encode().unwrap();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let message = ServerMessage::decode(&line).unwrap();
        assert!(matches!(message, ServerMessage::Snapshot(_)));
    }

    let duration = start.elapsed();
    println!(
        "Snapshot decoding: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2_000);
}
