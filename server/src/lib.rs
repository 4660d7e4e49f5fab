//! # Arena Duel Server Library
//!
//! This library provides the authoritative server for a two-player arena
//! shooter. Clients connect over TCP, report which keys they hold, and
//! receive the resulting world state as one JSON line per tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns the only copy of the match. Movement, firing, projectile
//! flight, hits, health pickups and the win condition are all decided here;
//! clients simply draw the last snapshot they received.
//!
//! ### Session Management
//! Handles the lifecycle of client connections:
//! - Admission into one of the two player slots, or explicit rejection
//! - Forwarding of `PRESS`/`RELEASE`/`RESTART` lines as match intents
//! - Guaranteed single cleanup on disconnect, whatever ended the session
//!
//! ### State Broadcasting
//! After every tick the full snapshot is fanned out to all sessions, followed
//! by any control events that tick produced (pickup changes, game over,
//! reset). A failed send only affects the session it was meant for.
//!
//! ## Architecture Design
//!
//! ### One Task Per Concern
//! Each connection gets a reader task and a writer task. A single tick loop
//! drains queued intents and advances the match on a fixed period, and a
//! pickup spawner arms delayed spawns. They share the match through
//! [`world::WorldStore`], whose `apply_tick` applies a whole batch of intents
//! and one simulation step under one exclusive lock, so a broadcast never
//! sees a half-updated tick.
//!
//! ### Line-Based Protocol
//! Client commands are plain text lines; server messages are adjacently
//! tagged JSON objects defined in the `shared` crate.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Pure, synchronous match rules: players, projectiles, pickup, match phase.
//!
//! ### World Module (`world`)
//! Lock-protected handle to the match and the intent type fed to it.
//!
//! ### Client Manager Module (`client_manager`)
//! Slot allocation, capacity checks, bounded per-session outbound queues and
//! broadcast fan-out. Lagging clients lose snapshots, never control events.
//!
//! ### Session Module (`session`)
//! Per-connection reader and writer with disconnect cleanup.
//!
//! ### Pickup Module (`pickup`)
//! Delayed, idempotent pickup spawn scheduling.
//!
//! ### Network Module (`network`)
//! TCP acceptor, tick loop and graceful shutdown.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Listens on 127.0.0.1:5000 with a 2ms tick and two player slots
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod pickup;
pub mod session;
pub mod world;
