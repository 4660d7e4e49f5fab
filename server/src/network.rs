//! Server network layer: TCP acceptor and tick loop coordination

use crate::client_manager::ClientManager;
use crate::config::{GameConfig, ServerConfig};
use crate::error::ServerError;
use crate::pickup::PickupSpawner;
use crate::session::{run_session, SessionContext};
use crate::world::{GameEvent, TickReport, WorldStore};
use log::{debug, error, info, warn};
use shared::{PickupStatus, ServerMessage, MAX_PLAYERS};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Ticks between periodic debug statistics.
const STATS_EVERY_TICKS: u64 = 5_000;

/// Main server coordinating connections and the match simulation
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    world: WorldStore,
    clients: Arc<RwLock<ClientManager>>,
    events_tx: mpsc::Sender<GameEvent>,
    events_rx: mpsc::Receiver<GameEvent>,
    spawner: PickupSpawner,
}

impl Server {
    /// Binds the listening socket. Nothing is accepted until [`Server::run`].
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let capacity = config.game.max_players;
        if capacity == 0 || capacity > MAX_PLAYERS {
            return Err(ServerError::InvalidCapacity(capacity));
        }

        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let spawner = PickupSpawner::new(events_tx.clone());

        Ok(Server {
            listener,
            world: WorldStore::new(config.game.clone()),
            clients: Arc::new(RwLock::new(ClientManager::new(
                capacity,
                config.outbound_queue_len,
            ))),
            events_tx,
            events_rx,
            spawner,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn world(&self) -> WorldStore {
        self.world.clone()
    }

    pub fn clients(&self) -> Arc<RwLock<ClientManager>> {
        Arc::clone(&self.clients)
    }

    /// Runs until the process is killed.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the acceptor and tick loop until `shutdown` completes, then
    /// tells every client the server is going away.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            config,
            world,
            clients,
            events_tx,
            events_rx,
            spawner,
        } = self;

        spawner.schedule_spawn(config.game.first_pickup_delay);

        let tick_loop = TickLoop {
            world: world.clone(),
            clients: Arc::clone(&clients),
            events: events_rx,
            spawner: spawner.clone(),
            game: config.game.clone(),
        };
        let tick_handle = tokio::spawn(tick_loop.run());

        let acceptor = Acceptor {
            world,
            clients: Arc::clone(&clients),
            events: events_tx,
            spawner,
            game: config.game.clone(),
        };

        info!("Server started successfully");

        tokio::select! {
            _ = shutdown => info!("Server shutting down"),
            _ = acceptor.run(listener) => {}
        }

        let notified = clients.read().await.broadcast(&ServerMessage::Shutdown {
            reason: "server shutting down".to_string(),
        });
        debug!("Shutdown notice queued for {} clients", notified);
        tokio::time::sleep(config.shutdown_grace).await;
        tick_handle.abort();

        Ok(())
    }
}

/// Admits connections and starts their sessions
struct Acceptor {
    world: WorldStore,
    clients: Arc<RwLock<ClientManager>>,
    events: mpsc::Sender<GameEvent>,
    spawner: PickupSpawner,
    game: GameConfig,
}

impl Acceptor {
    async fn run(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => self.handle_connection(stream, addr).await,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }

        // Welcome and the current pickup are queued while the registry is
        // locked, so they precede any broadcast this client will see.
        let admitted = {
            let mut clients = self.clients.write().await;
            match clients.admit(addr) {
                Some(admission) => {
                    let player_id = admission.player_id;
                    self.world.insert_player(player_id).await;
                    clients.send_to(player_id, &ServerMessage::Welcome { player_id });
                    let pickup = self.world.pickup_status().await;
                    clients.send_to(player_id, &ServerMessage::Pickup(pickup));
                    let needs_pickup = clients.is_full() && pickup == PickupStatus::Absent;
                    Some((admission, needs_pickup))
                }
                None => None,
            }
        };

        let Some((admission, needs_pickup)) = admitted else {
            tokio::spawn(reject(stream, addr));
            return;
        };

        if needs_pickup {
            self.spawner.schedule_spawn(self.game.first_pickup_delay);
        }

        let ctx = SessionContext {
            player_id: admission.player_id,
            events: self.events.clone(),
            clients: Arc::clone(&self.clients),
            world: self.world.clone(),
            evicted: admission.evicted,
        };
        let (reader, writer) = stream.into_split();
        tokio::spawn(run_session(reader, writer, admission.outbound, ctx));
    }
}

async fn reject(mut stream: TcpStream, addr: SocketAddr) {
    warn!("Rejecting connection from {}: server full", addr);

    let message = ServerMessage::Rejected {
        reason: "server full".to_string(),
    };
    match message.encode() {
        Ok(mut line) => {
            line.push('\n');
            if let Err(e) = stream.write_all(line.as_bytes()).await {
                warn!("Failed to send rejection to {}: {}", addr, e);
            }
        }
        Err(e) => warn!("Failed to encode rejection: {}", e),
    }

    let _ = stream.shutdown().await;
}

/// Fixed-period simulation driver
struct TickLoop {
    world: WorldStore,
    clients: Arc<RwLock<ClientManager>>,
    events: mpsc::Receiver<GameEvent>,
    spawner: PickupSpawner,
    game: GameConfig,
}

impl TickLoop {
    async fn run(mut self) {
        let mut ticker = interval(self.game.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut batch = Vec::new();

        loop {
            ticker.tick().await;

            batch.clear();
            while let Ok(event) = self.events.try_recv() {
                batch.push(event);
            }

            let report = self.world.apply_tick(&batch).await;
            if batch.contains(&GameEvent::SpawnPickup) {
                self.spawner.spawn_applied();
            }
            self.publish(report).await;
        }
    }

    /// Broadcasts what one tick produced: reset first, then the new pickup,
    /// the snapshot, a consumed pickup and finally the game-over event.
    async fn publish(&self, report: TickReport) {
        if report.reset {
            self.spawner.schedule_spawn(self.game.first_pickup_delay);
        }
        if report.outcome.pickup_taken_by.is_some() {
            self.spawner.schedule_spawn(self.game.pickup_respawn_delay);
        }

        let clients = self.clients.read().await;
        if clients.is_empty() {
            return;
        }

        if report.reset {
            clients.broadcast(&ServerMessage::Reset);
            clients.broadcast(&ServerMessage::Pickup(PickupStatus::Absent));
        }

        if let Some(pickup) = report.spawned {
            clients.broadcast(&ServerMessage::Pickup(PickupStatus::Present {
                x: pickup.x,
                y: pickup.y,
            }));
        }

        if let Some(snapshot) = report.snapshot {
            if snapshot.tick % STATS_EVERY_TICKS == 0 {
                debug!(
                    "Tick {}: {} clients, {} players",
                    snapshot.tick,
                    clients.len(),
                    snapshot.players.len()
                );
            }
            clients.broadcast(&ServerMessage::Snapshot(snapshot));
        }

        if report.outcome.pickup_taken_by.is_some() {
            clients.broadcast(&ServerMessage::Pickup(PickupStatus::Absent));
        }

        if let Some(winner) = report.outcome.winner {
            clients.broadcast(&ServerMessage::GameOver { winner });
        }
    }
}
