//! Connected session registry for the match server
//!
//! This module tracks who is currently connected:
//! - Slot assignment, always the lowest free identity
//! - Capacity enforcement for the fixed-size lobby
//! - Per-session outbound queues used for direct sends and broadcasts
//!
//! Writes to sockets never happen here. Each session owns a writer task that
//! drains its queue, so a slow or dead peer cannot stall anyone else. Queues
//! are bounded: a client that stops reading loses snapshots, and is told to
//! disconnect once a message it must receive no longer fits.

use log::{debug, info, warn};
use shared::ServerMessage;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

/// A connected client and the queue feeding its socket writer
#[derive(Debug)]
pub struct Session {
    /// Slot identity, unique among live sessions
    pub id: u32,
    /// Peer address, kept for logging
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Encoded lines waiting to be written to this client
    outbound: mpsc::Sender<String>,
    /// Signalled when the client has fallen too far behind
    evict: Arc<Notify>,
}

/// What a freshly admitted session needs to run
#[derive(Debug)]
pub struct Admission {
    pub player_id: u32,
    pub outbound: mpsc::Receiver<String>,
    pub evicted: Arc<Notify>,
}

impl Session {
    pub fn new(
        id: u32,
        addr: SocketAddr,
        outbound: mpsc::Sender<String>,
        evict: Arc<Notify>,
    ) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            outbound,
            evict,
        }
    }

    /// Queues an already encoded line without waiting.
    ///
    /// When the queue is full a droppable line is skipped; any other line
    /// evicts the session. Returns true only if the line was queued.
    pub fn push_line(&self, line: String, droppable: bool) -> bool {
        match self.outbound.try_send(line) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) if droppable => {
                debug!("Client {} is lagging, skipping a snapshot", self.id);
                false
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Client {} ({}) outbound queue full, disconnecting",
                    self.id, self.addr
                );
                self.evict.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Registry of live sessions with a fixed capacity
///
/// Identities are handed out lowest-free-first, so a freed slot is reused
/// by the next admission and ids stay inside `0..capacity`.
pub struct ClientManager {
    sessions: BTreeMap<u32, Session>,
    capacity: usize,
    queue_len: usize,
}

impl ClientManager {
    /// Creates a registry for `capacity` sessions, each with an outbound
    /// queue holding at most `queue_len` lines.
    pub fn new(capacity: usize, queue_len: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            capacity,
            queue_len: queue_len.max(1),
        }
    }

    /// Admits a connection if a slot is free
    ///
    /// Returns the assigned identity with the session's queue receiver, or
    /// None when the lobby is full.
    pub fn admit(&mut self, addr: SocketAddr) -> Option<Admission> {
        if self.is_full() {
            return None;
        }

        let id = (0..self.capacity as u32).find(|id| !self.sessions.contains_key(id))?;
        let (outbound_tx, outbound_rx) = mpsc::channel(self.queue_len);
        let evict = Arc::new(Notify::new());

        info!("Client {} connected from {}", id, addr);
        self.sessions
            .insert(id, Session::new(id, addr, outbound_tx, Arc::clone(&evict)));
        Some(Admission {
            player_id: id,
            outbound: outbound_rx,
            evicted: evict,
        })
    }

    /// Removes a session. Returns false if it was already gone, which lets
    /// disconnect cleanup run at most once per session.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(session) = self.sessions.remove(client_id) {
            info!(
                "Client {} ({}) disconnected after {:.1}s",
                session.id,
                session.addr,
                session.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Sends one message to one session.
    pub fn send_to(&self, client_id: u32, message: &ServerMessage) -> bool {
        let Some(session) = self.sessions.get(&client_id) else {
            return false;
        };

        match message.encode() {
            Ok(line) => session.push_line(line, message.is_droppable()),
            Err(e) => {
                warn!("Failed to encode message for client {}: {}", client_id, e);
                false
            }
        }
    }

    /// Sends a message to every live session
    ///
    /// The message is encoded once. A session whose queue is closed or full
    /// is skipped; the rest still receive the message. Returns the number of
    /// sessions that accepted it.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let line = match message.encode() {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to encode broadcast: {}", e);
                return 0;
            }
        };

        let droppable = message.is_droppable();
        let mut delivered = 0;
        for session in self.sessions.values() {
            if session.push_line(line.clone(), droppable) {
                delivered += 1;
            } else if session.outbound.is_closed() {
                warn!(
                    "Dropping broadcast for client {} ({}), writer closed",
                    session.id, session.addr
                );
            }
        }
        delivered
    }

    pub fn contains(&self, client_id: u32) -> bool {
        self.sessions.contains_key(&client_id)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.sessions.keys().copied().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.capacity
    }

    /// Returns the number of connected sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are connected
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PickupStatus, WorldSnapshot};
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn test_addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    fn admit(manager: &mut ClientManager, port: u16) -> Option<Admission> {
        manager.admit(test_addr(port))
    }

    fn snapshot(tick: u64) -> ServerMessage {
        ServerMessage::Snapshot(WorldSnapshot {
            tick,
            players: Vec::new(),
        })
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(2, 8);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
        assert_eq!(manager.capacity(), 2);
        assert!(!manager.is_full());
    }

    #[test]
    fn test_admit_assigns_lowest_ids() {
        let mut manager = ClientManager::new(2, 8);
        let first = admit(&mut manager, 8080).unwrap();
        let second = admit(&mut manager, 8081).unwrap();

        assert_eq!(first.player_id, 0);
        assert_eq!(second.player_id, 1);
        assert!(manager.is_full());
        assert_eq!(manager.ids(), vec![0, 1]);
    }

    #[test]
    fn test_admit_at_capacity() {
        let mut manager = ClientManager::new(2, 8);
        let _a0 = admit(&mut manager, 8080);
        let _a1 = admit(&mut manager, 8081);

        assert!(admit(&mut manager, 8082).is_none());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let mut manager = ClientManager::new(2, 8);
        let _a0 = admit(&mut manager, 8080);
        let _a1 = admit(&mut manager, 8081);

        assert!(manager.remove_client(&0));
        let again = admit(&mut manager, 8082).unwrap();
        assert_eq!(again.player_id, 0);
        assert!(manager.contains(1));
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new(2, 8);
        let _a0 = admit(&mut manager, 8080);

        assert!(manager.remove_client(&0));
        assert!(!manager.remove_client(&0));
        assert!(!manager.remove_client(&5));
    }

    #[test]
    fn test_send_to_single_client() {
        let mut manager = ClientManager::new(2, 8);
        let mut a0 = admit(&mut manager, 8080).unwrap();
        let mut a1 = admit(&mut manager, 8081).unwrap();

        assert!(manager.send_to(1, &ServerMessage::Welcome { player_id: 1 }));
        assert!(!manager.send_to(7, &ServerMessage::Reset));

        assert_eq!(
            a1.outbound.try_recv().unwrap(),
            r#"{"type":"Welcome","data":{"player_id":1}}"#
        );
        assert!(a0.outbound.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_reaches_everyone() {
        let mut manager = ClientManager::new(2, 8);
        let mut a0 = admit(&mut manager, 8080).unwrap();
        let mut a1 = admit(&mut manager, 8081).unwrap();

        assert_eq!(manager.broadcast(&ServerMessage::Reset), 2);
        assert_eq!(a0.outbound.try_recv().unwrap(), r#"{"type":"Reset"}"#);
        assert_eq!(a1.outbound.try_recv().unwrap(), r#"{"type":"Reset"}"#);
    }

    #[test]
    fn test_broadcast_isolates_closed_writer() {
        let mut manager = ClientManager::new(2, 8);
        let a0 = admit(&mut manager, 8080).unwrap();
        let mut a1 = admit(&mut manager, 8081).unwrap();
        drop(a0);

        assert_eq!(manager.broadcast(&ServerMessage::GameOver { winner: 1 }), 1);
        assert!(a1.outbound.try_recv().is_ok());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_stalled_reader_queue_stays_bounded() {
        let mut manager = ClientManager::new(2, 16);
        let mut stalled = admit(&mut manager, 8080).unwrap();
        let mut reader = admit(&mut manager, 8081).unwrap();

        for tick in 0..10_000 {
            manager.broadcast(&snapshot(tick));
            if tick % 8 == 0 {
                drain(&mut reader.outbound);
            }
        }

        assert_eq!(drain(&mut stalled.outbound).len(), 16);
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_full_queue_evicts_on_control_message() {
        let mut manager = ClientManager::new(2, 4);
        let mut stalled = admit(&mut manager, 8080).unwrap();
        let mut healthy = admit(&mut manager, 8081).unwrap();

        for tick in 0..4 {
            manager.broadcast(&snapshot(tick));
        }
        drain(&mut healthy.outbound);

        // A dropped snapshot is not a reason to disconnect
        assert_eq!(manager.broadcast(&snapshot(4)), 1);
        drain(&mut healthy.outbound);
        let early =
            tokio::time::timeout(Duration::from_millis(20), stalled.evicted.notified()).await;
        assert!(early.is_err());

        let absent = ServerMessage::Pickup(PickupStatus::Absent);
        assert_eq!(manager.broadcast(&absent), 1);
        tokio::time::timeout(Duration::from_secs(1), stalled.evicted.notified())
            .await
            .expect("stalled session should be evicted");

        assert_eq!(drain(&mut healthy.outbound).len(), 1);
        assert_eq!(drain(&mut stalled.outbound).len(), 4);
    }
}
