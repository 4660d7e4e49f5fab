//! Delayed pickup placement.
//!
//! The spawner never touches the world. When its delay expires it queues a
//! [`GameEvent::SpawnPickup`] for the tick loop, which decides whether a
//! pickup can actually be placed. At most one spawn is pending at a time, from
//! arming until the tick loop reports the event applied.

use crate::world::GameEvent;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

#[derive(Clone)]
pub struct PickupSpawner {
    events: mpsc::Sender<GameEvent>,
    pending: Arc<AtomicBool>,
}

impl PickupSpawner {
    pub fn new(events: mpsc::Sender<GameEvent>) -> Self {
        Self {
            events,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Arms a spawn after `delay`. Returns false if one is already pending.
    pub fn schedule_spawn(&self, delay: Duration) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            debug!("Pickup spawn already pending");
            return false;
        }

        let deadline = Instant::now() + delay;
        let events = self.events.clone();
        let pending = Arc::clone(&self.pending);

        tokio::spawn(async move {
            sleep_until(deadline).await;
            if events.send(GameEvent::SpawnPickup).await.is_err() {
                warn!("Tick loop gone, dropping pickup spawn");
                pending.store(false, Ordering::Release);
            }
        });

        debug!("Pickup spawn armed for {:?}", delay);
        true
    }

    /// Called by the tick loop once it has applied a queued spawn, which
    /// allows the next one to be armed.
    pub fn spawn_applied(&self) {
        self.pending.store(false, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_spawn_fires_after_delay() {
        let (tx, mut rx) = mpsc::channel(4);
        let spawner = PickupSpawner::new(tx);

        assert!(spawner.schedule_spawn(Duration::from_secs(5)));
        assert!(spawner.is_pending());

        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.recv().await, Some(GameEvent::SpawnPickup));
        assert!(spawner.is_pending());

        spawner.spawn_applied();
        assert!(!spawner.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_schedule_is_ignored_while_pending() {
        let (tx, mut rx) = mpsc::channel(4);
        let spawner = PickupSpawner::new(tx);

        assert!(spawner.schedule_spawn(Duration::from_secs(10)));
        assert!(!spawner.clone().schedule_spawn(Duration::from_secs(1)));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(rx.recv().await, Some(GameEvent::SpawnPickup));
        assert!(rx.try_recv().is_err());

        spawner.spawn_applied();
        assert!(spawner.schedule_spawn(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_but_unapplied_spawn_blocks_rearming() {
        let (tx, mut rx) = mpsc::channel(4);
        let spawner = PickupSpawner::new(tx);

        assert!(spawner.schedule_spawn(Duration::from_secs(1)));
        tokio::time::sleep(Duration::from_secs(2)).await;

        // The event is queued but the tick loop has not applied it yet
        assert!(!spawner.schedule_spawn(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(rx.try_recv(), Ok(GameEvent::SpawnPickup));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_releases_pending() {
        let (tx, rx) = mpsc::channel(4);
        let spawner = PickupSpawner::new(tx);
        drop(rx);

        assert!(spawner.schedule_spawn(Duration::from_millis(100)));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!spawner.is_pending());
    }
}
