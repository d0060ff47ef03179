//! Process-wide shared state: the world singleton, the broadcaster, the
//! fixed-timestep driver, and the live subscriber registry every connection
//! task and the tick loop reach through.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arena_proto::outbound::OutboundMessage;
use arena_proto::SubscriberId;
use arena_sim::broadcaster::Broadcaster;
use arena_sim::sim_loop::SimLoop;
use arena_sim::World;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::warn;

use crate::ids::SubscriberIdAllocator;

/// Minimum gap between logged protocol errors for the same subscriber
/// (spec §7: "log once per subscriber per 5s").
const PROTOCOL_ERROR_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Capacity of each subscriber's outbound queue (spec §7 "send buffer full").
/// A full buffer means a stalled or too-slow consumer; it is treated as a
/// subscriber error, not grown without bound.
pub const SEND_BUFFER_CAPACITY: usize = 256;

struct Subscriber {
    tx: mpsc::Sender<OutboundMessage>,
    /// Signaled to kick the connection task's reader loop when this
    /// subscriber's send buffer fills (spec §7: treat identically to
    /// disconnect).
    closed: Arc<Notify>,
}

pub struct AppState {
    pub world: Mutex<World>,
    pub broadcaster: Mutex<Broadcaster>,
    pub sim_loop: Mutex<SimLoop>,
    pub ids: SubscriberIdAllocator,
    senders: Mutex<HashMap<SubscriberId, Subscriber>>,
    pub pending_disconnects: Mutex<Vec<SubscriberId>>,
    protocol_error_last_logged: Mutex<HashMap<SubscriberId, Instant>>,
}

impl AppState {
    pub fn new(world: World, tick_rate: u32) -> Self {
        Self {
            world: Mutex::new(world),
            broadcaster: Mutex::new(Broadcaster::new()),
            sim_loop: Mutex::new(SimLoop::new(tick_rate)),
            ids: SubscriberIdAllocator::default(),
            senders: Mutex::new(HashMap::new()),
            pending_disconnects: Mutex::new(Vec::new()),
            protocol_error_last_logged: Mutex::new(HashMap::new()),
        }
    }

    pub async fn register(&self, id: SubscriberId, tx: mpsc::Sender<OutboundMessage>, closed: Arc<Notify>) {
        self.senders.lock().await.insert(id, Subscriber { tx, closed });
    }

    pub async fn unregister(&self, id: &SubscriberId) {
        self.senders.lock().await.remove(id);
    }

    pub async fn send_to(&self, id: &SubscriberId, message: OutboundMessage) {
        let full = match self.senders.lock().await.get(id) {
            Some(sub) => sub.tx.try_send(message).is_err(),
            None => return,
        };
        if full {
            self.evict_full(id).await;
        }
    }

    pub async fn broadcast(&self, message: OutboundMessage) {
        let full: Vec<SubscriberId> = {
            let senders = self.senders.lock().await;
            senders
                .iter()
                .filter(|(_, sub)| sub.tx.try_send(message.clone()).is_err())
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in full {
            self.evict_full(&id).await;
        }
    }

    pub async fn broadcast_except(&self, exclude: &SubscriberId, message: OutboundMessage) {
        let full: Vec<SubscriberId> = {
            let senders = self.senders.lock().await;
            senders
                .iter()
                .filter(|(id, _)| *id != exclude)
                .filter(|(_, sub)| sub.tx.try_send(message.clone()).is_err())
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in full {
            self.evict_full(&id).await;
        }
    }

    /// Drops a subscriber whose send buffer is full, treating it identically
    /// to a disconnect (spec §7). The connection task's own cleanup path
    /// does the rest once its reader loop observes the close signal.
    async fn evict_full(&self, id: &SubscriberId) {
        if let Some(sub) = self.senders.lock().await.remove(id) {
            warn!(player = %id, "subscriber send buffer full, dropping connection");
            sub.closed.notify_one();
        }
    }

    /// Returns whether a protocol error for `id` should be logged now, and
    /// records that it was (spec §7 throttling).
    pub async fn should_log_protocol_error(&self, id: &SubscriberId) -> bool {
        let mut last_logged = self.protocol_error_last_logged.lock().await;
        let now = Instant::now();
        match last_logged.get(id) {
            Some(last) if now.duration_since(*last) < PROTOCOL_ERROR_LOG_INTERVAL => false,
            _ => {
                last_logged.insert(id.clone(), now);
                true
            }
        }
    }

    pub async fn forget_subscriber(&self, id: &SubscriberId) {
        self.protocol_error_last_logged.lock().await.remove(id);
    }
}
