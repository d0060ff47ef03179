//! Chunk interest management (spec §4.6): per-subscriber chunk radii,
//! version-vector diffing, and a throttled full-resync queue. Pure policy —
//! [`crate::chunk_index::ChunkIndex`] just stores the bookkeeping this module
//! reads and mutates.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use arena_proto::config::WorldConfig;
use arena_proto::SubscriberId;

use crate::chunk_index::ChunkIndex;
use crate::coords::ChunkPos;

/// A chunk a subscriber needs brought fully up to date: either freshly
/// entered their sync radius, or dirtied since their last known version.
#[derive(Debug, Clone)]
pub struct PendingResync {
    pub subscriber: SubscriberId,
    pub pos: ChunkPos,
}

struct SubscriberState {
    id: SubscriberId,
    center: ChunkPos,
    known_versions: HashMap<ChunkPos, u64>,
    queue: VecDeque<ChunkPos>,
    queued: HashSet<ChunkPos>,
}

pub struct InterestManager {
    sync_radius: i32,
    buffer_radius: i32,
    max_chunk_sync_per_tick: usize,
    chunks_x: u32,
    chunks_y: u32,
    subscribers: HashMap<SubscriberId, SubscriberState>,
}

/// All chunk positions within `radius` (chebyshev) of `center`, wrapping
/// horizontally and clamping vertically to the chunk grid. Ordered so that
/// callers queuing these for resync do so in chunk-key lexicographic order
/// (spec §4.6).
pub(crate) fn chunks_in_radius(center: ChunkPos, radius: i32, chunks_x: u32, chunks_y: u32) -> BTreeSet<ChunkPos> {
    let mut set = BTreeSet::new();
    for dy in -radius..=radius {
        let cy = center.cy as i64 + dy as i64;
        if cy < 0 || cy >= chunks_y as i64 {
            continue;
        }
        for dx in -radius..=radius {
            let cx = (center.cx as i64 + dx as i64).rem_euclid(chunks_x as i64);
            set.insert(ChunkPos::new(cx as u32, cy as u32));
        }
    }
    set
}

impl InterestManager {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            sync_radius: config.sync_radius,
            buffer_radius: config.buffer_radius,
            max_chunk_sync_per_tick: config.max_chunk_sync_per_tick,
            chunks_x: config.chunks_x(),
            chunks_y: config.chunks_y(),
            subscribers: HashMap::new(),
        }
    }

    /// Registers a subscriber and queues every chunk in their sync radius for
    /// a full resync (their version vector starts empty).
    pub fn connect(&mut self, chunk_index: &mut ChunkIndex, id: SubscriberId, center: ChunkPos) {
        let mut state = SubscriberState {
            id: id.clone(),
            center,
            known_versions: HashMap::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
        };
        for pos in chunks_in_radius(center, self.sync_radius, self.chunks_x, self.chunks_y) {
            chunk_index.subscribe(pos, id.clone());
            state.queue.push_back(pos);
            state.queued.insert(pos);
        }
        self.subscribers.insert(id, state);
    }

    pub fn disconnect(&mut self, chunk_index: &mut ChunkIndex, id: &SubscriberId) {
        if let Some(state) = self.subscribers.remove(id) {
            for pos in state.known_versions.keys().chain(state.queued.iter()) {
                chunk_index.unsubscribe(*pos, id);
            }
        }
    }

    /// Recomputes a subscriber's chunk set around a new center. Chunks newly
    /// inside the sync radius are queued for resync; chunks that fall
    /// outside the buffer radius are dropped from tracking entirely.
    pub fn recenter(&mut self, chunk_index: &mut ChunkIndex, id: &SubscriberId, center: ChunkPos) {
        let Some(state) = self.subscribers.get_mut(id) else {
            return;
        };
        state.center = center;
        let sync_set = chunks_in_radius(center, self.sync_radius, self.chunks_x, self.chunks_y);
        let buffer_set = chunks_in_radius(center, self.buffer_radius, self.chunks_x, self.chunks_y);

        for pos in sync_set.iter() {
            if !state.known_versions.contains_key(pos) && !state.queued.contains(pos) {
                chunk_index.subscribe(*pos, id.clone());
                state.queue.push_back(*pos);
                state.queued.insert(*pos);
            }
        }

        let stale: Vec<ChunkPos> = state
            .known_versions
            .keys()
            .copied()
            .filter(|pos| !buffer_set.contains(pos))
            .collect();
        for pos in stale {
            state.known_versions.remove(&pos);
            state.queued.remove(&pos);
            chunk_index.unsubscribe(pos, id);
        }
    }

    /// Scans every tracked chunk for every subscriber and enqueues those
    /// whose chunk version has advanced past the subscriber's last known
    /// version (spec §4.6: `V[k] <= chunkVersion[k]`).
    pub fn scan_for_dirty_chunks(&mut self, chunk_index: &ChunkIndex) {
        for state in self.subscribers.values_mut() {
            let dirty: BTreeSet<ChunkPos> = state
                .known_versions
                .iter()
                .filter(|(pos, &known)| chunk_index.version(**pos) > known)
                .map(|(pos, _)| *pos)
                .collect();
            for pos in dirty {
                if state.queued.insert(pos) {
                    state.queue.push_back(pos);
                }
            }
        }
    }

    /// Drains up to `maxChunkSyncPerTick` queued resyncs across all
    /// subscribers (round-robin by subscriber id for fairness), recording
    /// the subscriber's new known version for each.
    pub fn flush(&mut self, chunk_index: &ChunkIndex) -> Vec<PendingResync> {
        let mut ids: Vec<SubscriberId> = self.subscribers.keys().cloned().collect();
        ids.sort();

        let mut out = Vec::new();
        let mut budget = self.max_chunk_sync_per_tick;
        let mut made_progress = true;
        while budget > 0 && made_progress {
            made_progress = false;
            for id in &ids {
                if budget == 0 {
                    break;
                }
                let state = self.subscribers.get_mut(id).expect("id from subscribers keys");
                if let Some(pos) = state.queue.pop_front() {
                    state.queued.remove(&pos);
                    state.known_versions.insert(pos, chunk_index.version(pos));
                    out.push(PendingResync {
                        subscriber: state.id.clone(),
                        pos,
                    });
                    budget -= 1;
                    made_progress = true;
                }
            }
        }
        out
    }

    pub fn subscriber_ids(&self) -> impl Iterator<Item = &SubscriberId> {
        self.subscribers.keys()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn is_subscribed(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub fn active_chunk_count(&self, id: &SubscriberId) -> usize {
        self.subscribers.get(id).map(|s| s.known_versions.len() + s.queued.len()).unwrap_or(0)
    }

    pub fn center_of(&self, id: &SubscriberId) -> Option<ChunkPos> {
        self.subscribers.get(id).map(|s| s.center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WorldConfig {
        let mut cfg = WorldConfig::default();
        cfg.width = 512;
        cfg.height = 512;
        cfg.chunk_size = 128;
        cfg.sync_radius = 1;
        cfg.buffer_radius = 2;
        cfg.max_chunk_sync_per_tick = 2;
        cfg
    }

    #[test]
    fn connect_queues_every_chunk_in_sync_radius() {
        let cfg = config();
        let mut idx = ChunkIndex::new(cfg.chunks_x(), cfg.chunks_y());
        let mut interest = InterestManager::new(&cfg);
        interest.connect(&mut idx, "p1".to_string(), ChunkPos::new(1, 1));
        assert_eq!(interest.active_chunk_count(&"p1".to_string()), 9);
    }

    #[test]
    fn flush_respects_the_per_tick_budget() {
        let cfg = config();
        let mut idx = ChunkIndex::new(cfg.chunks_x(), cfg.chunks_y());
        let mut interest = InterestManager::new(&cfg);
        interest.connect(&mut idx, "p1".to_string(), ChunkPos::new(1, 1));
        let first = interest.flush(&idx);
        assert_eq!(first.len(), 2);
        let second = interest.flush(&idx);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn dirty_chunk_is_requeued_once_version_advances() {
        let cfg = config();
        let mut idx = ChunkIndex::new(cfg.chunks_x(), cfg.chunks_y());
        let mut interest = InterestManager::new(&cfg);
        interest.connect(&mut idx, "p1".to_string(), ChunkPos::new(1, 1));
        while !interest.flush(&idx).is_empty() {}
        idx.bump(ChunkPos::new(1, 1));
        interest.scan_for_dirty_chunks(&idx);
        let resyncs = interest.flush(&idx);
        assert!(resyncs.iter().any(|r| r.pos == ChunkPos::new(1, 1)));
    }

    #[test]
    fn disconnect_removes_all_subscriptions() {
        let cfg = config();
        let mut idx = ChunkIndex::new(cfg.chunks_x(), cfg.chunks_y());
        let mut interest = InterestManager::new(&cfg);
        let id: SubscriberId = "p1".to_string();
        interest.connect(&mut idx, id.clone(), ChunkPos::new(1, 1));
        interest.disconnect(&mut idx, &id);
        assert!(!interest.is_subscribed(&id));
        assert!(idx.subscribers(ChunkPos::new(1, 1)).is_empty());
    }
}
