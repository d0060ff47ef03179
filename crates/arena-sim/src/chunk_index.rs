//! Per-chunk version counters and pending-modification buffers (spec §3,
//! §4.6). Pure bookkeeping: this module does not know what a subscriber is
//! beyond an opaque id, and does not decide *when* to resync — that policy
//! lives in [`crate::interest`].

use std::collections::HashSet;

use arena_proto::SubscriberId;

use crate::coords::ChunkPos;
use crate::material::MaterialId;

/// A single pixel write queued for broadcast as part of a chunk diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPixel {
    pub local_index: u32,
    pub material: MaterialId,
}

#[derive(Debug, Default)]
struct ChunkRecord {
    version: u64,
    pending_pixels: Vec<PendingPixel>,
    subscribers: HashSet<SubscriberId>,
}

/// Dense `(cx, cy)`-indexed table of chunk bookkeeping records.
#[derive(Debug)]
pub struct ChunkIndex {
    chunks_x: u32,
    chunks_y: u32,
    records: Vec<ChunkRecord>,
}

impl ChunkIndex {
    pub fn new(chunks_x: u32, chunks_y: u32) -> Self {
        let count = (chunks_x as usize) * (chunks_y as usize);
        let mut records = Vec::with_capacity(count);
        records.resize_with(count, || ChunkRecord {
            version: 1,
            pending_pixels: Vec::new(),
            subscribers: HashSet::new(),
        });
        Self {
            chunks_x,
            chunks_y,
            records,
        }
    }

    pub fn chunks_x(&self) -> u32 {
        self.chunks_x
    }

    pub fn chunks_y(&self) -> u32 {
        self.chunks_y
    }

    fn slot(&self, pos: ChunkPos) -> usize {
        debug_assert!(pos.cx < self.chunks_x && pos.cy < self.chunks_y);
        pos.cy as usize * self.chunks_x as usize + pos.cx as usize
    }

    pub fn version(&self, pos: ChunkPos) -> u64 {
        self.records[self.slot(pos)].version
    }

    /// Bumps the chunk's monotone version counter and returns the new value.
    pub fn bump(&mut self, pos: ChunkPos) -> u64 {
        let idx = self.slot(pos);
        self.records[idx].version += 1;
        self.records[idx].version
    }

    pub fn push_pending_pixel(&mut self, pos: ChunkPos, local_index: u32, material: MaterialId) {
        let idx = self.slot(pos);
        self.records[idx]
            .pending_pixels
            .push(PendingPixel { local_index, material });
    }

    /// Drains and returns the chunk's queued pixel writes since the last drain.
    pub fn drain_pending_pixels(&mut self, pos: ChunkPos) -> Vec<PendingPixel> {
        let idx = self.slot(pos);
        std::mem::take(&mut self.records[idx].pending_pixels)
    }

    pub fn subscribers(&self, pos: ChunkPos) -> &HashSet<SubscriberId> {
        &self.records[self.slot(pos)].subscribers
    }

    pub fn subscribe(&mut self, pos: ChunkPos, id: SubscriberId) {
        let idx = self.slot(pos);
        self.records[idx].subscribers.insert(id);
    }

    pub fn unsubscribe(&mut self, pos: ChunkPos, id: &SubscriberId) {
        let idx = self.slot(pos);
        self.records[idx].subscribers.remove(id);
    }

    pub fn all_positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        let chunks_x = self.chunks_x;
        (0..self.records.len()).map(move |i| ChunkPos::new(i as u32 % chunks_x, i as u32 / chunks_x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_starts_at_one_and_is_monotone() {
        let mut idx = ChunkIndex::new(4, 4);
        let pos = ChunkPos::new(1, 2);
        assert_eq!(idx.version(pos), 1);
        assert_eq!(idx.bump(pos), 2);
        assert_eq!(idx.bump(pos), 3);
        assert_eq!(idx.version(pos), 3);
    }

    #[test]
    fn bumping_one_chunk_does_not_affect_neighbors() {
        let mut idx = ChunkIndex::new(4, 4);
        idx.bump(ChunkPos::new(0, 0));
        assert_eq!(idx.version(ChunkPos::new(1, 0)), 1);
    }

    #[test]
    fn subscribe_and_unsubscribe_round_trip() {
        let mut idx = ChunkIndex::new(2, 2);
        let pos = ChunkPos::new(0, 0);
        let id: SubscriberId = "player-1".to_string();
        idx.subscribe(pos, id.clone());
        assert!(idx.subscribers(pos).contains(&id));
        idx.unsubscribe(pos, &id);
        assert!(!idx.subscribers(pos).contains(&id));
    }

    #[test]
    fn pending_pixels_drain_once() {
        let mut idx = ChunkIndex::new(2, 2);
        let pos = ChunkPos::new(0, 0);
        idx.push_pending_pixel(pos, 5, MaterialId(1));
        let drained = idx.drain_pending_pixels(pos);
        assert_eq!(drained.len(), 1);
        assert!(idx.drain_pending_pixels(pos).is_empty());
    }
}
