//! Falling-sand cellular automaton (spec §4.3): pooled particles bucketed by
//! chunk, classified by local openness, and advanced on an adaptive
//! per-particle schedule.

pub mod particle;

use std::collections::{BTreeSet, HashMap, HashSet};

use rayon::prelude::*;
use tracing::warn;

use crate::chunk_index::ChunkIndex;
use crate::coords::{self, ChunkPos};
use crate::material::{ids, Materials};
use crate::prng::Prng;
use crate::terrain::{DetachedPixel, Terrain};

pub use particle::{Activity, SandParticle};

/// Hard cap on particles spawned from a single destruction (spec §4.3).
const SPAWN_CAP_PER_DESTROY: usize = 500;
/// Particles whose chunk holds at least this many liquid particles of the
/// same kind are eligible to form a blob (spec §4.3).
const BLOB_MIN_LIQUID_COUNT: usize = 24;
/// ...and at least this fraction of them must classify as BULK.
const BLOB_MIN_BULK_RATIO: f32 = 0.4;

pub struct Sand {
    chunk_size: u32,
    width: u32,
    height: u32,
    max_particles: usize,
    buckets: HashMap<ChunkPos, Vec<SandParticle>>,
    total: usize,
    cursor: u64,
}

impl Sand {
    pub fn new(width: u32, height: u32, chunk_size: u32, max_particles: usize) -> Self {
        Self {
            chunk_size,
            width,
            height,
            max_particles,
            buckets: HashMap::new(),
            total: 0,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn chunk_of(&self, x: i64, y: i64) -> ChunkPos {
        coords::to_chunk_and_local(coords::wrap_x(x, self.width), coords::clamp_y(y, self.height), self.chunk_size).0
    }

    /// Inserts a particle into its chunk bucket, maintaining the
    /// `bucket[p.chunk_index] == p` invariant, and bumps the bucket's chunk
    /// version so subscribers pick up the new particle on the sand stream.
    fn insert(&mut self, chunk_index: &mut ChunkIndex, mut particle: SandParticle) {
        let pos = self.chunk_of(particle.x, particle.y);
        let bucket = self.buckets.entry(pos).or_default();
        particle.chunk_index = bucket.len();
        bucket.push(particle);
        self.total += 1;
        chunk_index.bump(pos);
    }

    /// Removes the particle at `(pos, idx)` via swap-remove, keeping the
    /// bucket dense and the swapped-in particle's `chunk_index` consistent.
    fn remove(&mut self, pos: ChunkPos, idx: usize) -> SandParticle {
        let bucket = self.buckets.get_mut(&pos).expect("bucket exists for occupied particle");
        let removed = bucket.swap_remove(idx);
        if let Some(moved) = bucket.get_mut(idx) {
            moved.chunk_index = idx;
        }
        self.total -= 1;
        removed
    }

    /// Converts up to `min(available_slots, 500)` dislodged pixels into
    /// particles (spec §4.3). When there are more candidates than the cap,
    /// sampling is a deterministic PRNG shuffle-and-take so replay is
    /// reproducible. `explosive` biases `drift` toward the wrap-shortest
    /// x-direction away from `origin`.
    pub fn spawn_from_pixels(
        &mut self,
        chunk_index: &mut ChunkIndex,
        materials: &Materials,
        rng: &mut Prng,
        detached: &[DetachedPixel],
        origin: (i64, i64),
        explosive: bool,
    ) -> usize {
        let available = self.max_particles.saturating_sub(self.total);
        let cap = available.min(SPAWN_CAP_PER_DESTROY);
        if cap == 0 || detached.is_empty() {
            if !detached.is_empty() {
                warn!(target: "arena_sim::sand", dropped = detached.len(), "sand pool exhausted, spawn capped to zero");
            }
            return 0;
        }

        let mut indices: Vec<usize> = (0..detached.len()).collect();
        if indices.len() > cap {
            // Fisher-Yates partial shuffle via the world PRNG: deterministic
            // given the same seed and call order.
            for i in 0..cap {
                let j = i + rng.next_int((indices.len() - i) as u32) as usize;
                indices.swap(i, j);
            }
            indices.truncate(cap);
        }

        let spawned = indices.len();
        for i in indices {
            let pixel = detached[i];
            let density = materials.get(pixel.material).density;
            let is_liquid = materials.is_liquid(pixel.material);
            let drift = if explosive {
                let delta = coords::wrap_shortest_delta(pixel.x, origin.0, self.width);
                delta.signum() as i8
            } else {
                (rng.next_int(3) as i8) - 1
            };
            let particle = SandParticle::new(pixel.x, pixel.y, pixel.material, is_liquid, density, drift);
            self.insert(chunk_index, particle);
        }
        spawned
    }

    fn open(&self, terrain: &Terrain, materials: &Materials, occupancy: &HashSet<(i64, i64)>, x: i64, y: i64) -> bool {
        let x = coords::wrap_x(x, self.width);
        if y < 0 || y >= self.height as i64 {
            return false;
        }
        !terrain.is_solid(x, y, materials) && !occupancy.contains(&(x, y))
    }

    fn classify(&self, terrain: &Terrain, materials: &Materials, occupancy: &HashSet<(i64, i64)>, x: i64, y: i64) -> Activity {
        let down = self.open(terrain, materials, occupancy, x, y + 1);
        let down_l = self.open(terrain, materials, occupancy, x - 1, y + 1);
        let down_r = self.open(terrain, materials, occupancy, x + 1, y + 1);
        if down || down_l || down_r {
            return Activity::Edge;
        }
        let left = self.open(terrain, materials, occupancy, x - 1, y);
        let right = self.open(terrain, materials, occupancy, x + 1, y);
        if left || right {
            Activity::Shell
        } else {
            Activity::Bulk
        }
    }

    /// One cellular-automaton tick (spec §4.3 steps 1-6). `active_chunks` is
    /// the compute ring (spec §4.6): particles outside it still accrue
    /// `rest_time_ms` but are not scheduled or moved this tick.
    ///
    /// Ordered (not a `HashSet`) so that same-tick contention between
    /// particles from different chunks resolves in chunk-key lexicographic
    /// order (spec §4.1, §4.6), not process-local hasher order.
    pub fn update(
        &mut self,
        terrain: &mut Terrain,
        chunk_index: &mut ChunkIndex,
        materials: &Materials,
        rng: &mut Prng,
        tick: u64,
        dt_ms: f32,
        active_chunks: &BTreeSet<ChunkPos>,
    ) {
        // 1. Occupancy map over active chunks only.
        let mut occupancy: HashSet<(i64, i64)> = HashSet::new();
        for pos in active_chunks {
            if let Some(bucket) = self.buckets.get(pos) {
                for p in bucket {
                    occupancy.insert((p.x, p.y));
                }
            }
        }

        // 2. Classification + blob detection, grouped by chunk. Each chunk's
        // classification only reads the (already-built) occupancy map, so
        // chunks classify independently in parallel; the chunk-keyed map
        // they land in is consumed below strictly by iterating the ordered
        // `active_chunks` set, so scheduling order stays deterministic.
        let classifications: HashMap<ChunkPos, Vec<Activity>> = active_chunks
            .par_iter()
            .filter_map(|pos| {
                self.buckets.get(pos).map(|bucket| {
                    let activities: Vec<Activity> =
                        bucket.iter().map(|p| self.classify(terrain, materials, &occupancy, p.x, p.y)).collect();
                    (*pos, activities)
                })
            })
            .collect();

        let mut blob_chunks: HashSet<ChunkPos> = HashSet::new();
        for pos in active_chunks {
            let Some(bucket) = self.buckets.get(pos) else { continue };
            let activities = &classifications[pos];
            let liquid_count = bucket.iter().filter(|p| p.is_liquid).count();
            if liquid_count < BLOB_MIN_LIQUID_COUNT {
                continue;
            }
            let bulk_liquid = bucket
                .iter()
                .zip(activities)
                .filter(|(p, a)| p.is_liquid && **a == Activity::Bulk)
                .count();
            if bulk_liquid as f32 / liquid_count as f32 >= BLOB_MIN_BULK_RATIO {
                blob_chunks.insert(*pos);
            }
        }

        // 3. Schedule: stamp next_update_tick for particles due this round,
        // remembering which ones were due so step 4 can select them without
        // re-deriving "due" from the now-advanced schedule.
        let mut due: HashMap<ChunkPos, Vec<bool>> = HashMap::new();
        for pos in active_chunks {
            let Some(bucket) = self.buckets.get_mut(pos) else { continue };
            let activities = &classifications[pos];
            let is_blob = blob_chunks.contains(pos);
            let mut due_flags = vec![false; bucket.len()];
            for ((p, activity), was_due) in bucket.iter_mut().zip(activities).zip(due_flags.iter_mut()) {
                p.rest_time_ms += dt_ms;
                if p.next_update_tick <= tick {
                    *was_due = true;
                    p.blob_id = if is_blob && p.is_liquid && *activity == Activity::Bulk {
                        Some(pos.cx as u64 * 1_000_003 + pos.cy as u64)
                    } else {
                        None
                    };
                    let interval = particle::schedule_interval(p.is_liquid, *activity, p.blob_id.is_some());
                    p.next_update_tick = tick + interval;
                }
            }
            due.insert(*pos, due_flags);
        }

        // 4. Move resolution, priority EDGE -> SHELL -> BULK, rotating
        // cursor for tie-break fairness across ticks.
        self.cursor = self.cursor.wrapping_add(1);
        let mut candidates: Vec<(ChunkPos, usize, Activity)> = Vec::new();
        for pos in active_chunks {
            let Some(activities) = classifications.get(pos) else { continue };
            let Some(due_flags) = due.get(pos) else { continue };
            for (idx, activity) in activities.iter().enumerate() {
                if due_flags[idx] {
                    candidates.push((*pos, idx, *activity));
                }
            }
        }
        candidates.sort_by_key(|(_, _, activity)| match activity {
            Activity::Edge => 0,
            Activity::Shell => 1,
            Activity::Bulk => 2,
        });
        let rotate = if candidates.is_empty() { 0 } else { (self.cursor as usize) % candidates.len() };
        candidates.rotate_left(rotate);

        let mut welds: Vec<(i64, i64, crate::material::MaterialId)> = Vec::new();
        let mut migrations: Vec<(ChunkPos, usize, ChunkPos)> = Vec::new();
        let mut moved_positions: HashSet<(i64, i64)> = occupancy.clone();

        for (pos, idx, _activity) in candidates {
            let Some(bucket) = self.buckets.get_mut(&pos) else { continue };
            let Some(p) = bucket.get_mut(idx) else { continue };
            moved_positions.remove(&(p.x, p.y));

            let down = (p.x, p.y + 1);
            let parity = rng.next_bool();
            let (first_diag, second_diag) = match p.drift {
                d if d > 0 => ((p.x + 1, p.y + 1), (p.x - 1, p.y + 1)),
                d if d < 0 => ((p.x - 1, p.y + 1), (p.x + 1, p.y + 1)),
                _ if parity => ((p.x - 1, p.y + 1), (p.x + 1, p.y + 1)),
                _ => ((p.x + 1, p.y + 1), (p.x - 1, p.y + 1)),
            };

            let mut dest = None;
            for cand in [down, first_diag, second_diag] {
                if self.open(terrain, materials, &moved_positions, cand.0, cand.1) {
                    dest = Some(cand);
                    break;
                }
            }

            if dest.is_none() && p.drift != 0 {
                let sideways = (p.x + p.drift as i64, p.y);
                if self.open(terrain, materials, &moved_positions, sideways.0, sideways.1) {
                    dest = Some(sideways);
                }
            }

            if p.is_liquid && dest.is_none() {
                for side in [(p.x + 1, p.y), (p.x - 1, p.y)] {
                    if self.open(terrain, materials, &moved_positions, side.0, side.1) {
                        dest = Some(side);
                        break;
                    }
                }
            }

            match dest {
                Some((nx, ny)) => {
                    let wrapped_x = coords::wrap_x(nx, self.width);
                    p.rest_time_ms = 0.0;
                    p.x = wrapped_x;
                    p.y = ny;
                    moved_positions.insert((wrapped_x, ny));

                    let new_chunk = self.chunk_of(wrapped_x, ny);
                    if new_chunk != pos {
                        migrations.push((pos, idx, new_chunk));
                    }
                }
                None => {
                    let down_blocked = !self.open(terrain, materials, &moved_positions, p.x, p.y + 1);
                    if down_blocked && p.is_supported() {
                        welds.push((p.x, p.y, p.material));
                        p.y = -1; // marked dead, reaped below
                    } else {
                        moved_positions.insert((p.x, p.y));
                    }
                }
            }
        }

        // 5. Chunk migration: remove-then-insert, preserving the dense
        // bucket invariant via swap-remove.
        migrations.sort_by(|a, b| b.1.cmp(&a.1)); // highest index first per source bucket
        for (from, idx, to) in migrations {
            if self.buckets.get(&from).and_then(|b| b.get(idx)).map(|p| p.y) == Some(-1) {
                continue; // already welded this tick
            }
            let particle = self.remove(from, idx);
            self.insert(chunk_index, particle);
            chunk_index.bump(to);
        }

        // Weld into terrain, never overwriting BEDROCK (spec §4.3 invariant).
        for (x, y, material) in welds {
            self.weld(terrain, chunk_index, materials, x, y, material);
        }

        // 6. Reap particles marked dead (`y == -1`) or that fell past the
        // bottom of the grid.
        self.reap(chunk_index);
    }

    fn weld(&self, terrain: &mut Terrain, chunk_index: &mut ChunkIndex, materials: &Materials, x: i64, y: i64, material: crate::material::MaterialId) {
        let mut climb_y = y;
        loop {
            if climb_y < 0 {
                return; // nothing to weld onto, drop silently
            }
            let current = terrain.get_pixel(x, climb_y);
            if current.material == ids::BEDROCK {
                climb_y -= 1;
                continue;
            }
            if !materials.is_solid(current.material) {
                terrain.set_pixel(chunk_index, x, climb_y, material, 0);
                return;
            }
            climb_y -= 1;
        }
    }

    fn reap(&mut self, chunk_index: &mut ChunkIndex) {
        let positions: Vec<ChunkPos> = self.buckets.keys().copied().collect();
        for pos in positions {
            let mut i = 0;
            let mut touched = false;
            if let Some(bucket) = self.buckets.get_mut(&pos) {
                while i < bucket.len() {
                    let dead = bucket[i].y < 0 || bucket[i].y >= self.height as i64;
                    if dead {
                        bucket.swap_remove(i);
                        if let Some(moved) = bucket.get_mut(i) {
                            moved.chunk_index = i;
                        }
                        self.total -= 1;
                        touched = true;
                    } else {
                        i += 1;
                    }
                }
            }
            if touched {
                chunk_index.bump(pos);
            }
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
    }

    /// All particles currently resident in `pos`'s bucket, for the
    /// broadcaster's sand stream.
    pub fn particles_in(&self, pos: ChunkPos) -> &[SandParticle] {
        self.buckets.get(&pos).map_or(&[], Vec::as_slice)
    }

    pub fn active_chunk_positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.buckets.keys().copied()
    }
}
