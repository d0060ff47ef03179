//! State broadcaster (spec §4.7): diffs players/projectiles against the last
//! broadcast snapshot, drains terrain chunk diffs for subscribed chunks, and
//! assembles the throttled sand stream and full chunk-sync payloads.

use std::collections::HashMap;

use arena_proto::outbound::{
    ChunkDiff, ChunkPixelDiff, ChunkSync, PixelDiff, PlayerDelta, ProjectileDelta, SandChunk, SandParticleWire, SandUpdate,
    StateMessage, TerrainMod, WorldStats,
};
use arena_proto::SubscriberId;

use crate::coords::ChunkPos;
use crate::interest::PendingResync;
use crate::kinematics::Projectile;
use crate::world::{TickEvents, World};

#[derive(Clone, Copy, PartialEq)]
struct PlayerSnapshot {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    health: f32,
    alive: bool,
    aim_angle: f32,
    selected_spell: u8,
    last_input: u64,
}

#[derive(Clone, Copy, PartialEq)]
struct ProjectileSnapshot {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
}

pub struct Broadcaster {
    last_players: HashMap<String, PlayerSnapshot>,
    last_projectiles: HashMap<String, ProjectileSnapshot>,
    last_flushed_mod_tick: Option<u64>,
    sand_tick_counter: u32,
    next_chunk_diff_id: u64,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

fn projectile_key(projectile: &Projectile) -> String {
    if projectile.server_id != 0 {
        projectile.server_id.to_string()
    } else {
        projectile.client_projectile_id.map(|id| id.to_string()).unwrap_or_default()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            last_players: HashMap::new(),
            last_projectiles: HashMap::new(),
            last_flushed_mod_tick: None,
            sand_tick_counter: 0,
            next_chunk_diff_id: 1,
        }
    }

    /// Builds this tick's `state` message: only players/projectiles whose
    /// fields changed since the last broadcast carry `Some` values.
    pub fn build_state(&mut self, world: &mut World, events: &TickEvents, disconnected: &[String]) -> StateMessage {
        let players_full = self.last_players.is_empty() && !world.players.is_empty();
        let mut player_ids: Vec<&String> = world.players.keys().collect();
        player_ids.sort();

        let mut players = Vec::new();
        for id in player_ids {
            let player = &world.players[id];
            let snapshot = PlayerSnapshot {
                x: player.x,
                y: player.y,
                vx: player.vx,
                vy: player.vy,
                health: player.health,
                alive: player.alive,
                aim_angle: player.aim_angle,
                selected_spell: player.selected_spell,
                last_input: player.last_input_sequence,
            };
            let previous = self.last_players.get(id).copied();
            if previous == Some(snapshot) {
                continue;
            }
            let full = previous.is_none();
            let chunk_key = if full {
                Some(world.terrain.chunk_pos_for(player.x as i64, player.y as i64).to_wire())
            } else {
                None
            };
            players.push(PlayerDelta {
                player_id: id.clone(),
                x: (full || previous.map(|p| p.x != snapshot.x).unwrap_or(true)).then_some(snapshot.x),
                y: (full || previous.map(|p| p.y != snapshot.y).unwrap_or(true)).then_some(snapshot.y),
                vx: (full || previous.map(|p| p.vx != snapshot.vx).unwrap_or(true)).then_some(snapshot.vx),
                vy: (full || previous.map(|p| p.vy != snapshot.vy).unwrap_or(true)).then_some(snapshot.vy),
                health: (full || previous.map(|p| p.health != snapshot.health).unwrap_or(true)).then_some(snapshot.health),
                alive: (full || previous.map(|p| p.alive != snapshot.alive).unwrap_or(true)).then_some(snapshot.alive),
                aim_angle: (full || previous.map(|p| p.aim_angle != snapshot.aim_angle).unwrap_or(true)).then_some(snapshot.aim_angle),
                selected_spell: (full || previous.map(|p| p.selected_spell != snapshot.selected_spell).unwrap_or(true))
                    .then_some(snapshot.selected_spell),
                last_processed_input: (full || previous.map(|p| p.last_input != snapshot.last_input).unwrap_or(true))
                    .then_some(snapshot.last_input),
                chunk_key,
            });
            self.last_players.insert(id.clone(), snapshot);
        }

        let projectiles_full = self.last_projectiles.is_empty() && !world.projectiles.is_empty();
        let mut projectiles = Vec::new();
        for projectile in &world.projectiles {
            let key = projectile_key(projectile);
            let snapshot = ProjectileSnapshot {
                x: projectile.x,
                y: projectile.y,
                vx: projectile.vx,
                vy: projectile.vy,
            };
            let previous = self.last_projectiles.get(&key).copied();
            if previous == Some(snapshot) {
                continue;
            }
            let full = previous.is_none();
            projectiles.push(ProjectileDelta {
                id: key.clone(),
                x: (full || previous.map(|p| p.x != snapshot.x).unwrap_or(true)).then_some(snapshot.x),
                y: (full || previous.map(|p| p.y != snapshot.y).unwrap_or(true)).then_some(snapshot.y),
                vx: (full || previous.map(|p| p.vx != snapshot.vx).unwrap_or(true)).then_some(snapshot.vx),
                vy: (full || previous.map(|p| p.vy != snapshot.vy).unwrap_or(true)).then_some(snapshot.vy),
                spell_type: full.then(|| projectile.kind.name().to_string()),
            });
            self.last_projectiles.insert(key, snapshot);
        }

        for id in &events.removed_projectiles {
            self.last_projectiles.remove(id);
        }
        for id in disconnected {
            self.last_players.remove(id);
        }

        let terrain_mods: Vec<TerrainMod> = world
            .terrain_mod_history_since(self.last_flushed_mod_tick)
            .into_iter()
            .collect();
        if let Some(last) = terrain_mods.last() {
            self.last_flushed_mod_tick = Some(last.tick);
        }

        let terrain_chunk_diffs = drain_subscribed_chunk_diffs(world);

        let mut removed_players = events.removed_players.clone();
        removed_players.extend(disconnected.iter().cloned());

        StateMessage {
            tick: world.tick,
            seed: world.config.seed,
            players,
            projectiles,
            terrain_mods,
            terrain_chunk_diffs: (!terrain_chunk_diffs.is_empty()).then_some(terrain_chunk_diffs),
            removed_players,
            removed_projectiles: events.removed_projectiles.clone(),
            players_full,
            projectiles_full,
            server_stats: WorldStats {
                tick_duration_ms: 0.0,
                active_particles: world.sand.len() as u32,
                active_subscribers: world.interest.len() as u32,
                occupancy_repairs: world.occupancy_repairs,
                chunk_index_repairs: world.chunk_index_repairs,
            },
        }
    }

    /// Builds the throttled `sand_update` stream; `None` when it is not this
    /// tick's turn (spec §4.7 `sandBroadcastInterval`).
    pub fn maybe_build_sand_update(&mut self, world: &World, interval: u32) -> Option<SandUpdate> {
        self.sand_tick_counter += 1;
        if self.sand_tick_counter < interval {
            return None;
        }
        self.sand_tick_counter = 0;
        let chunks: Vec<SandChunk> = world
            .sand
            .active_chunk_positions()
            .map(|pos| SandChunk {
                key: pos.to_wire(),
                particles: world
                    .sand
                    .particles_in(pos)
                    .iter()
                    .map(|p| SandParticleWire {
                        x: p.x,
                        y: p.y,
                        material: p.material.0,
                        color: 0,
                        vx: Some(p.vx),
                        vy: Some(p.vy),
                    })
                    .collect(),
            })
            .filter(|chunk| !chunk.particles.is_empty())
            .collect();
        if chunks.is_empty() {
            return None;
        }
        Some(SandUpdate {
            chunk_size: world.config.chunk_size,
            chunks,
            full: false,
        })
    }

    /// Builds full chunk resyncs for the positions the interest manager just
    /// flushed (spec §4.6): whole-chunk pixel + sand snapshots, not diffs.
    pub fn build_chunk_syncs(&mut self, world: &World, resyncs: &[PendingResync]) -> HashMap<SubscriberId, ChunkSync> {
        let mut by_subscriber: HashMap<SubscriberId, Vec<ChunkPos>> = HashMap::new();
        for resync in resyncs {
            by_subscriber.entry(resync.subscriber.clone()).or_default().push(resync.pos);
        }

        let mut out = HashMap::new();
        for (subscriber, positions) in by_subscriber {
            let id = self.next_chunk_diff_id;
            self.next_chunk_diff_id += 1;
            let chunks: Vec<ChunkPixelDiff> = positions.iter().map(|pos| full_chunk_pixel_diff(world, *pos)).collect();
            let sand_chunks: Vec<SandChunk> = positions
                .iter()
                .map(|pos| SandChunk {
                    key: pos.to_wire(),
                    particles: world
                        .sand
                        .particles_in(*pos)
                        .iter()
                        .map(|p| SandParticleWire {
                            x: p.x,
                            y: p.y,
                            material: p.material.0,
                            color: 0,
                            vx: Some(p.vx),
                            vy: Some(p.vy),
                        })
                        .collect(),
                })
                .collect();

            out.insert(
                subscriber,
                ChunkSync {
                    terrain: Some(ChunkDiff {
                        id,
                        tick: world.tick,
                        chunk_size: world.config.chunk_size,
                        chunks,
                    }),
                    sand_chunks: Some(SandUpdate {
                        chunk_size: world.config.chunk_size,
                        chunks: sand_chunks,
                        full: true,
                    }),
                },
            );
        }
        out
    }
}

fn full_chunk_pixel_diff(world: &World, pos: ChunkPos) -> ChunkPixelDiff {
    let chunk_size = world.config.chunk_size;
    let base_x = pos.cx * chunk_size;
    let base_y = pos.cy * chunk_size;
    let mut pixels = Vec::with_capacity((chunk_size * chunk_size) as usize);
    for ly in 0..chunk_size {
        let y = base_y + ly;
        if y >= world.config.height {
            continue;
        }
        for lx in 0..chunk_size {
            let x = base_x + lx;
            if x >= world.config.width {
                continue;
            }
            let pixel = world.terrain.get_pixel(x as i64, y as i64);
            pixels.push(PixelDiff {
                local_index: ly * chunk_size + lx,
                material: pixel.material.0,
            });
        }
    }
    ChunkPixelDiff { key: pos.to_wire(), pixels }
}

fn drain_subscribed_chunk_diffs(world: &mut World) -> Vec<ChunkPixelDiff> {
    let positions: Vec<ChunkPos> = world.chunk_index.all_positions().collect();
    let mut out = Vec::new();
    for pos in positions {
        if world.chunk_index.subscribers(pos).is_empty() {
            world.chunk_index.drain_pending_pixels(pos);
            continue;
        }
        let pending = world.chunk_index.drain_pending_pixels(pos);
        if pending.is_empty() {
            continue;
        }
        out.push(ChunkPixelDiff {
            key: pos.to_wire(),
            pixels: pending.into_iter().map(|p| PixelDiff { local_index: p.local_index, material: p.material.0 }).collect(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_proto::config::WorldConfig;

    fn test_config() -> WorldConfig {
        let mut cfg = WorldConfig::default();
        cfg.width = 128;
        cfg.height = 128;
        cfg.chunk_size = 32;
        cfg.seed = 3;
        cfg
    }

    #[test]
    fn first_broadcast_is_full_for_every_connected_player() {
        let mut world = World::new(test_config());
        world.on_connect("p1".to_string());
        let mut broadcaster = Broadcaster::new();
        let events = TickEvents::default();
        let state = broadcaster.build_state(&mut world, &events, &[]);
        assert!(state.players_full);
        assert_eq!(state.players.len(), 1);
        assert!(state.players[0].x.is_some());
    }

    #[test]
    fn unchanged_player_produces_no_second_delta() {
        let mut world = World::new(test_config());
        world.on_connect("p1".to_string());
        let mut broadcaster = Broadcaster::new();
        let events = TickEvents::default();
        broadcaster.build_state(&mut world, &events, &[]);
        let second = broadcaster.build_state(&mut world, &events, &[]);
        assert!(second.players.is_empty());
    }

    #[test]
    fn sand_update_is_none_until_the_interval_elapses() {
        let world = World::new(test_config());
        let mut broadcaster = Broadcaster::new();
        assert!(broadcaster.maybe_build_sand_update(&world, 3).is_none());
        assert!(broadcaster.maybe_build_sand_update(&world, 3).is_none());
        assert!(broadcaster.maybe_build_sand_update(&world, 3).is_none());
    }
}
