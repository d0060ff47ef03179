//! The simulation singleton (spec §3 "World"): owns every subsystem and
//! exposes the three boundary operations (`on_connect`/`on_message`/
//! `on_disconnect`) a transport drives, plus the per-tick `step`.

use std::collections::{HashMap, VecDeque};

use arena_proto::config::WorldConfig;
use arena_proto::inbound::{InboundMessage, PlayerInput};
use arena_proto::outbound::{OutboundMessage, TerrainMod, Welcome};
use arena_proto::SubscriberId;

use crate::chunk_index::ChunkIndex;
use crate::coords;
use crate::interest::{self, InterestManager, PendingResync};
use crate::kinematics::projectile::{ProjectileOutcome, SpellKind};
use crate::kinematics::{Player, Projectile};
use crate::material::Materials;
use crate::prng::Prng;
use crate::sand::Sand;
use crate::terrain::Terrain;

/// How many recent destructions a freshly-connecting client is briefed on,
/// so their local prediction can reconcile craters that happened before
/// their terrain snapshot was taken (spec §6 `Welcome.terrainMods`).
const TERRAIN_MOD_HISTORY: usize = 64;
const SPAWN_X_MIN: f32 = 400.0;
const SPAWN_X_MAX: f32 = 1200.0;
const SPAWN_Y: f32 = 100.0;

#[derive(Default)]
pub struct TickEvents {
    pub exploded: Vec<(i64, i64, f32, bool)>,
    pub removed_players: Vec<String>,
    pub removed_projectiles: Vec<String>,
}

impl TickEvents {
    /// Folds another tick's events in, for callers that advance several
    /// substeps before reporting to a broadcaster (spec §4.5).
    pub fn merge(&mut self, other: TickEvents) {
        self.exploded.extend(other.exploded);
        self.removed_players.extend(other.removed_players);
        self.removed_projectiles.extend(other.removed_projectiles);
    }
}

pub struct World {
    pub config: WorldConfig,
    pub materials: Materials,
    pub terrain: Terrain,
    pub chunk_index: ChunkIndex,
    pub sand: Sand,
    pub rng: Prng,
    pub players: HashMap<String, Player>,
    pub projectiles: Vec<Projectile>,
    pub interest: InterestManager,
    pub tick: u64,
    pub occupancy_repairs: u64,
    pub chunk_index_repairs: u64,
    next_projectile_id: u64,
    pending_input: HashMap<String, PlayerInput>,
    terrain_mod_history: VecDeque<TerrainMod>,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        let materials = Materials::new();
        let mut terrain = Terrain::new(config.width, config.height, config.chunk_size);
        let mut chunk_index = ChunkIndex::new(config.chunks_x(), config.chunks_y());
        terrain.generate(&mut chunk_index, config.seed);
        let sand = Sand::new(config.width, config.height, config.chunk_size, config.max_sand_particles);
        let interest = InterestManager::new(&config);
        let rng = Prng::new(config.seed);

        Self {
            materials,
            terrain,
            chunk_index,
            sand,
            rng,
            players: HashMap::new(),
            projectiles: Vec::new(),
            interest,
            tick: 0,
            occupancy_repairs: 0,
            chunk_index_repairs: 0,
            next_projectile_id: 1,
            pending_input: HashMap::new(),
            terrain_mod_history: VecDeque::new(),
            config,
        }
    }

    pub fn on_connect(&mut self, id: SubscriberId) -> Welcome {
        let mut spawn_rng = self.rng.fork(&format!("player:{id}"));
        let spawn_x = spawn_rng.next_range(SPAWN_X_MIN, SPAWN_X_MAX.min(self.config.width as f32 - 1.0));
        let player = Player::spawn(id.clone(), spawn_x, SPAWN_Y, 0);
        let center = self.terrain.chunk_pos_for(spawn_x as i64, SPAWN_Y as i64);
        self.interest.connect(&mut self.chunk_index, id.clone(), center);
        self.players.insert(id.clone(), player);

        Welcome {
            player_id: id,
            tick: self.tick,
            spawn_x,
            spawn_y: SPAWN_Y,
            selected_spell: 0,
            seed: self.config.seed,
            chunk_size: self.config.chunk_size,
            terrain_snapshot: self.terrain.serialize_snapshot(),
            terrain_mods: self.terrain_mod_history.iter().copied().collect(),
            sand_chunks: None,
            static_terrain: None,
        }
    }

    pub fn on_disconnect(&mut self, id: &SubscriberId) {
        self.players.remove(id);
        self.pending_input.remove(id);
        self.interest.disconnect(&mut self.chunk_index, id);
    }

    /// Handles one inbound message; returns any reply that must go back to
    /// the sender immediately rather than wait for the next state broadcast.
    pub fn on_message(&mut self, id: &SubscriberId, message: InboundMessage) -> Option<OutboundMessage> {
        match message {
            InboundMessage::Input { input } => {
                let sequence = input.sequence;
                self.pending_input.insert(id.clone(), input);
                Some(OutboundMessage::InputAck { sequence })
            }
            InboundMessage::Projectile {
                x,
                y,
                vx,
                vy,
                spell_type,
                client_projectile_id,
            } => {
                let kind = SpellKind::from_name(&spell_type);
                let mut projectile = Projectile::spawn(id.clone(), x, y, vx, vy, kind);
                projectile.server_id = self.next_projectile_id;
                projectile.client_projectile_id = client_projectile_id;
                self.next_projectile_id += 1;
                self.projectiles.push(projectile);
                None
            }
            InboundMessage::TerrainDestroy { x, y, radius, explosive } => {
                self.destroy_terrain(x, y, radius, explosive);
                None
            }
            InboundMessage::Ping { timestamp } => Some(OutboundMessage::Pong { timestamp }),
        }
    }

    fn destroy_terrain(&mut self, x: i64, y: i64, radius: f32, explosive: bool) {
        let detached = self.terrain.destroy(&mut self.chunk_index, &self.materials, x, y, radius);
        self.sand
            .spawn_from_pixels(&mut self.chunk_index, &self.materials, &mut self.rng, &detached, (x, y), explosive);
        self.push_terrain_mod(TerrainMod {
            tick: self.tick,
            x,
            y,
            radius,
            explosive,
        });
    }

    fn apply_damage(&mut self, damages: Vec<(String, f32)>, events: &mut TickEvents) {
        for (player_id, damage) in damages {
            if let Some(target) = self.players.get_mut(&player_id) {
                target.health = (target.health - damage).max(0.0);
                if target.health <= 0.0 && target.alive {
                    target.alive = false;
                    events.removed_players.push(player_id);
                }
            }
        }
    }

    fn push_terrain_mod(&mut self, modification: TerrainMod) {
        self.terrain_mod_history.push_back(modification);
        if self.terrain_mod_history.len() > TERRAIN_MOD_HISTORY {
            self.terrain_mod_history.pop_front();
        }
    }

    /// Terrain modifications recorded after `watermark` (exclusive), in
    /// chronological order; `None` returns the whole retained history.
    pub fn terrain_mod_history_since(&self, watermark: Option<u64>) -> Vec<TerrainMod> {
        match watermark {
            None => self.terrain_mod_history.iter().copied().collect(),
            Some(tick) => self.terrain_mod_history.iter().filter(|m| m.tick > tick).copied().collect(),
        }
    }

    /// Chunk-key lexicographic order (spec §4.6), so sand contention between
    /// chunks resolves deterministically rather than by hasher state.
    fn compute_ring(&self) -> std::collections::BTreeSet<coords::ChunkPos> {
        let mut ring = std::collections::BTreeSet::new();
        for player in self.players.values() {
            let center = self.terrain.chunk_pos_for(player.x as i64, player.y as i64);
            ring.extend(interest::chunks_in_radius(
                center,
                self.config.compute_radius,
                self.config.chunks_x(),
                self.config.chunks_y(),
            ));
        }
        ring
    }

    /// Advances the simulation by one fixed tick (spec §4.5). Subsystem order
    /// is fixed: players, then projectiles, then sand, then interest scan.
    pub fn step(&mut self, dt_ms: f32) -> TickEvents {
        let mut events = TickEvents::default();
        let default_input = PlayerInput {
            left: false,
            right: false,
            jump: false,
            shoot: false,
            mouse_x: 0.0,
            mouse_y: 0.0,
            sequence: 0,
            selected_spell: None,
        };

        let mut ids: Vec<String> = self.players.keys().cloned().collect();
        ids.sort();
        for id in &ids {
            let input = self.pending_input.remove(id).unwrap_or_else(|| PlayerInput {
                sequence: self.players[id].last_input_sequence,
                ..default_input
            });
            let spawned = {
                let player = self.players.get_mut(id).expect("id from players keys");
                player.step(&input, dt_ms, &self.terrain, &self.materials, self.config.width, self.config.height)
            };
            if let Some(mut projectile) = spawned {
                projectile.server_id = self.next_projectile_id;
                self.next_projectile_id += 1;
                self.projectiles.push(projectile);
            }
        }

        let player_positions: Vec<(String, f32, f32)> = self.players.values().map(|p| (p.id.clone(), p.x, p.y)).collect();
        let mut still_alive = Vec::with_capacity(self.projectiles.len());
        for mut projectile in std::mem::take(&mut self.projectiles) {
            let result = projectile.step(
                dt_ms,
                &self.terrain,
                &self.materials,
                self.config.width,
                self.config.height,
                &player_positions,
            );
            self.apply_damage(result.contact_hits, &mut events);
            match result.outcome {
                ProjectileOutcome::Alive => still_alive.push(projectile),
                ProjectileOutcome::Expired => {
                    events.removed_projectiles.push(projectile_key(&projectile));
                }
                ProjectileOutcome::Exploded { x, y } => {
                    let (detached, damages) = projectile.explode(
                        &mut self.terrain,
                        &mut self.chunk_index,
                        &self.materials,
                        x,
                        y,
                        self.config.width,
                        &player_positions,
                    );
                    self.sand
                        .spawn_from_pixels(&mut self.chunk_index, &self.materials, &mut self.rng, &detached, (x, y), true);
                    self.apply_damage(damages, &mut events);
                    self.push_terrain_mod(TerrainMod {
                        tick: self.tick,
                        x,
                        y,
                        radius: projectile.kind.explosion_radius(),
                        explosive: true,
                    });
                    events.exploded.push((x, y, projectile.kind.explosion_radius(), true));
                    events.removed_projectiles.push(projectile_key(&projectile));
                }
            }
        }
        self.projectiles = still_alive;

        let active_chunks = self.compute_ring();
        self.sand.update(
            &mut self.terrain,
            &mut self.chunk_index,
            &self.materials,
            &mut self.rng,
            self.tick,
            dt_ms,
            &active_chunks,
        );

        self.interest.scan_for_dirty_chunks(&self.chunk_index);
        self.tick += 1;
        events
    }

    /// Drains this tick's budgeted full-chunk resyncs (spec §4.6), for a
    /// caller that then turns them into `chunk_sync` payloads.
    pub fn flush_chunk_resyncs(&mut self) -> Vec<PendingResync> {
        self.interest.flush(&self.chunk_index)
    }
}

fn projectile_key(projectile: &Projectile) -> String {
    if projectile.server_id != 0 {
        projectile.server_id.to_string()
    } else {
        projectile
            .client_projectile_id
            .map(|id| id.to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> WorldConfig {
        let mut cfg = WorldConfig::default();
        cfg.width = 256;
        cfg.height = 256;
        cfg.chunk_size = 64;
        cfg.seed = 7;
        cfg
    }

    #[test]
    fn connect_spawns_within_the_configured_band() {
        let mut world = World::new(test_config());
        let welcome = world.on_connect("p1".to_string());
        assert!(welcome.spawn_x >= SPAWN_X_MIN && welcome.spawn_x < SPAWN_X_MAX);
        assert_eq!(welcome.spawn_y, SPAWN_Y);
        assert_eq!(welcome.terrain_snapshot.len(), (world.config.width * world.config.height) as usize);
    }

    #[test]
    fn same_seed_and_id_spawns_at_the_same_position() {
        let mut a = World::new(test_config());
        let mut b = World::new(test_config());
        let wa = a.on_connect("p1".to_string());
        let wb = b.on_connect("p1".to_string());
        assert_eq!(wa.spawn_x, wb.spawn_x);
    }

    #[test]
    fn ping_gets_an_immediate_pong() {
        let mut world = World::new(test_config());
        world.on_connect("p1".to_string());
        let id: SubscriberId = "p1".to_string();
        let reply = world.on_message(&id, InboundMessage::Ping { timestamp: 42 });
        assert!(matches!(reply, Some(OutboundMessage::Pong { timestamp: 42 })));
    }

    #[test]
    fn disconnect_removes_the_player_and_its_subscription() {
        let mut world = World::new(test_config());
        let id: SubscriberId = "p1".to_string();
        world.on_connect(id.clone());
        world.on_disconnect(&id);
        assert!(!world.players.contains_key(&id));
        assert!(!world.interest.is_subscribed(&id));
    }

    #[test]
    fn terrain_destroy_message_carves_and_spawns_sand() {
        let mut world = World::new(test_config());
        let id: SubscriberId = "p1".to_string();
        world.on_connect(id.clone());
        world.on_message(&id, InboundMessage::TerrainDestroy {
            x: 100,
            y: 100,
            radius: 8.0,
            explosive: false,
        });
        assert!(!world.sand.is_empty() || world.terrain_mod_history.len() == 1);
    }
}
