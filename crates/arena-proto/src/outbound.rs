//! Messages the core sends to a subscriber (spec §6 "Outbound message shapes").

use serde::{Deserialize, Serialize};

use crate::ChunkKey;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "welcome")]
    Welcome(Welcome),
    #[serde(rename = "player_joined")]
    PlayerJoined {
        #[serde(rename = "playerId")]
        player_id: String,
        x: Option<f32>,
        y: Option<f32>,
        #[serde(rename = "selectedSpell")]
        selected_spell: Option<u8>,
    },
    #[serde(rename = "player_left")]
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    #[serde(rename = "input_ack")]
    InputAck { sequence: u64 },
    #[serde(rename = "state")]
    State(StateMessage),
    #[serde(rename = "sand_update")]
    SandUpdate(SandUpdate),
    #[serde(rename = "terrain_update")]
    TerrainUpdate {
        x: i64,
        y: i64,
        radius: f32,
        explosive: bool,
        tick: u64,
    },
    #[serde(rename = "terrain_chunk_update")]
    TerrainChunkUpdate {
        #[serde(rename = "chunkDiff")]
        chunk_diff: ChunkDiff,
    },
    #[serde(rename = "chunk_sync")]
    ChunkSync(ChunkSync),
    #[serde(rename = "pong")]
    Pong { timestamp: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Welcome {
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub tick: u64,
    #[serde(rename = "spawnX")]
    pub spawn_x: f32,
    #[serde(rename = "spawnY")]
    pub spawn_y: f32,
    #[serde(rename = "selectedSpell")]
    pub selected_spell: u8,
    pub seed: u32,
    #[serde(rename = "chunkSize")]
    pub chunk_size: u32,
    /// Raw material-byte pixel grid, row-major, length always `W*H` (spec §8).
    #[serde(rename = "terrainSnapshot")]
    pub terrain_snapshot: Vec<u8>,
    #[serde(rename = "terrainMods")]
    pub terrain_mods: Vec<TerrainMod>,
    #[serde(rename = "sandChunks")]
    pub sand_chunks: Option<Vec<SandChunk>>,
    #[serde(rename = "staticTerrain")]
    pub static_terrain: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TerrainMod {
    pub tick: u64,
    pub x: i64,
    pub y: i64,
    pub radius: f32,
    pub explosive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlayerDelta {
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub vx: Option<f32>,
    pub vy: Option<f32>,
    pub health: Option<f32>,
    pub alive: Option<bool>,
    #[serde(rename = "aimAngle")]
    pub aim_angle: Option<f32>,
    #[serde(rename = "selectedSpell")]
    pub selected_spell: Option<u8>,
    #[serde(rename = "lastProcessedInput")]
    pub last_processed_input: Option<u64>,
    #[serde(rename = "chunkKey")]
    pub chunk_key: Option<ChunkKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProjectileDelta {
    /// Keyed by `serverId` once assigned, `clientProjectileId` until then
    /// (spec §4.7).
    pub id: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub vx: Option<f32>,
    pub vy: Option<f32>,
    #[serde(rename = "type")]
    pub spell_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WorldStats {
    #[serde(rename = "tickDurationMs")]
    pub tick_duration_ms: f32,
    #[serde(rename = "activeParticles")]
    pub active_particles: u32,
    #[serde(rename = "activeSubscribers")]
    pub active_subscribers: u32,
    #[serde(rename = "occupancyRepairs")]
    pub occupancy_repairs: u64,
    #[serde(rename = "chunkIndexRepairs")]
    pub chunk_index_repairs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StateMessage {
    pub tick: u64,
    pub seed: u32,
    pub players: Vec<PlayerDelta>,
    pub projectiles: Vec<ProjectileDelta>,
    #[serde(rename = "terrainMods")]
    pub terrain_mods: Vec<TerrainMod>,
    #[serde(rename = "terrainChunkDiffs")]
    pub terrain_chunk_diffs: Option<Vec<ChunkPixelDiff>>,
    #[serde(rename = "removedPlayers")]
    pub removed_players: Vec<String>,
    #[serde(rename = "removedProjectiles")]
    pub removed_projectiles: Vec<String>,
    #[serde(rename = "playersFull")]
    pub players_full: bool,
    #[serde(rename = "projectilesFull")]
    pub projectiles_full: bool,
    #[serde(rename = "serverStats")]
    pub server_stats: WorldStats,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SandParticleWire {
    pub x: i64,
    pub y: i64,
    pub material: u8,
    pub color: u8,
    pub vx: Option<f32>,
    pub vy: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandChunk {
    pub key: ChunkKey,
    pub particles: Vec<SandParticleWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandUpdate {
    #[serde(rename = "chunkSize")]
    pub chunk_size: u32,
    pub chunks: Vec<SandChunk>,
    pub full: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PixelDiff {
    #[serde(rename = "localIndex")]
    pub local_index: u32,
    pub material: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPixelDiff {
    pub key: ChunkKey,
    pub pixels: Vec<PixelDiff>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkDiff {
    pub id: u64,
    pub tick: u64,
    #[serde(rename = "chunkSize")]
    pub chunk_size: u32,
    pub chunks: Vec<ChunkPixelDiff>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChunkSync {
    pub terrain: Option<ChunkDiff>,
    #[serde(rename = "sandChunks")]
    pub sand_chunks: Option<SandUpdate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_round_trips() {
        let msg = OutboundMessage::Welcome(Welcome {
            player_id: "player-1".into(),
            tick: 0,
            spawn_x: 800.0,
            spawn_y: 100.0,
            selected_spell: 0,
            seed: 12345,
            chunk_size: 256,
            terrain_snapshot: vec![0; 16],
            terrain_mods: vec![],
            sand_chunks: None,
            static_terrain: None,
        });
        let json = serde_json::to_string(&msg).unwrap();
        let back: OutboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
        assert!(json.contains("\"type\":\"welcome\""));
    }

    #[test]
    fn chunk_diff_keys_use_wire_grammar() {
        let diff = ChunkPixelDiff {
            key: ChunkKey::new(3, 1),
            pixels: vec![PixelDiff {
                local_index: 9,
                material: 2,
            }],
        };
        let json = serde_json::to_string(&diff).unwrap();
        assert!(json.contains("\"key\":\"3|1\""));
    }
}
