//! Startup config surface (spec §6). Every field has a default and is
//! settable from TOML or CLI overrides in `arena-server`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: u32,
    pub width: u32,
    pub height: u32,
    #[serde(rename = "chunkSize")]
    pub chunk_size: u32,
    #[serde(rename = "tickRate")]
    pub tick_rate: u32,
    #[serde(rename = "stateRate")]
    pub state_rate: u32,
    #[serde(rename = "sandRate")]
    pub sand_rate: u32,
    #[serde(rename = "maxSandParticles")]
    pub max_sand_particles: usize,
    #[serde(rename = "maxSandSpawnPerDestroy")]
    pub max_sand_spawn_per_destroy: usize,
    #[serde(rename = "syncRadius")]
    pub sync_radius: i32,
    #[serde(rename = "computeRadius")]
    pub compute_radius: i32,
    #[serde(rename = "bufferRadius")]
    pub buffer_radius: i32,
    #[serde(rename = "maxChunkSyncPerTick")]
    pub max_chunk_sync_per_tick: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 1600,
            height: 900,
            chunk_size: 256,
            tick_rate: 60,
            state_rate: 20,
            sand_rate: 20,
            max_sand_particles: 5000,
            max_sand_spawn_per_destroy: 500,
            sync_radius: 1,
            compute_radius: 1,
            buffer_radius: 1,
            max_chunk_sync_per_tick: 8,
        }
    }
}

impl WorldConfig {
    /// `broadcastInterval = max(1, round(tickRate / stateRate))` (spec §4.5).
    pub fn broadcast_interval(&self) -> u32 {
        1.max((self.tick_rate as f32 / self.state_rate as f32).round() as u32)
    }

    /// Same subdivision rule applied to the throttled sand stream (spec §4.7).
    pub fn sand_broadcast_interval(&self) -> u32 {
        1.max((self.tick_rate as f32 / self.sand_rate as f32).round() as u32)
    }

    pub fn chunks_x(&self) -> u32 {
        self.width.div_ceil(self.chunk_size)
    }

    pub fn chunks_y(&self) -> u32 {
        self.height.div_ceil(self.chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_broadcast_interval_is_three() {
        let cfg = WorldConfig::default();
        assert_eq!(cfg.broadcast_interval(), 3); // 60/20
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let cfg: WorldConfig = serde_json::from_str(r#"{"seed": 42}"#).unwrap();
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.width, 1600);
    }

    #[test]
    fn chunk_grid_dimensions_round_up() {
        let mut cfg = WorldConfig::default();
        cfg.width = 1600;
        cfg.height = 900;
        cfg.chunk_size = 256;
        assert_eq!(cfg.chunks_x(), 7); // ceil(1600/256)
        assert_eq!(cfg.chunks_y(), 4); // ceil(900/256)
    }
}
