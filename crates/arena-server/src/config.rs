//! CLI parsing and TOML config loading (SPEC_FULL.md §D). The TOML file
//! supplies the baseline `WorldConfig`; any CLI flag present overrides the
//! matching field.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use arena_proto::config::WorldConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Destructible pixel arena authoritative core")]
pub struct Args {
    /// TCP listener for WebSocket clients.
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Path to the TOML world config. Missing file falls back to defaults.
    #[arg(long, default_value = "config/arena.toml")]
    pub config: PathBuf,

    #[arg(long)]
    pub seed: Option<u32>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<u32>,
    #[arg(long = "tick-rate")]
    pub tick_rate: Option<u32>,
    #[arg(long = "state-rate")]
    pub state_rate: Option<u32>,
    #[arg(long = "sand-rate")]
    pub sand_rate: Option<u32>,
    #[arg(long = "max-sand-particles")]
    pub max_sand_particles: Option<usize>,
    #[arg(long = "max-sand-spawn-per-destroy")]
    pub max_sand_spawn_per_destroy: Option<usize>,
    #[arg(long = "sync-radius")]
    pub sync_radius: Option<i32>,
    #[arg(long = "compute-radius")]
    pub compute_radius: Option<i32>,
    #[arg(long = "buffer-radius")]
    pub buffer_radius: Option<i32>,
    #[arg(long = "max-chunk-sync-per-tick")]
    pub max_chunk_sync_per_tick: Option<usize>,
}

/// Loads `path` as TOML if it exists, otherwise starts from `WorldConfig`'s
/// defaults, then applies every CLI override present in `args`.
pub fn load_world_config(args: &Args) -> Result<WorldConfig> {
    let mut config = if args.config.exists() {
        let text = fs::read_to_string(&args.config)
            .with_context(|| format!("reading config file {}", args.config.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", args.config.display()))?
    } else {
        WorldConfig::default()
    };

    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(tick_rate) = args.tick_rate {
        config.tick_rate = tick_rate;
    }
    if let Some(state_rate) = args.state_rate {
        config.state_rate = state_rate;
    }
    if let Some(sand_rate) = args.sand_rate {
        config.sand_rate = sand_rate;
    }
    if let Some(v) = args.max_sand_particles {
        config.max_sand_particles = v;
    }
    if let Some(v) = args.max_sand_spawn_per_destroy {
        config.max_sand_spawn_per_destroy = v;
    }
    if let Some(v) = args.sync_radius {
        config.sync_radius = v;
    }
    if let Some(v) = args.compute_radius {
        config.compute_radius = v;
    }
    if let Some(v) = args.buffer_radius {
        config.buffer_radius = v;
    }
    if let Some(v) = args.max_chunk_sync_per_tick {
        config.max_chunk_sync_per_tick = v;
    }

    if config.width == 0 || config.height == 0 || config.chunk_size == 0 {
        anyhow::bail!("width, height, and chunk_size must be non-zero");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            listen: "0.0.0.0:8080".parse().unwrap(),
            config: PathBuf::from("does/not/exist.toml"),
            seed: None,
            width: None,
            height: None,
            chunk_size: None,
            tick_rate: None,
            state_rate: None,
            sand_rate: None,
            max_sand_particles: None,
            max_sand_spawn_per_destroy: None,
            sync_radius: None,
            compute_radius: None,
            buffer_radius: None,
            max_chunk_sync_per_tick: None,
        }
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = load_world_config(&base_args()).unwrap();
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn cli_seed_overrides_default() {
        let mut args = base_args();
        args.seed = Some(99);
        let config = load_world_config(&args).unwrap();
        assert_eq!(config.seed, 99);
    }

    #[test]
    fn zero_width_is_rejected() {
        let mut args = base_args();
        args.width = Some(0);
        assert!(load_world_config(&args).is_err());
    }
}
