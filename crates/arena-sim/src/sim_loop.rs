//! Fixed-timestep accumulator (spec §4.5): the transport feeds it wall-clock
//! elapsed time, it drives `World::step` a deterministic number of times.

use crate::world::{TickEvents, World};

/// Ticks dropped rather than caught up once `max_substeps` is hit in a single
/// `advance` call, so a long stall (GC pause, blocked accept loop) can never
/// spiral into an ever-growing catch-up burst.
const MAX_SUBSTEPS: u32 = 5;

pub struct SimLoop {
    dt_ms: f64,
    accumulator_ms: f64,
}

impl SimLoop {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            dt_ms: 1000.0 / tick_rate as f64,
            accumulator_ms: 0.0,
        }
    }

    pub fn dt_ms(&self) -> f64 {
        self.dt_ms
    }

    /// Advances `world` by as many fixed ticks as `elapsed_ms` covers, capped
    /// at `MAX_SUBSTEPS`. Returns the number of ticks actually run and the
    /// merged events from every substep, in order.
    pub fn advance(&mut self, world: &mut World, elapsed_ms: f64) -> (u32, TickEvents) {
        self.accumulator_ms += elapsed_ms;
        let mut steps = 0;
        let mut events = TickEvents::default();
        while self.accumulator_ms >= self.dt_ms && steps < MAX_SUBSTEPS {
            events.merge(world.step(self.dt_ms as f32));
            self.accumulator_ms -= self.dt_ms;
            steps += 1;
        }
        if steps == MAX_SUBSTEPS {
            self.accumulator_ms = 0.0;
        }
        (steps, events)
    }
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
        cfg.tick_rate = 60;
        cfg
    }

    #[test]
    fn one_frame_worth_of_elapsed_time_runs_one_tick() {
        let mut world = World::new(test_config());
        let mut sim_loop = SimLoop::new(60);
        let (steps, _events) = sim_loop.advance(&mut world, 1000.0 / 60.0);
        assert_eq!(steps, 1);
        assert_eq!(world.tick, 1);
    }

    #[test]
    fn sub_tick_elapsed_time_accumulates_across_calls() {
        let mut world = World::new(test_config());
        let mut sim_loop = SimLoop::new(60);
        sim_loop.advance(&mut world, 5.0);
        assert_eq!(world.tick, 0);
        sim_loop.advance(&mut world, 12.0);
        assert_eq!(world.tick, 1);
    }

    #[test]
    fn a_long_stall_is_capped_at_max_substeps() {
        let mut world = World::new(test_config());
        let mut sim_loop = SimLoop::new(60);
        let (steps, _events) = sim_loop.advance(&mut world, 10_000.0);
        assert_eq!(steps, MAX_SUBSTEPS);
        assert_eq!(world.tick, MAX_SUBSTEPS as u64);
    }
}
