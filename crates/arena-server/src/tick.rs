//! Drives the fixed-timestep simulation and fans out per-tick broadcasts
//! (spec §4.5, §4.7). Runs as a single background task for the process
//! lifetime; the tick thread never blocks on subscriber I/O (spec §5).

use std::sync::Arc;
use std::time::Instant;

use arena_proto::outbound::OutboundMessage;
use arena_sim::world::TickEvents;
use tokio::time::{self, Duration};
use tracing::debug;

use crate::state::AppState;

pub async fn run(state: Arc<AppState>) {
    let dt_ms = state.sim_loop.lock().await.dt_ms();
    let mut interval = time::interval(Duration::from_secs_f64(dt_ms / 1000.0));
    let mut last = Instant::now();
    let mut pending_events = TickEvents::default();

    loop {
        interval.tick().await;
        let now = Instant::now();
        let elapsed_ms = now.duration_since(last).as_secs_f64() * 1000.0;
        last = now;

        let (steps, events, tick, broadcast_interval, sand_interval) = {
            let mut world = state.world.lock().await;
            let mut sim_loop = state.sim_loop.lock().await;
            let (steps, events) = sim_loop.advance(&mut world, elapsed_ms);
            (
                steps,
                events,
                world.tick,
                world.config.broadcast_interval(),
                world.config.sand_broadcast_interval(),
            )
        };
        if steps == 0 {
            continue;
        }
        pending_events.merge(events);

        // Sand and chunk resyncs run every tick at their own throttled
        // cadence; only the state stream is gated to `broadcastInterval`
        // (spec §4.5/§4.7: state runs at `stateRate`, not the tick rate).
        let sand_update;
        let chunk_syncs;
        {
            let mut world = state.world.lock().await;
            let mut broadcaster = state.broadcaster.lock().await;
            sand_update = broadcaster.maybe_build_sand_update(&world, sand_interval);
            let resyncs = world.flush_chunk_resyncs();
            chunk_syncs = broadcaster.build_chunk_syncs(&world, &resyncs);
        }
        if let Some(sand_update) = sand_update {
            state.broadcast(OutboundMessage::SandUpdate(sand_update)).await;
        }
        for (subscriber, sync) in chunk_syncs {
            state.send_to(&subscriber, OutboundMessage::ChunkSync(sync)).await;
        }

        if tick % broadcast_interval as u64 != 0 {
            continue;
        }
        let events = std::mem::take(&mut pending_events);
        let disconnected = std::mem::take(&mut *state.pending_disconnects.lock().await);

        let state_message = {
            let mut world = state.world.lock().await;
            let mut broadcaster = state.broadcaster.lock().await;
            broadcaster.build_state(&mut world, &events, &disconnected)
        };
        debug!(tick_steps = steps, tick, "state broadcast");
        state.broadcast(OutboundMessage::State(state_message)).await;
    }
}
