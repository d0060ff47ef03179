//! Chunk resync throttling end-to-end (spec §4.6, §8): a subscriber whose
//! sync radius covers more chunks than `maxChunkSyncPerTick` only gets that
//! many resyncs per tick, draining the backlog over several ticks instead of
//! bursting everything at once.

use arena_proto::config::WorldConfig;
use arena_sim::World;

fn config() -> WorldConfig {
    let mut cfg = WorldConfig::default();
    cfg.width = 512;
    cfg.height = 512;
    cfg.chunk_size = 64;
    cfg.seed = 5;
    cfg.sync_radius = 3;
    cfg.buffer_radius = 4;
    cfg.compute_radius = 3;
    cfg.max_chunk_sync_per_tick = 4;
    cfg
}

#[test]
fn a_fresh_subscriber_drains_their_chunk_backlog_across_several_ticks() {
    let mut world = World::new(config());
    world.on_connect("p1".to_string());

    let total_chunks_in_radius = world.interest.active_chunk_count(&"p1".to_string());
    assert!(
        total_chunks_in_radius > world.config.max_chunk_sync_per_tick,
        "fixture must queue more chunks than one tick's budget to exercise throttling"
    );

    let first_flush = world.flush_chunk_resyncs();
    assert_eq!(first_flush.len(), world.config.max_chunk_sync_per_tick);

    let mut drained = first_flush.len();
    let mut guard = 0;
    while drained < total_chunks_in_radius {
        let batch = world.flush_chunk_resyncs();
        assert!(!batch.is_empty(), "backlog must keep draining, never stall with chunks still queued");
        assert!(batch.len() <= world.config.max_chunk_sync_per_tick);
        drained += batch.len();
        guard += 1;
        assert!(guard < 1000, "throttled drain did not converge");
    }

    assert_eq!(world.flush_chunk_resyncs().len(), 0, "backlog must be empty once fully drained");
}
