//! Connect handshake end-to-end (spec §8 "concrete end-to-end scenarios"):
//! a fresh subscriber gets a full terrain snapshot, a spawn inside the
//! documented band, and their first state broadcast is a full snapshot.

use arena_proto::config::WorldConfig;
use arena_sim::broadcaster::Broadcaster;
use arena_sim::world::TickEvents;
use arena_sim::World;

fn config() -> WorldConfig {
    let mut cfg = WorldConfig::default();
    cfg.width = 512;
    cfg.height = 512;
    cfg.chunk_size = 128;
    cfg.seed = 11;
    cfg
}

#[test]
fn connect_then_first_broadcast_carries_a_full_player_snapshot() {
    let mut world = World::new(config());
    let welcome = world.on_connect("p1".to_string());

    assert_eq!(welcome.terrain_snapshot.len(), (world.config.width * world.config.height) as usize);
    assert!(welcome.spawn_x >= 400.0 && welcome.spawn_x < 1200.0);
    assert_eq!(welcome.spawn_y, 100.0);
    assert!(welcome.terrain_mods.is_empty());

    let mut broadcaster = Broadcaster::new();
    let events = TickEvents::default();
    let state = broadcaster.build_state(&mut world, &events, &[]);
    assert!(state.players_full);
    assert_eq!(state.players.len(), 1);
    assert_eq!(state.players[0].player_id, "p1");
    assert!(state.players[0].chunk_key.is_some());
}

#[test]
fn a_second_subscriber_does_not_see_a_full_snapshot_for_the_first() {
    let mut world = World::new(config());
    world.on_connect("p1".to_string());
    let mut broadcaster = Broadcaster::new();
    let events = TickEvents::default();
    broadcaster.build_state(&mut world, &events, &[]);

    world.on_connect("p2".to_string());
    let second = broadcaster.build_state(&mut world, &events, &[]);
    // p1 is unchanged, only p2 is new.
    assert_eq!(second.players.len(), 1);
    assert_eq!(second.players[0].player_id, "p2");
}
