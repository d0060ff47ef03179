//! Benchmarks the carve-and-flood-fill hot path (spec §4.2), the new crate's
//! equivalent of the teacher's `pixel_world_benchmarks` destruction suite.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use arena_sim::chunk_index::ChunkIndex;
use arena_sim::material::Materials;
use arena_sim::terrain::Terrain;

fn bench_destroy(c: &mut Criterion) {
    let materials = Materials::new();

    c.bench_function("terrain_destroy_radius_20", |b| {
        b.iter_batched(
            || {
                let mut terrain = Terrain::new(1024, 1024, 256);
                let mut chunk_index = ChunkIndex::new(4, 4);
                terrain.generate(&mut chunk_index, 42);
                (terrain, chunk_index)
            },
            |(mut terrain, mut chunk_index)| {
                let detached = terrain.destroy(&mut chunk_index, &materials, 512, 512, 20.0);
                black_box(detached);
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_destroy);
criterion_main!(benches);
