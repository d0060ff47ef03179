//! Benchmarks one falling-sand automaton tick over a populated chunk ring
//! (spec §4.3), the sand-side equivalent of the teacher's benchmark suite.

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use arena_sim::chunk_index::ChunkIndex;
use arena_sim::coords::ChunkPos;
use arena_sim::material::{ids, Materials};
use arena_sim::prng::Prng;
use arena_sim::sand::Sand;
use arena_sim::terrain::Terrain;

fn seeded_sand(materials: &Materials) -> (Terrain, ChunkIndex, Sand, Prng) {
    let mut terrain = Terrain::new(512, 512, 128);
    let mut chunk_index = ChunkIndex::new(4, 4);
    terrain.generate(&mut chunk_index, 7);
    let mut sand = Sand::new(512, 512, 128, 5000);
    let mut rng = Prng::new(7);

    let detached: Vec<_> = (0..400)
        .map(|i| arena_sim::terrain::DetachedPixel {
            x: 100 + i % 40,
            y: 50 + i / 40,
            material: ids::DIRT,
        })
        .collect();
    sand.spawn_from_pixels(&mut chunk_index, materials, &mut rng, &detached, (120, 60), false);

    (terrain, chunk_index, sand, rng)
}

fn bench_sand_update(c: &mut Criterion) {
    let materials = Materials::new();

    c.bench_function("sand_update_one_tick", |b| {
        b.iter_batched(
            || seeded_sand(&materials),
            |(mut terrain, mut chunk_index, mut sand, mut rng)| {
                let active: BTreeSet<ChunkPos> = (0..4).flat_map(|cy| (0..4).map(move |cx| ChunkPos::new(cx, cy))).collect();
                sand.update(&mut terrain, &mut chunk_index, &materials, &mut rng, 1, 16.6, &active);
                black_box(sand.len());
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_sand_update);
criterion_main!(benches);
