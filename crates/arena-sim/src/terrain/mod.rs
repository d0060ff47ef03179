//! Terrain grid: flat pixel buffer, surface cache, and structural
//! destruction (spec §3, §4.2).

mod flood_fill;

use fastnoise2::generator::prelude::{Generator, GeneratorWrapper};
use fastnoise2::generator::simplex::supersimplex_scaled;
use fastnoise2::SafeNode;

use crate::chunk_index::ChunkIndex;
use crate::coords::{self, ChunkPos};
use crate::material::{ids, MaterialId, Materials};
use crate::pixel::Pixel;

/// One pixel dislodged by a destroy() detachment, ready to become sand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachedPixel {
    pub x: i64,
    pub y: i64,
    pub material: MaterialId,
}

/// Bottom rows reserved as the indestructible floor (spec §4.2).
const BEDROCK_ROWS: u32 = 3;
/// "grounded" if within this many rows of the floor (spec §4.2 detachment).
const GROUND_PROXIMITY_ROWS: i64 = 4;
/// Hard cap on a single detached component (spec §4.2, §8).
const DETACHMENT_CAP: usize = 400;
/// Detachment scan expands the carve radius by this many pixels (spec §4.2).
const DETACHMENT_SCAN_MARGIN: f32 = 10.0;

const GRASS_BAND_PX: u32 = 2;
const DIRT_BAND_PX: u32 = 25;

pub struct Terrain {
    width: u32,
    height: u32,
    chunk_size: u32,
    pixels: Vec<Pixel>,
    /// Highest non-empty row per column, or `None` if the column is empty.
    surface_cache: Vec<Option<u32>>,
}

impl Terrain {
    pub fn new(width: u32, height: u32, chunk_size: u32) -> Self {
        Self {
            width,
            height,
            chunk_size,
            pixels: vec![Pixel::EMPTY; (width as usize) * (height as usize)],
            surface_cache: vec![None; width as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: i64, y: i64) -> usize {
        let x = coords::wrap_x(x, self.width) as usize;
        let y = coords::clamp_y(y, self.height) as usize;
        y * self.width as usize + x
    }

    /// `true` iff `(x,y)` is conceptually outside the grid's y-range, where
    /// queries return solid per spec §3's out-of-bounds invariant.
    fn out_of_vertical_bounds(&self, y: i64) -> bool {
        y < 0 || y >= self.height as i64
    }

    pub fn get_pixel(&self, x: i64, y: i64) -> Pixel {
        if self.out_of_vertical_bounds(y) {
            return Pixel::new(ids::BEDROCK, 0);
        }
        self.pixels[self.index(x, y)]
    }

    pub fn is_solid(&self, x: i64, y: i64, materials: &Materials) -> bool {
        if self.out_of_vertical_bounds(y) {
            return true;
        }
        materials.is_solid(self.get_pixel(x, y).material)
    }

    pub fn surface_height(&self, x: i64) -> Option<u32> {
        let x = coords::wrap_x(x, self.width) as usize;
        self.surface_cache[x]
    }

    fn is_bedrock_row(&self, y: i64) -> bool {
        y >= self.height as i64 - BEDROCK_ROWS as i64
    }

    /// Writes a material, wrapping x and clamping y. Bedrock rows reject any
    /// write other than BEDROCK itself (spec §4.2: "bedrock writes rejected
    /// outside of initialization"). Marks the chunk dirty and enqueues the
    /// write for broadcast.
    pub fn set_pixel(
        &mut self,
        chunk_index: &mut ChunkIndex,
        x: i64,
        y: i64,
        material: MaterialId,
        shade: u8,
    ) {
        if self.out_of_vertical_bounds(y) {
            return;
        }
        if self.is_bedrock_row(y) && material != ids::BEDROCK {
            return;
        }
        let idx = self.index(x, y);
        self.pixels[idx] = Pixel::new(material, shade);

        let wrapped_x = coords::wrap_x(x, self.width);
        let clamped_y = coords::clamp_y(y, self.height) as u32;
        self.bump_surface_cache(wrapped_x as u32, clamped_y, material);

        let (chunk, local) = coords::to_chunk_and_local(wrapped_x, clamped_y as i64, self.chunk_size);
        let local_index = local.y * self.chunk_size + local.x;
        chunk_index.bump(chunk);
        chunk_index.push_pending_pixel(chunk, local_index, material);
    }

    fn bump_surface_cache(&mut self, x: u32, y: u32, material: MaterialId) {
        let slot = &mut self.surface_cache[x as usize];
        if material == ids::EMPTY {
            if *slot == Some(y) {
                // Recompute by scanning upward from this row; the cache only
                // ever needs an honest "highest non-empty", not an exact
                // incremental one.
                *slot = self.rescan_column(x, y);
            }
        } else {
            *slot = Some(slot.map_or(y, |cur| cur.max(y)));
        }
    }

    fn rescan_column(&self, x: u32, below: u32) -> Option<u32> {
        (0..below)
            .rev()
            .find(|&y| self.pixels[y as usize * self.width as usize + x as usize].material != ids::EMPTY)
    }

    /// Deterministic procedural fill (spec §4.2): sky, a 2px grass band, a
    /// 25px dirt/stone mix, stone with a two-octave cave mask, then a
    /// bedrock floor. Grounded on the teacher's `MaterialSeeder` (noise
    /// threshold + feathered boundary) generalized from per-chunk painting
    /// to a whole-grid generator.
    pub fn generate(&mut self, chunk_index: &mut ChunkIndex, seed: u32) {
        let density: GeneratorWrapper<SafeNode> = supersimplex_scaled(40.0).build();
        let cave_a: GeneratorWrapper<SafeNode> = supersimplex_scaled(30.0).build();
        let cave_b: GeneratorWrapper<SafeNode> = supersimplex_scaled(12.0).build();

        let ground_start = (self.height as f32 * 0.3) as u32;
        let dirt_end = ground_start + GRASS_BAND_PX + DIRT_BAND_PX;
        let seed_i32 = seed as i32;

        for y in 0..self.height {
            for x in 0..self.width {
                let material = if y < ground_start {
                    ids::EMPTY
                } else if self.is_bedrock_row(y as i64) {
                    ids::BEDROCK
                } else if y < ground_start + GRASS_BAND_PX {
                    ids::GRASS
                } else if y < dirt_end {
                    let d = density.gen_single_2d(x as f32, y as f32, seed_i32);
                    if d > 0.0 {
                        ids::DIRT
                    } else {
                        ids::STONE
                    }
                } else {
                    let a = cave_a.gen_single_2d(x as f32, y as f32, seed_i32);
                    let b = cave_b.gen_single_2d(x as f32, y as f32, seed_i32.wrapping_add(1));
                    let cave = a + b * 0.5;
                    if cave > 0.55 {
                        ids::EMPTY
                    } else {
                        ids::STONE
                    }
                };

                // Bypass set_pixel's bedrock-write guard and per-write
                // chunk bump during bulk generation; the whole grid is
                // freshly allocated so every chunk starts at version 1
                // regardless, and there is no subscriber yet to notify.
                let idx = y as usize * self.width as usize + x as usize;
                self.pixels[idx] = Pixel::new(material, 0);
                if material != ids::EMPTY {
                    let slot = &mut self.surface_cache[x as usize];
                    *slot = Some(slot.map_or(y, |cur| cur.max(y)));
                }
            }
        }

        let _ = chunk_index; // chunk versions stay at their initial value post-generate
    }

    /// Two-phase structural destruction (spec §4.2): carve a disc, then
    /// flood-fill the expanded box for components that lost ground contact.
    pub fn destroy(
        &mut self,
        chunk_index: &mut ChunkIndex,
        materials: &Materials,
        cx: i64,
        cy: i64,
        radius: f32,
    ) -> Vec<DetachedPixel> {
        let r = radius.max(0.0);
        let r_sq = r * r;
        let ir = r.ceil() as i64;

        for dy in -ir..=ir {
            for dx in -ir..=ir {
                let fx = dx as f32;
                let fy = dy as f32;
                if fx * fx + fy * fy > r_sq {
                    continue;
                }
                let x = cx + dx;
                let y = cy + dy;
                if self.out_of_vertical_bounds(y) || self.is_bedrock_row(y) {
                    continue;
                }
                if self.get_pixel(x, y).material == ids::EMPTY {
                    continue;
                }
                self.set_pixel(chunk_index, x, y, ids::EMPTY, 0);
            }
        }

        self.scan_detachments(chunk_index, materials, cx, cy, r + DETACHMENT_SCAN_MARGIN)
    }

    fn scan_detachments(
        &mut self,
        chunk_index: &mut ChunkIndex,
        materials: &Materials,
        cx: i64,
        cy: i64,
        scan_radius: f32,
    ) -> Vec<DetachedPixel> {
        let ir = scan_radius.ceil() as i64;
        let min_x = cx - ir;
        let max_x = cx + ir;
        let min_y = (cy - ir).max(0);
        let max_y = (cy + ir).min(self.height as i64 - 1);

        let mut visited = std::collections::HashSet::new();
        let mut detached = Vec::new();

        for sy in min_y..=max_y {
            for sx in min_x..=max_x {
                let wx = coords::wrap_x(sx, self.width);
                if visited.contains(&(wx, sy)) {
                    continue;
                }
                if self.get_pixel(wx, sy).material == ids::EMPTY {
                    continue;
                }

                let (cells, hit_cap) = flood_fill::flood_fill(
                    (wx, sy),
                    (min_x, min_y, max_x, max_y),
                    DETACHMENT_CAP,
                    |x, y| self.get_pixel(x, y).material != ids::EMPTY,
                );
                for &cell in &cells {
                    visited.insert(cell);
                }
                if hit_cap {
                    continue; // conservatively kept, per spec §4.2
                }

                let grounded = cells.iter().any(|&(x, y)| {
                    y >= self.height as i64 - GROUND_PROXIMITY_ROWS
                        || materials.is_indestructible(self.get_pixel(x, y).material)
                });
                if grounded {
                    continue;
                }

                for (x, y) in cells {
                    let pixel = self.get_pixel(x, y);
                    detached.push(DetachedPixel {
                        x,
                        y,
                        material: pixel.material,
                    });
                    self.set_pixel(chunk_index, x, y, ids::EMPTY, 0);
                }
            }
        }

        detached
    }

    /// Raw material-byte snapshot, one byte per pixel, row-major (spec §4.2,
    /// §8 "welcome carries a terrain snapshot whose byte length equals
    /// W*H").
    pub fn serialize_snapshot(&self) -> Vec<u8> {
        self.pixels.iter().map(|p| p.material.0).collect()
    }

    /// Restores the grid from a snapshot produced by
    /// [`Self::serialize_snapshot`]. Idempotent: applying the same snapshot
    /// twice yields the same grid.
    pub fn apply_snapshot(&mut self, bytes: &[u8]) {
        debug_assert_eq!(bytes.len(), self.pixels.len());
        for (pixel, &byte) in self.pixels.iter_mut().zip(bytes) {
            *pixel = Pixel::new(MaterialId(byte), 0);
        }
        for x in 0..self.width {
            self.surface_cache[x as usize] = self.rescan_column(x, self.height);
        }
    }

    pub fn chunk_pos_for(&self, x: i64, y: i64) -> ChunkPos {
        let (chunk, _) = coords::to_chunk_and_local(coords::wrap_x(x, self.width), coords::clamp_y(y, self.height), self.chunk_size);
        chunk
    }
}
