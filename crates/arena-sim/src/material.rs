//! Material table (spec §3): a small enumeration, each entry carrying
//! {solid?, granular?, liquid?, density, palette}. `BEDROCK` is indestructible.

use pixel_macro::flags8;

flags8!(MaterialFlags {
    solid,
    granular,
    liquid,
    indestructible,
});

/// Stable material identifier, stored per-pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct MaterialId(pub u8);

pub mod ids {
    use super::MaterialId;
    pub const EMPTY: MaterialId = MaterialId(0);
    pub const STONE: MaterialId = MaterialId(1);
    pub const DIRT: MaterialId = MaterialId(2);
    pub const GRASS: MaterialId = MaterialId(3);
    pub const BEDROCK: MaterialId = MaterialId(4);
    pub const LIQUID_WATER: MaterialId = MaterialId(5);
    pub const LIQUID_LAVA: MaterialId = MaterialId(6);
}

#[derive(Debug, Clone, Copy)]
pub struct Material {
    pub name: &'static str,
    pub flags: MaterialFlags,
    pub density: f32,
    /// 8-step gradient from surface to deep, matching the teacher's
    /// `Material::sample` palette convention.
    pub palette: [[u8; 3]; 8],
}

impl Material {
    pub fn sample(&self, depth_index: u8) -> [u8; 3] {
        self.palette[(depth_index as usize * 7 / 255).min(7)]
    }
}

/// Material registry with built-in definitions; indexed by `MaterialId`.
#[derive(Debug, Clone)]
pub struct Materials {
    entries: Vec<Material>,
}

impl Materials {
    pub fn new() -> Self {
        let mut solid = MaterialFlags::EMPTY;
        solid.set_solid(true);
        let mut granular = solid;
        granular.set_granular(true);
        let mut liquid = MaterialFlags::EMPTY;
        liquid.set_liquid(true);
        let mut bedrock = solid;
        bedrock.set_indestructible(true);

        Self {
            entries: vec![
                Material {
                    name: "Empty",
                    flags: MaterialFlags::EMPTY,
                    density: 0.0,
                    palette: gradient([135, 206, 235], [135, 206, 235]),
                },
                Material {
                    name: "Stone",
                    flags: solid,
                    density: 2.6,
                    palette: gradient([128, 128, 128], [58, 58, 58]),
                },
                Material {
                    name: "Dirt",
                    flags: granular,
                    density: 1.5,
                    palette: gradient([139, 90, 43], [76, 34, 8]),
                },
                Material {
                    name: "Grass",
                    flags: granular,
                    density: 1.2,
                    palette: gradient([86, 158, 56], [47, 94, 31]),
                },
                Material {
                    name: "Bedrock",
                    flags: bedrock,
                    density: 5.0,
                    palette: gradient([40, 40, 40], [10, 10, 10]),
                },
                Material {
                    name: "Water",
                    flags: liquid,
                    density: 1.0,
                    palette: gradient([80, 140, 220], [20, 60, 140]),
                },
                Material {
                    name: "Lava",
                    flags: liquid,
                    density: 3.1,
                    palette: gradient([240, 120, 20], [140, 30, 10]),
                },
            ],
        }
    }

    pub fn get(&self, id: MaterialId) -> &Material {
        &self.entries[id.0 as usize]
    }

    pub fn is_solid(&self, id: MaterialId) -> bool {
        id != ids::EMPTY && self.get(id).flags.solid()
    }

    pub fn is_granular(&self, id: MaterialId) -> bool {
        self.get(id).flags.granular()
    }

    pub fn is_liquid(&self, id: MaterialId) -> bool {
        self.get(id).flags.liquid()
    }

    pub fn is_indestructible(&self, id: MaterialId) -> bool {
        self.get(id).flags.indestructible()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Materials {
    fn default() -> Self {
        Self::new()
    }
}

fn gradient(surface: [u8; 3], deep: [u8; 3]) -> [[u8; 3]; 8] {
    let mut out = [[0u8; 3]; 8];
    for (i, slot) in out.iter_mut().enumerate() {
        let t = i as f32 / 7.0;
        for c in 0..3 {
            slot[c] = (surface[c] as f32 + (deep[c] as f32 - surface[c] as f32) * t) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bedrock_is_solid_and_indestructible() {
        let mats = Materials::new();
        assert!(mats.is_solid(ids::BEDROCK));
        assert!(mats.is_indestructible(ids::BEDROCK));
    }

    #[test]
    fn empty_is_never_solid() {
        let mats = Materials::new();
        assert!(!mats.is_solid(ids::EMPTY));
    }

    #[test]
    fn dirt_and_grass_are_granular_not_liquid() {
        let mats = Materials::new();
        assert!(mats.is_granular(ids::DIRT));
        assert!(mats.is_granular(ids::GRASS));
        assert!(!mats.is_liquid(ids::DIRT));
    }

    #[test]
    fn water_and_lava_are_liquid_not_solid() {
        let mats = Materials::new();
        assert!(mats.is_liquid(ids::LIQUID_WATER));
        assert!(mats.is_liquid(ids::LIQUID_LAVA));
        assert!(!mats.is_solid(ids::LIQUID_WATER));
    }
}
