//! Raycast projectile ballistics and falloff explosion damage (spec §4.4).

use crate::chunk_index::ChunkIndex;
use crate::coords;
use crate::material::Materials;
use crate::terrain::{DetachedPixel, Terrain};

use super::{PLAYER_HEIGHT, PLAYER_WIDTH, PROJECTILE_MAX_LIFETIME_MS};

/// Outcome of advancing a projectile by one tick.
pub enum ProjectileOutcome {
    Alive,
    /// Projectile detonated at (x, y); carries splash-damage targets as
    /// `(player_id, damage)` pairs computed by the caller via `explode`.
    Exploded { x: i64, y: i64 },
    Expired,
}

/// Result of one `Projectile::step` call. Piercing spells can rack up
/// `contact_hits` (direct overlap damage) while still ending the tick
/// `Alive` — they pass through instead of detonating.
pub struct StepResult {
    pub outcome: ProjectileOutcome,
    pub contact_hits: Vec<(String, f32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellKind {
    Fireball,
    Ice,
    Lightning,
    Earth,
}

impl SpellKind {
    pub fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => SpellKind::Fireball,
            1 => SpellKind::Ice,
            2 => SpellKind::Lightning,
            _ => SpellKind::Earth,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "ice" => SpellKind::Ice,
            "lightning" => SpellKind::Lightning,
            "earth" => SpellKind::Earth,
            _ => SpellKind::Fireball,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SpellKind::Fireball => "fireball",
            SpellKind::Ice => "ice",
            SpellKind::Lightning => "lightning",
            SpellKind::Earth => "earth",
        }
    }

    pub fn damage(self) -> f32 {
        match self {
            SpellKind::Fireball => 25.0,
            SpellKind::Ice => 15.0,
            SpellKind::Lightning => 30.0,
            SpellKind::Earth => 20.0,
        }
    }

    pub fn explosion_radius(self) -> f32 {
        match self {
            SpellKind::Fireball => 15.0,
            SpellKind::Ice => 10.0,
            SpellKind::Lightning => 8.0,
            SpellKind::Earth => 20.0,
        }
    }

    pub fn gravity(self) -> f32 {
        match self {
            SpellKind::Fireball => 0.05,
            SpellKind::Ice => 0.0,
            SpellKind::Lightning => 0.0,
            SpellKind::Earth => 0.2,
        }
    }

    pub fn piercing(self) -> bool {
        matches!(self, SpellKind::Ice)
    }

    pub fn speed_multiplier(self) -> f32 {
        match self {
            SpellKind::Lightning => 1.5,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub server_id: u64,
    pub client_projectile_id: Option<u64>,
    pub owner_id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub kind: SpellKind,
    pub lifetime_ms: f32,
    pub alive: bool,
}

impl Projectile {
    pub fn spawn(owner_id: String, x: f32, y: f32, vx: f32, vy: f32, kind: SpellKind) -> Self {
        Self {
            server_id: 0,
            client_projectile_id: None,
            owner_id,
            x,
            y,
            vx,
            vy,
            kind,
            lifetime_ms: 0.0,
            alive: true,
        }
    }

    fn overlaps_player(px: f32, py: f32, x: f32, y: f32) -> bool {
        let hx0 = px.floor() as i64;
        let hy0 = py.floor() as i64;
        let x = x.floor() as i64;
        let y = y.floor() as i64;
        x >= hx0 && x < hx0 + PLAYER_WIDTH && y >= hy0 && y < hy0 + PLAYER_HEIGHT
    }

    /// Advances the projectile by one tick: integrates gravity, subdivides the
    /// displacement into unit steps, and stops at the first solid pixel, the
    /// first non-piercing player hit, or the tick's final position. Piercing
    /// spells (ice) rack up contact damage in `contact_hits` and keep flying.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        dt_ms: f32,
        terrain: &Terrain,
        materials: &Materials,
        width: u32,
        height: u32,
        players: &[(String, f32, f32)],
    ) -> StepResult {
        if !self.alive {
            return StepResult { outcome: ProjectileOutcome::Expired, contact_hits: Vec::new() };
        }
        self.lifetime_ms += dt_ms;
        if self.lifetime_ms > PROJECTILE_MAX_LIFETIME_MS {
            self.alive = false;
            return StepResult { outcome: ProjectileOutcome::Expired, contact_hits: Vec::new() };
        }

        self.vy += self.kind.gravity();

        let dx = self.vx;
        let dy = self.vy;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i64;
        let step_x = dx / steps as f32;
        let step_y = dy / steps as f32;
        let mut contact_hits = Vec::new();
        let mut already_hit: std::collections::HashSet<&str> = std::collections::HashSet::new();

        for _ in 0..steps {
            let next_x = self.x + step_x;
            let next_y = self.y + step_y;
            let wrapped_x = coords::wrap_x(next_x as i64, width) as f32 + next_x.fract();
            if next_y < 0.0 || next_y as i64 >= height as i64 {
                self.alive = false;
                return StepResult { outcome: ProjectileOutcome::Expired, contact_hits };
            }
            if terrain.is_solid(wrapped_x as i64, next_y as i64, materials) {
                self.alive = false;
                return StepResult {
                    outcome: ProjectileOutcome::Exploded { x: wrapped_x as i64, y: next_y as i64 },
                    contact_hits,
                };
            }
            for (id, px, py) in players {
                if id == &self.owner_id || already_hit.contains(id.as_str()) {
                    continue;
                }
                if Self::overlaps_player(*px, *py, wrapped_x, next_y) {
                    if self.kind.piercing() {
                        already_hit.insert(id.as_str());
                        contact_hits.push((id.clone(), self.kind.damage()));
                    } else {
                        self.alive = false;
                        return StepResult {
                            outcome: ProjectileOutcome::Exploded { x: wrapped_x as i64, y: next_y as i64 },
                            contact_hits,
                        };
                    }
                }
            }
            self.x = wrapped_x;
            self.y = next_y;
        }

        StepResult { outcome: ProjectileOutcome::Alive, contact_hits }
    }

    /// Carves terrain at the impact point and returns the detached debris
    /// plus falloff damage for every `(id, x, y)` player within twice the
    /// spell's explosion radius.
    pub fn explode(
        &self,
        terrain: &mut Terrain,
        chunk_index: &mut ChunkIndex,
        materials: &Materials,
        impact_x: i64,
        impact_y: i64,
        width: u32,
        players: &[(String, f32, f32)],
    ) -> (Vec<DetachedPixel>, Vec<(String, f32)>) {
        let detached = terrain.destroy(chunk_index, materials, impact_x, impact_y, self.kind.explosion_radius());

        let splash_radius = self.kind.explosion_radius() * 2.0;
        let damages = players
            .iter()
            .filter_map(|(id, px, py)| {
                let dx = coords::wrap_shortest_delta(*px as i64, impact_x, width) as f32;
                let dy = py - impact_y as f32;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist > splash_radius {
                    return None;
                }
                let falloff = 1.0 - (dist / splash_radius);
                Some((id.clone(), self.kind.damage() * falloff))
            })
            .collect();
        (detached, damages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fireball_carries_known_stats() {
        assert_eq!(SpellKind::Fireball.damage(), 25.0);
        assert_eq!(SpellKind::Fireball.explosion_radius(), 15.0);
    }

    #[test]
    fn ice_is_piercing() {
        assert!(SpellKind::Ice.piercing());
        assert!(!SpellKind::Fireball.piercing());
    }

    #[test]
    fn projectile_stops_on_solid_terrain() {
        let mut terrain = Terrain::new(64, 64, 16);
        let mut idx = ChunkIndex::new(4, 4);
        let materials = Materials::new();
        terrain.set_pixel(&mut idx, 20, 10, crate::material::ids::STONE, 0);
        let mut projectile = Projectile::spawn("p1".into(), 10.0, 10.0, 8.0, 0.0, SpellKind::Fireball);
        let mut outcome = ProjectileOutcome::Alive;
        for _ in 0..5 {
            let result = projectile.step(16.6, &terrain, &materials, 64, 64, &[]);
            outcome = result.outcome;
            if matches!(outcome, ProjectileOutcome::Exploded { .. }) {
                break;
            }
        }
        assert!(matches!(outcome, ProjectileOutcome::Exploded { .. }));
    }

    #[test]
    fn projectile_expires_after_max_lifetime() {
        let terrain = Terrain::new(64, 64, 16);
        let materials = Materials::new();
        let mut projectile = Projectile::spawn("p1".into(), 10.0, 10.0, 0.0, 0.0, SpellKind::Ice);
        let mut outcome = ProjectileOutcome::Alive;
        for _ in 0..200 {
            outcome = projectile.step(16.6, &terrain, &materials, 64, 64, &[]).outcome;
        }
        assert!(matches!(outcome, ProjectileOutcome::Expired));
    }

    #[test]
    fn piercing_projectile_damages_and_keeps_flying() {
        let terrain = Terrain::new(64, 64, 16);
        let materials = Materials::new();
        let mut projectile = Projectile::spawn("owner".into(), 10.0, 10.0, 2.0, 0.0, SpellKind::Ice);
        let players = vec![("victim".to_string(), 11.0, 10.0)];
        let result = projectile.step(16.6, &terrain, &materials, 64, 64, &players);
        assert!(matches!(result.outcome, ProjectileOutcome::Alive));
        assert_eq!(result.contact_hits.len(), 1);
        assert_eq!(result.contact_hits[0].0, "victim");
    }

    #[test]
    fn non_piercing_projectile_explodes_on_player_contact() {
        let terrain = Terrain::new(64, 64, 16);
        let materials = Materials::new();
        let mut projectile = Projectile::spawn("owner".into(), 10.0, 10.0, 2.0, 0.0, SpellKind::Fireball);
        let players = vec![("victim".to_string(), 11.0, 10.0)];
        let result = projectile.step(16.6, &terrain, &materials, 64, 64, &players);
        assert!(matches!(result.outcome, ProjectileOutcome::Exploded { .. }));
    }
}
