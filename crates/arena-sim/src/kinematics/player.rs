//! Player step: input decode, gravity/buoyancy integration, per-pixel swept
//! collision on both axes, aim angle, jump/shoot (spec §4.4).

use arena_proto::inbound::PlayerInput;

use super::projectile::{Projectile, SpellKind};
use super::{GRAVITY, IDLE_DAMPING, MAX_FALL_SPEED, MAX_STEP_HEIGHT, PLAYER_HEIGHT, PLAYER_WIDTH};
use crate::coords;
use crate::material::Materials;
use crate::terrain::Terrain;

/// Flat per-shot cooldown (spec leaves the exact value to the implementation;
/// resolved here as a fixed 250ms, recorded in DESIGN.md).
const SHOOT_COOLDOWN_MS: f32 = 250.0;
/// Base outgoing projectile speed (spec §8 scenario 4 fires at v=(8,0)).
const PROJECTILE_SPEED: f32 = 8.0;
const HORIZONTAL_ACCEL: f32 = 0.6;
const MAX_HORIZONTAL_SPEED: f32 = 4.0;
const JUMP_VELOCITY: f32 = -6.0;
const GRANULAR_LIFT_CAP_MARGIN: i64 = 2;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub health: f32,
    pub alive: bool,
    pub aim_angle: f32,
    pub selected_spell: u8,
    pub last_input_sequence: u64,
    pub grounded: bool,
    pub cooldown_ms: f32,
}

impl Player {
    pub fn spawn(id: String, x: f32, y: f32, selected_spell: u8) -> Self {
        Self {
            id,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            health: 100.0,
            alive: true,
            aim_angle: 0.0,
            selected_spell,
            last_input_sequence: 0,
            grounded: false,
            cooldown_ms: 0.0,
        }
    }

    fn box_blocked_at(&self, terrain: &Terrain, materials: &Materials, x: f32, y: f32) -> bool {
        let x0 = x.floor() as i64;
        let y0 = y.floor() as i64;
        for dy in 0..PLAYER_HEIGHT {
            for dx in 0..PLAYER_WIDTH {
                if terrain.is_solid(x0 + dx, y0 + dy, materials) {
                    return true;
                }
            }
        }
        false
    }

    fn liquid_coverage(&self, terrain: &Terrain, materials: &Materials) -> f32 {
        let x0 = self.x.floor() as i64;
        let y0 = self.y.floor() as i64;
        let mut liquid = 0;
        let total = (PLAYER_WIDTH * PLAYER_HEIGHT) as f32;
        for dy in 0..PLAYER_HEIGHT {
            for dx in 0..PLAYER_WIDTH {
                let pixel = terrain.get_pixel(x0 + dx, y0 + dy);
                if materials.is_liquid(pixel.material) {
                    liquid += 1;
                }
            }
        }
        liquid as f32 / total
    }

    /// One tick of player physics and input handling. Returns a spawned
    /// projectile, if the player shot this tick.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        input: &PlayerInput,
        dt_ms: f32,
        terrain: &Terrain,
        materials: &Materials,
        width: u32,
        height: u32,
    ) -> Option<Projectile> {
        self.last_input_sequence = self.last_input_sequence.max(input.sequence);
        if let Some(spell) = input.selected_spell {
            self.selected_spell = spell;
        }

        if !self.alive {
            return None;
        }

        // 1. Horizontal intent + damping.
        let dir = match (input.left, input.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        if dir != 0.0 {
            self.vx = (self.vx + dir * HORIZONTAL_ACCEL).clamp(-MAX_HORIZONTAL_SPEED, MAX_HORIZONTAL_SPEED);
        } else {
            self.vx *= IDLE_DAMPING;
        }

        // 2. Gravity.
        self.vy = (self.vy + GRAVITY).min(MAX_FALL_SPEED);

        // 3. Fluid coverage: buoyancy counters gravity, drag damps velocity.
        let coverage = self.liquid_coverage(terrain, materials);
        if coverage > 0.0 {
            self.vy -= GRAVITY * coverage * 1.4;
            self.vx *= 1.0 - coverage * 0.3;
            self.vy *= 1.0 - coverage * 0.3;
        }

        // 4. Horizontal sweep.
        let h_steps = self.vx.abs().ceil() as i64;
        let h_dir = self.vx.signum();
        for _ in 0..h_steps {
            let candidate_x = coords::wrap_x((self.x + h_dir) as i64, width) as f32 + (self.x + h_dir).fract();
            if !self.box_blocked_at(terrain, materials, candidate_x, self.y) {
                self.x = candidate_x;
                continue;
            }
            let mut stepped = false;
            if self.vy >= 0.0 {
                for up in 1..=MAX_STEP_HEIGHT {
                    let lifted_y = self.y - up as f32;
                    if !self.box_blocked_at(terrain, materials, candidate_x, lifted_y) {
                        self.x = candidate_x;
                        self.y = lifted_y;
                        stepped = true;
                        break;
                    }
                }
            }
            if !stepped {
                self.vx = 0.0;
                break;
            }
        }

        // 5. Vertical sweep.
        let v_steps = self.vy.abs().ceil() as i64;
        let v_dir = self.vy.signum();
        self.grounded = false;
        for _ in 0..v_steps {
            let candidate_y = self.y + v_dir;
            if !self.box_blocked_at(terrain, materials, self.x, candidate_y) {
                self.y = candidate_y;
            } else {
                if v_dir > 0.0 {
                    self.grounded = true;
                }
                self.vy = 0.0;
                break;
            }
        }

        // 6. Aim angle via wrap-shortest x delta.
        let dx = coords::wrap_shortest_delta(input.mouse_x as i64, self.x as i64, width) as f32;
        let dy = input.mouse_y - self.y;
        self.aim_angle = dy.atan2(dx);

        // 7. Jump + shoot.
        if input.jump && self.grounded {
            self.vy = JUMP_VELOCITY;
            self.grounded = false;
        }
        self.cooldown_ms = (self.cooldown_ms - dt_ms).max(0.0);
        let mut spawned = None;
        if input.shoot && self.cooldown_ms <= 0.0 {
            self.cooldown_ms = SHOOT_COOLDOWN_MS;
            let spell = SpellKind::from_index(self.selected_spell);
            let speed = PROJECTILE_SPEED * spell.speed_multiplier();
            spawned = Some(Projectile::spawn(
                self.id.clone(),
                self.x,
                self.y,
                speed * self.aim_angle.cos(),
                speed * self.aim_angle.sin(),
                spell,
            ));
        }

        // 8. Wrap/clamp, then lift out of granular material.
        self.x = coords::wrap_x(self.x as i64, width) as f32 + self.x.fract().abs();
        self.y = coords::clamp_y(self.y as i64, height) as f32;
        self.unstick_from_granular(terrain, materials, height);

        spawned
    }

    fn unstick_from_granular(&mut self, terrain: &Terrain, materials: &Materials, height: u32) {
        let cap = height as i64 + GRANULAR_LIFT_CAP_MARGIN;
        let mut lifted = 0;
        while lifted < cap && self.is_embedded_in_granular(terrain, materials) {
            self.y -= 1.0;
            lifted += 1;
        }
    }

    fn is_embedded_in_granular(&self, terrain: &Terrain, materials: &Materials) -> bool {
        let x0 = self.x.floor() as i64;
        let y0 = self.y.floor() as i64;
        for dy in 0..PLAYER_HEIGHT {
            for dx in 0..PLAYER_WIDTH {
                if materials.is_granular(terrain.get_pixel(x0 + dx, y0 + dy).material) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_index::ChunkIndex;
    use crate::material::ids;

    fn blank_input(sequence: u64) -> PlayerInput {
        PlayerInput {
            left: false,
            right: false,
            jump: false,
            shoot: false,
            mouse_x: 0.0,
            mouse_y: 0.0,
            sequence,
            selected_spell: None,
        }
    }

    #[test]
    fn gravity_accumulates_while_airborne() {
        let mut player = Player::spawn("p1".into(), 10.0, 10.0, 0);
        let terrain = Terrain::new(64, 64, 16);
        let materials = Materials::new();
        player.step(&blank_input(1), 16.6, &terrain, &materials, 64, 64);
        assert!(player.vy > 0.0);
        assert!(player.y > 10.0);
    }

    #[test]
    fn lands_on_solid_ground_and_sets_grounded() {
        let mut terrain = Terrain::new(64, 64, 16);
        let mut idx = ChunkIndex::new(4, 4);
        for x in 0..30 {
            terrain.set_pixel(&mut idx, x, 30, ids::STONE, 0);
        }
        let materials = Materials::new();
        let mut player = Player::spawn("p1".into(), 10.0, 15.0, 0);
        for i in 0..60 {
            player.step(&blank_input(i), 16.6, &terrain, &materials, 64, 64);
        }
        assert!(player.grounded);
        assert!(player.y <= 29.0);
    }

    #[test]
    fn wraps_around_the_world_seam() {
        let terrain = Terrain::new(64, 64, 16);
        let materials = Materials::new();
        let mut player = Player::spawn("p1".into(), 63.0, 10.0, 0);
        let mut input = blank_input(1);
        input.right = true;
        for i in 0..10 {
            input.sequence = i;
            player.step(&input, 16.6, &terrain, &materials, 64, 64);
        }
        assert!(player.x < 63.0);
    }

    #[test]
    fn shoot_respects_cooldown() {
        let terrain = Terrain::new(64, 64, 16);
        let materials = Materials::new();
        let mut player = Player::spawn("p1".into(), 10.0, 10.0, 0);
        let mut input = blank_input(1);
        input.shoot = true;
        let first = player.step(&input, 16.6, &terrain, &materials, 64, 64);
        assert!(first.is_some());
        let second = player.step(&input, 16.6, &terrain, &materials, 64, 64);
        assert!(second.is_none());
    }
}
