//! Player and projectile physics: per-axis swept pixel collision and raycast
//! ballistics (spec §4.4).

pub mod player;
pub mod projectile;

pub use player::Player;
pub use projectile::{Projectile, SpellKind};

/// Player hitbox, in pixels (spec §3: "size 6x12").
pub const PLAYER_WIDTH: i64 = 6;
pub const PLAYER_HEIGHT: i64 = 12;
/// Maximum step-up height during horizontal collision response (spec §4.4).
pub const MAX_STEP_HEIGHT: i64 = 3;
pub const GRAVITY: f32 = 0.3;
pub const IDLE_DAMPING: f32 = 0.8;
pub const MAX_FALL_SPEED: f32 = 12.0;
pub const PROJECTILE_MAX_LIFETIME_MS: f32 = 3000.0;
