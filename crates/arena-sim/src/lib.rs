//! Deterministic simulation core for the pixel arena: terrain, falling sand,
//! player/projectile kinematics, chunk interest management, and the
//! authoritative tick loop that drives them in a fixed order.
//!
//! Everything here is transport-agnostic. `arena-server` owns the socket,
//! the tick thread, and the config loader; this crate owns only what the
//! world does between "input arrived" and "a state delta is ready to send".

pub mod broadcaster;
pub mod chunk_index;
pub mod coords;
pub mod error;
pub mod interest;
pub mod kinematics;
pub mod material;
pub mod pixel;
pub mod prng;
pub mod sand;
pub mod sim_loop;
pub mod terrain;
pub mod world;

pub use error::{SimError, SimResult};
pub use prng::Prng;
pub use world::World;
