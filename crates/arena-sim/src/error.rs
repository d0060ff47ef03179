//! Error taxonomy (spec §7). Protocol and subscriber errors live in
//! `arena-server`/`arena-proto`; this crate only carries the categories that
//! originate inside the simulation itself: subsystem errors (recoverable,
//! logged once with a scope tag) and fatal startup errors.
//!
//! Invariant violations are not represented as `Err` at all: per spec §7 they
//! are a debug-assert-or-repair decision made at the call site, tracked via
//! `World`'s diagnostic counters, because "no error escapes the tick
//! boundary" rules out surfacing them as a `Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to allocate terrain buffer for {width}x{height}")]
    TerrainAllocation { width: u32, height: u32 },

    #[error("sand worker timed out after {millis}ms, falling back to in-thread update")]
    WorkerTimeout { millis: u64 },
}

pub type SimResult<T> = Result<T, SimError>;
