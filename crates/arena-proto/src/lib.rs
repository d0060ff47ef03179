//! Wire schema for the destructible-pixel-arena authoritative core.
//!
//! The core treats the duplex socket transport and JSON framing as an
//! external collaborator (spec §1); this crate only owns the message
//! *shapes* both sides agree on, plus the chunk-key grammar and the
//! startup config surface. Nothing here touches simulation state.

mod chunk_key;
pub mod config;
pub mod inbound;
pub mod outbound;

pub use chunk_key::ChunkKey;

/// Stable subscriber identifier as handed to clients: `player-<base36 counter>`.
pub type SubscriberId = String;

/// Identifier assigned by the server to an authoritative projectile.
pub type ServerProjectileId = u64;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed inbound message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown message tag: {0}")]
    UnknownTag(String),
}

/// Parses one inbound JSON message. Unknown tags are reported, never panic;
/// callers drop the message and keep the connection per spec §7.
pub fn parse_inbound(bytes: &[u8]) -> Result<inbound::InboundMessage, ProtocolError> {
    serde_json::from_slice(bytes).map_err(ProtocolError::Malformed)
}

/// Serializes one outbound message to a JSON text frame.
pub fn encode_outbound(message: &outbound::OutboundMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(ProtocolError::Malformed)
}
