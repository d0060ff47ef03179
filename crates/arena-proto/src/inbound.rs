//! Messages a subscriber sends to the core (spec §6 "Inbound message shapes").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "input")]
    Input { input: PlayerInput },

    #[serde(rename = "projectile")]
    Projectile {
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        #[serde(rename = "type")]
        spell_type: String,
        #[serde(rename = "clientProjectileId")]
        client_projectile_id: Option<u64>,
    },

    #[serde(rename = "terrain_destroy")]
    TerrainDestroy {
        x: i64,
        y: i64,
        radius: f32,
        explosive: bool,
    },

    #[serde(rename = "ping")]
    Ping { timestamp: u64 },
}

/// One tick's worth of decoded client input. `selected_spell` is accepted
/// here but the player's internally-tracked spell stays authoritative
/// between explicit updates (spec §9 open question, resolved in DESIGN.md).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlayerInput {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub shoot: bool,
    #[serde(rename = "mouseX")]
    pub mouse_x: f32,
    #[serde(rename = "mouseY")]
    pub mouse_y: f32,
    pub sequence: u64,
    #[serde(rename = "selectedSpell")]
    pub selected_spell: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_input_message() {
        let json = r#"{"type":"input","input":{"left":true,"right":false,"jump":false,"shoot":true,"mouseX":10.0,"mouseY":20.0,"sequence":5,"selectedSpell":2}}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap();
        match msg {
            InboundMessage::Input { input } => {
                assert!(input.left);
                assert_eq!(input.sequence, 5);
                assert_eq!(input.selected_spell, Some(2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_terrain_destroy() {
        let json = r#"{"type":"terrain_destroy","x":800,"y":500,"radius":15.0,"explosive":true}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, InboundMessage::TerrainDestroy { radius, .. } if radius == 15.0));
    }

    #[test]
    fn rejects_unknown_tag() {
        let json = r#"{"type":"teleport","x":1}"#;
        assert!(serde_json::from_str::<InboundMessage>(json).is_err());
    }
}
