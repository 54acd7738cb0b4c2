//! Cosmetic collision and pickup effects

use crate::ws::protocol::{EffectKind, EffectState};

#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub id: u32,
    pub kind: EffectKind,
    pub x: f32,
    pub y: f32,
    pub colors: Vec<&'static str>,
    pub created_at: u64,
    pub duration: u64,
}

impl Effect {
    pub fn is_expired(&self, frame: u64) -> bool {
        frame.saturating_sub(self.created_at) >= self.duration
    }

    pub fn to_wire(&self) -> EffectState {
        EffectState {
            id: self.id,
            kind: self.kind,
            x: self.x,
            y: self.y,
            colors: self.colors.iter().map(|c| c.to_string()).collect(),
            created_at_frame: self.created_at,
            duration_frames: self.duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary() {
        let effect = Effect {
            id: 1,
            kind: EffectKind::Player,
            x: 0.0,
            y: 0.0,
            colors: vec!["#E20074", "#00D68F"],
            created_at: 100,
            duration: 45,
        };
        assert!(!effect.is_expired(100));
        assert!(!effect.is_expired(144));
        assert!(effect.is_expired(145));
    }
}
