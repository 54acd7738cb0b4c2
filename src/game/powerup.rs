//! Power-ups lying on the field

use rand::Rng;

use crate::ws::protocol::{PowerUpKind, PowerUpState};

use super::rules::{CANVAS_HEIGHT, CANVAS_WIDTH, POWERUP_RADIUS};

#[derive(Debug, Clone, PartialEq)]
pub struct PowerUp {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub kind: PowerUpKind,
    pub spawned_at: u64,
}

impl PowerUp {
    /// Roll a power-up at a uniform position inside the canvas, inset by its radius
    pub fn random<R: Rng>(rng: &mut R, id: u32, frame: u64) -> Self {
        let x = rng.gen_range(POWERUP_RADIUS..=CANVAS_WIDTH - POWERUP_RADIUS);
        let y = rng.gen_range(POWERUP_RADIUS..=CANVAS_HEIGHT - POWERUP_RADIUS);
        let kind = PowerUpKind::ALL[rng.gen_range(0..PowerUpKind::ALL.len())];
        Self {
            id,
            x,
            y,
            kind,
            spawned_at: frame,
        }
    }

    pub fn to_wire(&self) -> PowerUpState {
        PowerUpState {
            id: self.id,
            x: self.x,
            y: self.y,
            kind: self.kind,
            color: self.kind.color().to_string(),
            multiplier: self.kind.multiplier(),
            spawned_at_frame: self.spawned_at,
        }
    }
}
