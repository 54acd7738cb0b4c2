//! Authoritative player state

use uuid::Uuid;

use crate::ws::protocol::{ActivePowerUpState, PowerUpKind, TrailPoint, Turning};

/// Power-up effect applied to a player until `expires_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePowerUp {
    pub kind: PowerUpKind,
    /// Frame at which the effect is removed
    pub expires_at: u64,
}

impl ActivePowerUp {
    pub fn to_wire(self) -> ActivePowerUpState {
        ActivePowerUpState {
            kind: self.kind,
            end_frame: self.expires_at,
        }
    }
}

/// Player state in the match (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    /// Connection id, unique while the socket lives
    pub id: Uuid,
    pub name: String,
    /// Palette slot, picks color and control scheme
    pub slot: usize,
    pub color: &'static str,
    pub controls: &'static str,

    // Position and movement
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub speed: f32,
    pub turning: Turning,

    pub alive: bool,
    pub score: u32,

    // Trail emission
    pub trail: Vec<TrailPoint>,
    pub gap_counter: u32,
    /// A gap window was skipped since the last emitted point
    pub gap_pending: bool,
    /// Position wrapped since the last emitted point
    pub just_wrapped: bool,

    pub powerup: Option<ActivePowerUp>,
}

impl Player {
    pub fn new(
        id: Uuid,
        name: String,
        slot: usize,
        color: &'static str,
        controls: &'static str,
        base_speed: f32,
        gap_counter: u32,
    ) -> Self {
        Self {
            id,
            name,
            slot,
            color,
            controls,
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            speed: base_speed,
            turning: Turning::Straight,
            alive: false,
            score: 0,
            trail: Vec::new(),
            gap_counter,
            gap_pending: false,
            just_wrapped: false,
            powerup: None,
        }
    }

    /// Put the player on a fresh start line for a new round
    pub fn reset_for_round(&mut self, x: f32, y: f32, angle: f32, base_speed: f32, gap_counter: u32) {
        self.x = x;
        self.y = y;
        self.angle = angle;
        self.speed = base_speed;
        self.turning = Turning::Straight;
        self.alive = true;
        self.trail.clear();
        self.gap_counter = gap_counter;
        self.gap_pending = false;
        self.just_wrapped = false;
        self.powerup = None;
    }

    /// Apply a power-up, replacing any active one
    pub fn apply_powerup(&mut self, kind: PowerUpKind, frame: u64, duration: u64, base_speed: f32) {
        self.speed = base_speed * kind.multiplier();
        self.powerup = Some(ActivePowerUp {
            kind,
            expires_at: frame + duration,
        });
    }

    /// Drop an expired power-up and restore base speed.
    /// Returns true if an effect was removed
    pub fn expire_powerup(&mut self, frame: u64, base_speed: f32) -> bool {
        match self.powerup {
            Some(active) if frame >= active.expires_at => {
                self.powerup = None;
                self.speed = base_speed;
                true
            }
            _ => false,
        }
    }

    /// Append a trail point, marking it as a break when a gap or wrap preceded it
    pub fn emit_trail_point(&mut self) -> TrailPoint {
        let after_gap = self.just_wrapped || (self.gap_pending && !self.trail.is_empty());
        let point = TrailPoint::new(self.x, self.y, after_gap);
        self.trail.push(point);
        self.just_wrapped = false;
        self.gap_pending = false;
        point
    }
}
