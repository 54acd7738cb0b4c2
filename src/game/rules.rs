//! Game tuning constants and per-match rules

use std::time::Duration;

/// Playfield size in canvas units
pub const CANVAS_WIDTH: f32 = 1200.0;
pub const CANVAS_HEIGHT: f32 = 700.0;

/// Stroke width of a trail, also the hit distance for trail collisions
pub const TRAIL_WIDTH: f32 = 4.0;

/// Power-up pickup radius (also the drawn icon radius)
pub const POWERUP_RADIUS: f32 = 20.0;

/// Distinct player colors, one per seat
pub const PLAYER_COLORS: [&str; 10] = [
    "#E20074", // Magenta
    "#00D68F", // Green
    "#FFD700", // Gold
    "#00BFFF", // Deep Sky Blue
    "#FF4444", // Red
    "#FF69B4", // Hot Pink
    "#7FFF00", // Chartreuse
    "#FF8C00", // Dark Orange
    "#9370DB", // Medium Purple
    "#00CED1", // Dark Turquoise
];

/// Control scheme labels, one per seat
pub const CONTROL_SCHEMES: [&str; 10] = [
    "A/D", "Arrows", "J/L", "Z/C", "4/6", "F/H", "Q/E", "U/O", "V/N", "7/9",
];

/// Rules a match is played with
#[derive(Debug, Clone)]
pub struct GameRules {
    /// Maximum number of seats
    pub max_players: usize,
    /// Fewer players than this cannot play a round
    pub min_players: usize,
    /// Score that ends the match
    pub winning_score: u32,

    /// Movement per tick without power-ups
    pub base_speed: f32,
    /// Heading change per tick while turning (radians)
    pub turn_speed: f32,
    /// Period of the gap cycle in ticks
    pub gap_interval: u32,
    /// Ticks per cycle during which no trail is emitted
    pub gap_length: u32,
    /// Most recent own trail points ignored by the self-collision check
    pub self_skip_points: usize,
    /// Two heads closer than this both die
    pub head_on_distance: f32,

    /// Ticks between power-up spawn attempts
    pub powerup_spawn_interval: u64,
    /// Cap on power-ups lying on the field
    pub max_powerups: usize,
    /// How long a picked-up effect lasts, in ticks
    pub powerup_duration: u64,

    /// Lifetime of collision effects in ticks
    pub collision_effect_frames: u64,
    /// Lifetime of pickup effects in ticks
    pub pickup_effect_frames: u64,

    /// Countdown length in whole seconds
    pub countdown_secs: u32,
    /// Pause between countdown steps
    pub countdown_step: Duration,
    /// Pause between a decided round and the next one
    pub round_restart_delay: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_players: PLAYER_COLORS.len(),
            min_players: 2,
            winning_score: 5,
            base_speed: 2.0,
            turn_speed: 0.05,
            gap_interval: 100,
            gap_length: 15,
            self_skip_points: 10,
            head_on_distance: TRAIL_WIDTH * 2.0,
            powerup_spawn_interval: 300,
            max_powerups: 3,
            powerup_duration: 600,
            collision_effect_frames: 45,
            pickup_effect_frames: 30,
            countdown_secs: 3,
            countdown_step: Duration::from_secs(1),
            round_restart_delay: Duration::from_secs(3),
        }
    }
}

impl GameRules {
    /// Whether a gap counter value falls inside the no-trail window
    pub fn in_gap(&self, gap_counter: u32) -> bool {
        gap_counter % self.gap_interval < self.gap_length
    }
}
