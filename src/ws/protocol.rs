//! WebSocket protocol message definitions
//! These are the wire types for client-server communication, shared by the
//! match task and the client-side cache.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Match phase as seen on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Players join and signal ready
    #[default]
    Lobby,
    /// Seconds ticking down before the first round
    Countdown,
    /// Round in progress, simulation running
    Playing,
    /// Round decided, waiting for the automatic restart
    RoundEnd,
    /// Someone reached the winning score
    GameOver,
}

/// Steering intent for one player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Turning {
    Left,
    #[default]
    Straight,
    Right,
}

impl Turning {
    /// Signed multiplier applied to the turn speed
    pub fn factor(self) -> f32 {
        match self {
            Turning::Left => -1.0,
            Turning::Straight => 0.0,
            Turning::Right => 1.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("turning must be -1, 0 or 1, got {0}")]
pub struct InvalidTurning(pub i8);

impl TryFrom<i8> for Turning {
    type Error = InvalidTurning;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Turning::Left),
            0 => Ok(Turning::Straight),
            1 => Ok(Turning::Right),
            other => Err(InvalidTurning(other)),
        }
    }
}

impl From<Turning> for i8 {
    fn from(turning: Turning) -> Self {
        match turning {
            Turning::Left => -1,
            Turning::Straight => 0,
            Turning::Right => 1,
        }
    }
}

/// Power-up types that can spawn on the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    /// Faster movement
    SpeedBoost,
    /// Slower movement
    SpeedSlow,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 2] = [PowerUpKind::SpeedBoost, PowerUpKind::SpeedSlow];

    /// Factor applied to the base speed while the effect lasts
    pub fn multiplier(self) -> f32 {
        match self {
            PowerUpKind::SpeedBoost => 1.5,
            PowerUpKind::SpeedSlow => 0.5,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            PowerUpKind::SpeedBoost => "#00FF00",
            PowerUpKind::SpeedSlow => "#FF0000",
        }
    }
}

/// Cosmetic effect categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    /// Player ran into their own trail
    #[serde(rename = "self")]
    SelfHit,
    /// Player ran into someone else's trail
    #[serde(rename = "trail")]
    Trail,
    /// Two heads collided
    #[serde(rename = "player")]
    Player,
    /// Power-up picked up
    #[serde(rename = "powerup")]
    PowerUp,
}

/// One recorded trail position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
    /// The segment from the previous point must not be drawn or hit-tested
    #[serde(default)]
    pub after_gap: bool,
}

impl TrailPoint {
    pub fn new(x: f32, y: f32, after_gap: bool) -> Self {
        Self { x, y, after_gap }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Take a seat in the match
    JoinGame {
        /// Display name, replaced by a default when blank
        #[serde(default)]
        name: String,
    },

    /// Ready for the next countdown
    PlayerReady,

    /// Steering input, latest one wins before the next tick
    PlayerInput { turning: Turning },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full match snapshot
    GameState(Snapshot),

    /// Per-tick delta carrying only new trail points
    Frame(DeltaFrame),

    /// User-facing error
    Error { message: String },
}

/// Complete match state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(rename = "state")]
    pub phase: Phase,
    pub countdown: u32,
    pub frame_count: u64,
    pub ready_players: Vec<Uuid>,
    pub effects: Vec<EffectState>,
    pub powerups: Vec<PowerUpState>,
    pub players: Vec<PlayerSnapshot>,
}

/// Player in a full snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    /// Control scheme label
    pub controls: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub alive: bool,
    pub score: u32,
    pub speed: f32,
    pub powerup: Option<ActivePowerUpState>,
    /// Full trail history, only present when the sender chose to include it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trail: Option<Vec<TrailPoint>>,
}

/// Lightweight per-tick update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaFrame {
    #[serde(rename = "state")]
    pub phase: Phase,
    pub countdown: u32,
    pub frame_count: u64,
    pub effects: Vec<EffectState>,
    pub powerups: Vec<PowerUpState>,
    pub players: Vec<PlayerFrame>,
    /// Points appended this tick, in emission order
    pub trail_updates: Vec<TrailIncrement>,
}

/// Dynamic player fields carried by a delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerFrame {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub alive: bool,
    pub score: u32,
    pub speed: f32,
    pub powerup: Option<ActivePowerUpState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailIncrement {
    pub player_id: Uuid,
    pub point: TrailPoint,
}

/// Power-up effect currently applied to a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePowerUpState {
    #[serde(rename = "type")]
    pub kind: PowerUpKind,
    pub end_frame: u64,
}

/// Power-up waiting on the field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUpState {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: PowerUpKind,
    pub color: String,
    pub multiplier: f32,
    pub spawned_at_frame: u64,
}

/// Cosmetic effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectState {
    pub id: u32,
    pub kind: EffectKind,
    pub x: f32,
    pub y: f32,
    pub colors: Vec<String>,
    pub created_at_frame: u64,
    pub duration_frames: u64,
}
