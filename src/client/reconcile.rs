//! Client-side view of the match, rebuilt from snapshots and merged from deltas
//!
//! `reconcile` is the only writer of the cached view. It never draws; it
//! returns `RenderHints` telling the trail layer whether to keep, clear,
//! rebuild or extend its raster.

use std::collections::HashMap;

use uuid::Uuid;

use crate::ws::protocol::{
    ActivePowerUpState, DeltaFrame, EffectState, Phase, PlayerFrame, PlayerSnapshot, PowerUpState,
    ServerMsg, Snapshot, TrailPoint,
};

/// Stroke color for a player first seen in a delta, before any snapshot named it
pub const UNKNOWN_PLAYER_COLOR: &str = "#FFFFFF";

/// Cached player. Static fields come from snapshots only.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPlayer {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub controls: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub alive: bool,
    pub score: u32,
    pub speed: f32,
    pub powerup: Option<ActivePowerUpState>,
}

impl CachedPlayer {
    fn from_snapshot(p: &PlayerSnapshot) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            color: p.color.clone(),
            controls: p.controls.clone(),
            x: p.x,
            y: p.y,
            angle: p.angle,
            alive: p.alive,
            score: p.score,
            speed: p.speed,
            powerup: p.powerup,
        }
    }

    fn from_frame(p: &PlayerFrame) -> Self {
        Self {
            id: p.id,
            name: String::new(),
            color: UNKNOWN_PLAYER_COLOR.to_string(),
            controls: String::new(),
            x: p.x,
            y: p.y,
            angle: p.angle,
            alive: p.alive,
            score: p.score,
            speed: p.speed,
            powerup: p.powerup,
        }
    }

    fn merge_frame(&mut self, p: &PlayerFrame) {
        self.x = p.x;
        self.y = p.y;
        self.angle = p.angle;
        self.alive = p.alive;
        self.score = p.score;
        self.speed = p.speed;
        self.powerup = p.powerup;
    }
}

/// Locally cached match state
#[derive(Debug, Clone, PartialEq)]
pub struct ClientView {
    pub phase: Phase,
    pub countdown: u32,
    pub frame_count: u64,
    pub ready_players: Vec<Uuid>,
    pub effects: Vec<EffectState>,
    pub powerups: Vec<PowerUpState>,
    pub players: Vec<CachedPlayer>,
    /// Last trail point drawn per player, the anchor for the next segment
    pub last_points: HashMap<Uuid, TrailPoint>,
}

impl ClientView {
    pub fn player(&self, id: Uuid) -> Option<&CachedPlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    fn from_frame(frame: &DeltaFrame) -> Self {
        Self {
            phase: frame.phase,
            countdown: frame.countdown,
            frame_count: frame.frame_count,
            ready_players: Vec::new(),
            effects: frame.effects.clone(),
            powerups: frame.powerups.clone(),
            players: frame.players.iter().map(CachedPlayer::from_frame).collect(),
            last_points: HashMap::new(),
        }
    }
}

/// One trail segment to stroke
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub color: String,
    pub from: TrailPoint,
    pub to: TrailPoint,
}

/// What the trail raster must do after a message
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrailUpdate {
    /// Raster stays as it is
    #[default]
    Unchanged,
    /// Wipe the raster
    Clear,
    /// Wipe, then stroke every listed segment
    Rebuild(Vec<Segment>),
    /// Stroke the listed segments on top of the current raster
    Append(Vec<Segment>),
}

/// Invalidation hints produced alongside the new view
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderHints {
    pub trail: TrailUpdate,
    /// Phase differs from the previously cached one (screen layout must change)
    pub phase_changed: bool,
    /// User-facing error text to surface
    pub error: Option<String>,
}

/// Fold one server message into the cached view
pub fn reconcile(prev: Option<ClientView>, msg: &ServerMsg) -> (Option<ClientView>, RenderHints) {
    match msg {
        ServerMsg::GameState(snapshot) => {
            let (view, hints) = apply_snapshot(prev, snapshot);
            (Some(view), hints)
        }
        ServerMsg::Frame(frame) => {
            let (view, hints) = apply_frame(prev, frame);
            (Some(view), hints)
        }
        ServerMsg::Error { message } => (
            prev,
            RenderHints {
                error: Some(message.clone()),
                ..RenderHints::default()
            },
        ),
    }
}

fn apply_snapshot(prev: Option<ClientView>, snapshot: &Snapshot) -> (ClientView, RenderHints) {
    let prev_phase = prev.as_ref().map(|v| v.phase);
    let mut last_points = prev.map(|v| v.last_points).unwrap_or_default();

    let phase_changed = prev_phase != Some(snapshot.phase);
    let carries_trails = snapshot.players.iter().any(|p| p.trail.is_some());
    let has_trail_points = snapshot
        .players
        .iter()
        .any(|p| p.trail.as_ref().is_some_and(|t| !t.is_empty()));

    let mut trail = TrailUpdate::Unchanged;
    if phase_changed {
        let crosses_playing =
            snapshot.phase == Phase::Playing || prev_phase == Some(Phase::Playing);
        if (crosses_playing && !has_trail_points) || snapshot.phase == Phase::Lobby {
            last_points.clear();
            trail = TrailUpdate::Clear;
        }
    }

    if carries_trails {
        last_points.clear();
        let mut segments = Vec::new();
        for player in &snapshot.players {
            let Some(points) = player.trail.as_deref() else {
                continue;
            };
            for pair in points.windows(2) {
                if !pair[1].after_gap {
                    segments.push(Segment {
                        color: player.color.clone(),
                        from: pair[0],
                        to: pair[1],
                    });
                }
            }
            if let Some(last) = points.last() {
                last_points.insert(player.id, *last);
            }
        }
        trail = TrailUpdate::Rebuild(segments);
    }

    let view = ClientView {
        phase: snapshot.phase,
        countdown: snapshot.countdown,
        frame_count: snapshot.frame_count,
        ready_players: snapshot.ready_players.clone(),
        effects: snapshot.effects.clone(),
        powerups: snapshot.powerups.clone(),
        players: snapshot.players.iter().map(CachedPlayer::from_snapshot).collect(),
        last_points,
    };

    let hints = RenderHints {
        trail,
        phase_changed,
        error: None,
    };
    (view, hints)
}

fn apply_frame(prev: Option<ClientView>, frame: &DeltaFrame) -> (ClientView, RenderHints) {
    // Nothing cached yet: start from the frame, no anchors to draw from
    let Some(mut view) = prev else {
        return (
            ClientView::from_frame(frame),
            RenderHints {
                phase_changed: true,
                ..RenderHints::default()
            },
        );
    };

    let phase_changed = view.phase != frame.phase;
    view.phase = frame.phase;
    view.countdown = frame.countdown;
    view.frame_count = frame.frame_count;
    view.effects = frame.effects.clone();
    view.powerups = frame.powerups.clone();

    let mut cached: HashMap<Uuid, CachedPlayer> =
        view.players.drain(..).map(|p| (p.id, p)).collect();
    view.players = frame
        .players
        .iter()
        .map(|update| match cached.remove(&update.id) {
            Some(mut player) => {
                player.merge_frame(update);
                player
            }
            None => CachedPlayer::from_frame(update),
        })
        .collect();

    let mut segments = Vec::new();
    for increment in &frame.trail_updates {
        let Some(player) = view.players.iter().find(|p| p.id == increment.player_id) else {
            continue;
        };
        let point = increment.point;
        if let Some(last) = view.last_points.get(&player.id) {
            if !point.after_gap {
                segments.push(Segment {
                    color: player.color.clone(),
                    from: *last,
                    to: point,
                });
            }
        }
        view.last_points.insert(player.id, point);
    }

    let trail = if segments.is_empty() {
        TrailUpdate::Unchanged
    } else {
        TrailUpdate::Append(segments)
    };

    (
        view,
        RenderHints {
            trail,
            phase_changed,
            error: None,
        },
    )
}
