//! Snapshot and delta building for network transmission

use crate::ws::protocol::{
    DeltaFrame, PlayerFrame, PlayerSnapshot, ServerMsg, Snapshot, TrailIncrement,
};

use super::engine::MatchEngine;
use super::player::Player;

/// Whether a full snapshot carries trail history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailDetail {
    /// Players only
    Omit,
    /// Every player's complete trail
    Include,
}

/// Builds wire messages from the engine state
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Full match snapshot
    pub fn full(engine: &MatchEngine, trails: TrailDetail) -> ServerMsg {
        let players = engine
            .players()
            .iter()
            .map(|p| Self::player_snapshot(p, trails))
            .collect();

        ServerMsg::GameState(Snapshot {
            phase: engine.phase(),
            countdown: engine.countdown(),
            frame_count: engine.frame(),
            ready_players: engine.ready_players().collect(),
            effects: engine.effects().iter().map(|e| e.to_wire()).collect(),
            powerups: engine.powerups().iter().map(|p| p.to_wire()).collect(),
            players,
        })
    }

    /// Per-tick delta: dynamic player fields plus this tick's trail points
    pub fn delta(engine: &MatchEngine, trail_updates: Vec<TrailIncrement>) -> ServerMsg {
        let players = engine
            .players()
            .iter()
            .map(|p| PlayerFrame {
                id: p.id,
                x: p.x,
                y: p.y,
                angle: p.angle,
                alive: p.alive,
                score: p.score,
                speed: p.speed,
                powerup: p.powerup.map(|a| a.to_wire()),
            })
            .collect();

        ServerMsg::Frame(DeltaFrame {
            phase: engine.phase(),
            countdown: engine.countdown(),
            frame_count: engine.frame(),
            effects: engine.effects().iter().map(|e| e.to_wire()).collect(),
            powerups: engine.powerups().iter().map(|p| p.to_wire()).collect(),
            players,
            trail_updates,
        })
    }

    fn player_snapshot(p: &Player, trails: TrailDetail) -> PlayerSnapshot {
        PlayerSnapshot {
            id: p.id,
            name: p.name.clone(),
            color: p.color.to_string(),
            controls: p.controls.to_string(),
            x: p.x,
            y: p.y,
            angle: p.angle,
            alive: p.alive,
            score: p.score,
            speed: p.speed,
            powerup: p.powerup.map(|a| a.to_wire()),
            trail: match trails {
                TrailDetail::Include => Some(p.trail.clone()),
                TrailDetail::Omit => None,
            },
        }
    }
}

/// Running byte counters for outgoing messages
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub snapshots: u64,
    pub frames: u64,
    pub total_bytes: u64,
}

impl SnapshotStats {
    pub fn record(&mut self, msg: &ServerMsg, bytes: usize) {
        match msg {
            ServerMsg::GameState(_) => self.snapshots += 1,
            ServerMsg::Frame(_) => self.frames += 1,
            ServerMsg::Error { .. } => {}
        }
        self.total_bytes += bytes as u64;
    }
}
