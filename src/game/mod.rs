//! Game simulation modules

pub mod collision;
pub mod effects;
pub mod engine;
pub mod r#match;
pub mod physics;
pub mod player;
pub mod powerup;
pub mod rules;
pub mod schedule;
pub mod snapshot;

pub use engine::{JoinError, MatchEngine, RoundResult, TickOutcome, Transition};
pub use r#match::{GameMatch, MatchHandle, Outbound};
pub use rules::GameRules;

use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use crate::ws::protocol::ClientMsg;

/// Connection event delivered to the match task
#[derive(Debug)]
pub struct PlayerInput {
    pub conn_id: Uuid,
    pub event: InputEvent,
    /// Unix millis when the socket task queued the event
    pub received_at: u64,
}

#[derive(Debug)]
pub enum InputEvent {
    /// Socket opened. The match sends the initial snapshot into `outbox`
    /// and hands back a broadcast subscription taken at that same instant.
    Connected {
        outbox: mpsc::Sender<Outbound>,
        subscribed: oneshot::Sender<broadcast::Receiver<Outbound>>,
    },
    /// Parsed client message
    Message(ClientMsg),
    /// Broadcasts were dropped for this socket. Reply with a full snapshot
    /// including trails through its outbox.
    Resync,
    /// Socket closed
    Disconnected,
}
