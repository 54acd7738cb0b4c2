//! Match task: owns the engine and runs the authoritative tick loop

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant as StdInstant;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_duration, unix_millis};
use crate::ws::protocol::{ClientMsg, Phase, ServerMsg};

use super::engine::{JoinError, MatchEngine};
use super::rules::GameRules;
use super::snapshot::{SnapshotBuilder, SnapshotStats, TrailDetail};
use super::{InputEvent, PlayerInput};

/// Serialized server message, shared by every receiver
pub type Outbound = Arc<str>;

/// Frames between throughput log lines
const STATS_LOG_INTERVAL: u64 = 600;

/// Inputs queued longer than this are logged
const INPUT_QUEUE_WARN_MS: u64 = 100;

/// Handle to the running match
#[derive(Clone)]
pub struct MatchHandle {
    pub input_tx: mpsc::Sender<PlayerInput>,
    player_count: Arc<AtomicUsize>,
    connection_count: Arc<AtomicUsize>,
}

impl MatchHandle {
    /// Seated players
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Open sockets, seated or spectating
    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }
}

/// The authoritative game match
pub struct GameMatch {
    engine: MatchEngine,
    input_rx: mpsc::Receiver<PlayerInput>,
    broadcast_tx: broadcast::Sender<Outbound>,
    connections: HashMap<Uuid, mpsc::Sender<Outbound>>,
    stats: SnapshotStats,
    player_count: Arc<AtomicUsize>,
    connection_count: Arc<AtomicUsize>,
}

impl GameMatch {
    /// Create the match and the handle connections use to reach it
    pub fn new(rules: GameRules, seed: u64) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(256);
        let player_count = Arc::new(AtomicUsize::new(0));
        let connection_count = Arc::new(AtomicUsize::new(0));

        let handle = MatchHandle {
            input_tx,
            player_count: player_count.clone(),
            connection_count: connection_count.clone(),
        };

        let game_match = Self {
            engine: MatchEngine::new(rules, seed),
            input_rx,
            broadcast_tx,
            connections: HashMap::new(),
            stats: SnapshotStats::default(),
            player_count,
            connection_count,
        };

        (game_match, handle)
    }

    /// Run until every handle is dropped.
    ///
    /// Inputs, ticks and scheduled transitions are handled one at a time,
    /// so the engine needs no locking.
    pub async fn run(mut self) {
        info!(winning_score = self.engine.rules().winning_score, "Match loop started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.engine.next_deadline();

            tokio::select! {
                input = self.input_rx.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
                _ = tick_interval.tick() => self.on_tick(),
                _ = wait_for(deadline) => self.on_deadline(),
            }
        }

        info!(
            snapshots = self.stats.snapshots,
            frames = self.stats.frames,
            total_bytes = self.stats.total_bytes,
            "Match loop stopped"
        );
    }

    fn handle_input(&mut self, input: PlayerInput) {
        let conn_id = input.conn_id;
        if let Some(queued_ms) = slow_input(input.received_at, unix_millis()) {
            warn!(conn_id = %conn_id, queued_ms, "Input waited behind the match loop");
        }
        match input.event {
            InputEvent::Connected { outbox, subscribed } => {
                let snapshot = SnapshotBuilder::full(&self.engine, TrailDetail::Include);
                if let Some(text) = self.encode(&snapshot) {
                    if outbox.try_send(text).is_err() {
                        warn!(conn_id = %conn_id, "Could not queue initial snapshot");
                    }
                }
                self.connections.insert(conn_id, outbox);
                self.sync_connection_count();
                if subscribed.send(self.broadcast_tx.subscribe()).is_err() {
                    debug!(conn_id = %conn_id, "Connection gone before subscribing");
                    self.connections.remove(&conn_id);
                    self.sync_connection_count();
                    return;
                }
                debug!(conn_id = %conn_id, connections = self.connections.len(), "Connection registered");
            }
            InputEvent::Message(msg) => self.handle_message(conn_id, msg),
            InputEvent::Resync => {
                debug!(conn_id = %conn_id, "Resyncing lagged connection");
                let snapshot = SnapshotBuilder::full(&self.engine, TrailDetail::Include);
                self.send_to(conn_id, &snapshot);
            }
            InputEvent::Disconnected => {
                self.connections.remove(&conn_id);
                self.sync_connection_count();
                if self.engine.disconnect(conn_id) {
                    self.sync_player_count();
                    self.broadcast_snapshot(TrailDetail::Omit);
                }
            }
        }
    }

    fn handle_message(&mut self, conn_id: Uuid, msg: ClientMsg) {
        match msg {
            ClientMsg::JoinGame { name } => match self.engine.join(conn_id, &name).map(|_| ()) {
                Ok(()) => {
                    self.sync_player_count();
                    self.broadcast_snapshot(TrailDetail::Omit);
                }
                Err(e @ JoinError::GameFull { .. }) => {
                    info!(conn_id = %conn_id, "Join rejected, match full");
                    self.send_to(
                        conn_id,
                        &ServerMsg::Error {
                            message: e.to_string(),
                        },
                    );
                }
                Err(JoinError::AlreadyJoined) => {
                    warn!(conn_id = %conn_id, "Player already in match");
                }
            },
            ClientMsg::PlayerReady => {
                if self.engine.ready(conn_id, now()) {
                    self.broadcast_snapshot(TrailDetail::Omit);
                }
            }
            ClientMsg::PlayerInput { turning } => {
                self.engine.set_turning(conn_id, turning);
            }
        }
    }

    fn on_tick(&mut self) {
        match self.engine.phase() {
            Phase::Playing => {
                let outcome = self.engine.tick(now());
                match outcome.round {
                    // Trails ride along so the final picture survives the phase change
                    Some(_) => self.broadcast_snapshot(TrailDetail::Include),
                    None => {
                        let frame = SnapshotBuilder::delta(&self.engine, outcome.trail_updates);
                        self.broadcast(&frame);
                    }
                }

                if self.engine.frame() % STATS_LOG_INTERVAL == 0 {
                    debug!(
                        frame = self.engine.frame(),
                        alive = self.engine.alive_count(),
                        frames_sent = self.stats.frames,
                        total_bytes = self.stats.total_bytes,
                        "Tick stats"
                    );
                }
            }
            Phase::RoundEnd if !self.engine.effects().is_empty() => {
                self.engine.tick_cosmetic();
                let frame = SnapshotBuilder::delta(&self.engine, Vec::new());
                self.broadcast(&frame);
            }
            _ => {}
        }
    }

    fn on_deadline(&mut self) {
        if let Some(transition) = self.engine.run_due(now()) {
            debug!(?transition, phase = ?self.engine.phase(), "Scheduled transition");
            self.broadcast_snapshot(TrailDetail::Omit);
        }
    }

    fn sync_connection_count(&self) {
        self.connection_count
            .store(self.connections.len(), Ordering::Relaxed);
    }

    fn sync_player_count(&self) {
        self.player_count
            .store(self.engine.players().len(), Ordering::Relaxed);
    }

    fn broadcast_snapshot(&mut self, trails: TrailDetail) {
        let snapshot = SnapshotBuilder::full(&self.engine, trails);
        self.broadcast(&snapshot);
    }

    fn broadcast(&mut self, msg: &ServerMsg) {
        if let Some(text) = self.encode(msg) {
            // No receivers is fine: nobody is watching
            let _ = self.broadcast_tx.send(text);
        }
    }

    fn send_to(&mut self, conn_id: Uuid, msg: &ServerMsg) {
        let Some(text) = self.encode(msg) else {
            return;
        };
        if let Some(outbox) = self.connections.get(&conn_id) {
            if outbox.try_send(text).is_err() {
                warn!(conn_id = %conn_id, "Outbox full, dropping direct message");
            }
        }
    }

    fn encode(&mut self, msg: &ServerMsg) -> Option<Outbound> {
        match serde_json::to_string(msg) {
            Ok(json) => {
                self.stats.record(msg, json.len());
                Some(Arc::from(json))
            }
            Err(e) => {
                error!(error = %e, "Failed to encode server message");
                None
            }
        }
    }
}

/// Current time on the runtime clock, as the engine's `Instant`
fn now() -> StdInstant {
    Instant::now().into_std()
}

/// Time an input spent queued, when it is over the warning threshold
fn slow_input(received_at: u64, now_ms: u64) -> Option<u64> {
    let queued_ms = now_ms.saturating_sub(received_at);
    (queued_ms > INPUT_QUEUE_WARN_MS).then_some(queued_ms)
}

/// Sleep until the scheduled deadline, or forever when nothing is scheduled
async fn wait_for(deadline: Option<StdInstant>) {
    match deadline {
        Some(deadline) => sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
