//! Match state machine and the authoritative simulation tick

use std::collections::BTreeSet;
use std::f32::consts::{PI, TAU};
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::{EffectKind, Phase, TrailIncrement, Turning};

use super::collision::{CollisionSystem, TrailHit};
use super::effects::Effect;
use super::physics::PhysicsSystem;
use super::player::Player;
use super::powerup::PowerUp;
use super::rules::{
    GameRules, CANVAS_HEIGHT, CANVAS_WIDTH, CONTROL_SCHEMES, PLAYER_COLORS, POWERUP_RADIUS,
    TRAIL_WIDTH,
};
use super::schedule::{Scheduler, Task};

/// Longest display name kept from a join request
const MAX_NAME_CHARS: usize = 20;

/// Join rejections
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Game is full (max {capacity} players)")]
    GameFull { capacity: usize },

    #[error("Player already joined")]
    AlreadyJoined,
}

/// How a round was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundResult {
    /// Sole survivor, `None` on a draw
    pub winner: Option<Uuid>,
    /// The winner reached the winning score
    pub game_over: bool,
}

/// What a simulation tick produced
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Points appended this tick, in emission order
    pub trail_updates: Vec<TrailIncrement>,
    /// Set when the round ended during this tick
    pub round: Option<RoundResult>,
}

/// Phase changes caused by a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Countdown decremented but not finished
    CountdownTick,
    /// A new round is running
    RoundStarted,
    /// Not enough players remained, back in the lobby
    BackToLobby,
}

/// The single match, owning all mutable game state
pub struct MatchEngine {
    rules: GameRules,
    phase: Phase,
    countdown: u32,
    frame: u64,
    players: Vec<Player>,
    ready: BTreeSet<Uuid>,
    effects: Vec<Effect>,
    powerups: Vec<PowerUp>,
    next_effect_id: u32,
    next_powerup_id: u32,
    scheduler: Scheduler,
    rng: ChaCha8Rng,
}

impl MatchEngine {
    pub fn new(rules: GameRules, seed: u64) -> Self {
        Self {
            rules,
            phase: Phase::Lobby,
            countdown: 0,
            frame: 0,
            players: Vec::new(),
            ready: BTreeSet::new(),
            effects: Vec::new(),
            powerups: Vec::new(),
            next_effect_id: 1,
            next_powerup_id: 1,
            scheduler: Scheduler::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Ready ids in a stable order
    pub fn ready_players(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.ready.iter().copied()
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn powerups(&self) -> &[PowerUp] {
        &self.powerups
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    /// When the pending countdown/restart task is due
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    // ------------------------------------------------------------------
    // Roster and input events
    // ------------------------------------------------------------------

    /// Seat a new player under the connection id
    pub fn join(&mut self, id: Uuid, name: &str) -> Result<&Player, JoinError> {
        if self.player(id).is_some() {
            return Err(JoinError::AlreadyJoined);
        }

        let capacity = self.rules.max_players.min(PLAYER_COLORS.len());
        let slot = (0..capacity)
            .find(|slot| !self.players.iter().any(|p| p.slot == *slot))
            .ok_or(JoinError::GameFull { capacity })?;

        let trimmed: String = name.trim().chars().take(MAX_NAME_CHARS).collect();
        let name = if trimmed.is_empty() {
            format!("Player {}", slot + 1)
        } else {
            trimmed
        };

        let gap_counter = self.random_gap_phase();
        self.players.push(Player::new(
            id,
            name,
            slot,
            PLAYER_COLORS[slot],
            CONTROL_SCHEMES[slot],
            self.rules.base_speed,
            gap_counter,
        ));

        info!(
            conn_id = %id,
            player_count = self.players.len(),
            capacity,
            "Player joined"
        );

        Ok(&self.players[self.players.len() - 1])
    }

    /// Record a ready signal; starts the countdown once everybody is ready.
    /// Returns false when the sender has not joined
    pub fn ready(&mut self, id: Uuid, now: Instant) -> bool {
        if self.player(id).is_none() {
            return false;
        }

        self.ready.insert(id);
        let everyone_ready =
            self.players.len() >= self.rules.min_players && self.ready.len() == self.players.len();

        match self.phase {
            Phase::Lobby if everyone_ready => self.start_countdown(now),
            Phase::GameOver if everyone_ready => {
                self.reset_match();
                self.start_countdown(now);
            }
            _ => {}
        }

        true
    }

    /// Update steering. Ignored unless the sender plays in a running round
    pub fn set_turning(&mut self, id: Uuid, turning: Turning) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }

        match self.players.iter_mut().find(|p| p.id == id) {
            Some(player) => {
                player.turning = turning;
                true
            }
            None => false,
        }
    }

    /// Remove a player. Returns false for unknown ids
    pub fn disconnect(&mut self, id: Uuid) -> bool {
        let Some(index) = self.players.iter().position(|p| p.id == id) else {
            return false;
        };

        let player = self.players.remove(index);
        self.ready.remove(&id);

        info!(
            conn_id = %id,
            name = %player.name,
            player_count = self.players.len(),
            "Player left"
        );

        if self.players.len() < self.rules.min_players && self.phase != Phase::Lobby {
            self.reset_to_lobby();
        }

        true
    }

    // ------------------------------------------------------------------
    // Phase transitions
    // ------------------------------------------------------------------

    pub fn start_countdown(&mut self, now: Instant) {
        self.phase = Phase::Countdown;
        self.countdown = self.rules.countdown_secs;
        self.scheduler
            .schedule(Task::CountdownStep, now + self.rules.countdown_step);
        info!(seconds = self.countdown, "Countdown started");
    }

    /// Run the scheduled task if it is due
    pub fn run_due(&mut self, now: Instant) -> Option<Transition> {
        match self.scheduler.take_due(now)? {
            Task::CountdownStep if self.phase == Phase::Countdown => {
                self.countdown = self.countdown.saturating_sub(1);
                if self.countdown == 0 {
                    self.start_round();
                    Some(Transition::RoundStarted)
                } else {
                    self.scheduler
                        .schedule(Task::CountdownStep, now + self.rules.countdown_step);
                    Some(Transition::CountdownTick)
                }
            }
            Task::RestartRound if self.phase == Phase::RoundEnd => {
                if self.players.len() >= self.rules.min_players {
                    self.start_round();
                    Some(Transition::RoundStarted)
                } else {
                    self.reset_to_lobby();
                    Some(Transition::BackToLobby)
                }
            }
            task => {
                debug!(?task, phase = ?self.phase, "Dropping task for a stale phase");
                None
            }
        }
    }

    /// Reset per-round state and put everyone on the start ring
    pub fn start_round(&mut self) {
        self.scheduler.cancel();
        self.phase = Phase::Playing;
        self.countdown = 0;
        self.frame = 0;
        self.ready.clear();
        self.effects.clear();
        self.powerups.clear();

        let count = self.players.len().max(1) as f32;
        let radius = CANVAS_WIDTH.min(CANVAS_HEIGHT) / 3.0;
        for index in 0..self.players.len() {
            let angle = (index as f32 / count) * TAU;
            let x = CANVAS_WIDTH / 2.0 + angle.cos() * radius;
            let y = CANVAS_HEIGHT / 2.0 + angle.sin() * radius;
            let gap_counter = self.random_gap_phase();
            self.players[index].reset_for_round(x, y, angle + PI, self.rules.base_speed, gap_counter);
        }

        info!(player_count = self.players.len(), "Round started");
    }

    /// Force the lobby, keeping scores
    pub fn reset_to_lobby(&mut self) {
        self.scheduler.cancel();
        self.phase = Phase::Lobby;
        self.countdown = 0;
        self.ready.clear();
        for player in &mut self.players {
            player.alive = false;
            player.trail.clear();
        }
        info!(player_count = self.players.len(), "Back to lobby");
    }

    /// Full reset for a new match: scores zeroed, back in the lobby
    pub fn reset_match(&mut self) {
        for player in &mut self.players {
            player.score = 0;
            player.powerup = None;
            player.speed = self.rules.base_speed;
        }
        self.effects.clear();
        self.powerups.clear();
        self.reset_to_lobby();
        info!("Match reset");
    }

    fn end_round(&mut self, winner: Option<usize>, now: Instant) -> RoundResult {
        let mut game_over = false;
        if let Some(index) = winner {
            let player = &mut self.players[index];
            player.score += 1;
            game_over = player.score >= self.rules.winning_score;
        }

        let winner_id = winner.map(|index| self.players[index].id);
        if game_over {
            self.scheduler.cancel();
            self.phase = Phase::GameOver;
            info!(winner = ?winner_id, "Match won");
        } else {
            self.phase = Phase::RoundEnd;
            self.scheduler
                .schedule(Task::RestartRound, now + self.rules.round_restart_delay);
            info!(winner = ?winner_id, "Round ended");
        }

        RoundResult {
            winner: winner_id,
            game_over,
        }
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    /// Advance the round by one tick. Does nothing outside `playing`
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.phase != Phase::Playing {
            return outcome;
        }

        self.frame += 1;
        self.prune_effects();
        self.maybe_spawn_powerup();

        let frame = self.frame;
        let base_speed = self.rules.base_speed;
        for player in &mut self.players {
            player.expire_powerup(frame, base_speed);
        }

        for index in 0..self.players.len() {
            if !self.players[index].alive {
                continue;
            }

            self.move_player(index);
            self.collect_powerup(index);

            let player = &mut self.players[index];
            player.gap_counter = player.gap_counter.wrapping_add(1);
            if self.rules.in_gap(player.gap_counter) {
                player.gap_pending = true;
                continue;
            }

            let point = player.emit_trail_point();
            outcome.trail_updates.push(TrailIncrement {
                player_id: player.id,
                point,
            });

            if let Some(hit) = CollisionSystem::find_trail_hit(
                &self.players,
                index,
                self.rules.self_skip_points,
                TRAIL_WIDTH,
            ) {
                self.kill_by_trail(index, hit);
            }
        }

        self.resolve_head_on();

        if self.alive_count() <= 1 {
            let winner = self.players.iter().position(|p| p.alive);
            outcome.round = Some(self.end_round(winner, now));
        }

        outcome
    }

    /// Keep effects decaying while the round result is shown
    pub fn tick_cosmetic(&mut self) {
        if self.phase != Phase::RoundEnd {
            return;
        }
        self.frame += 1;
        self.prune_effects();
    }

    fn prune_effects(&mut self) {
        let frame = self.frame;
        self.effects.retain(|e| !e.is_expired(frame));
    }

    fn maybe_spawn_powerup(&mut self) {
        let interval = self.rules.powerup_spawn_interval;
        if interval == 0 || self.frame % interval != 0 || self.powerups.len() >= self.rules.max_powerups {
            return;
        }

        let id = self.next_powerup_id;
        self.next_powerup_id = self.next_powerup_id.wrapping_add(1);
        let powerup = PowerUp::random(&mut self.rng, id, self.frame);
        debug!(id, kind = ?powerup.kind, x = powerup.x, y = powerup.y, "Power-up spawned");
        self.powerups.push(powerup);
    }

    fn move_player(&mut self, index: usize) {
        let turn_speed = self.rules.turn_speed;
        let player = &mut self.players[index];

        let (x, y, angle) = PhysicsSystem::advance(
            player.x,
            player.y,
            player.angle,
            player.turning,
            turn_speed,
            player.speed,
        );
        let (x, y, wrapped) = PhysicsSystem::wrap(x, y);

        player.x = x;
        player.y = y;
        player.angle = angle;
        if wrapped {
            player.just_wrapped = true;
        }
    }

    fn collect_powerup(&mut self, index: usize) {
        let (px, py) = (self.players[index].x, self.players[index].y);
        let reach = POWERUP_RADIUS + TRAIL_WIDTH;

        let Some(pos) = self
            .powerups
            .iter()
            .position(|p| PhysicsSystem::distance(px, py, p.x, p.y) < reach)
        else {
            return;
        };

        let powerup = self.powerups.remove(pos);
        self.players[index].apply_powerup(
            powerup.kind,
            self.frame,
            self.rules.powerup_duration,
            self.rules.base_speed,
        );
        self.push_effect(
            EffectKind::PowerUp,
            powerup.x,
            powerup.y,
            vec![powerup.kind.color()],
            self.rules.pickup_effect_frames,
        );

        debug!(conn_id = %self.players[index].id, kind = ?powerup.kind, "Power-up collected");
    }

    fn kill_by_trail(&mut self, index: usize, hit: TrailHit) {
        let victim = &mut self.players[index];
        victim.alive = false;
        let (x, y, color) = (victim.x, victim.y, victim.color);

        let (kind, colors) = if hit.self_hit {
            (EffectKind::SelfHit, vec![color])
        } else {
            let owner_color = self.player(hit.owner_id).map_or(color, |p| p.color);
            (EffectKind::Trail, vec![color, owner_color])
        };

        self.push_effect(kind, x, y, colors, self.rules.collision_effect_frames);
    }

    /// Pairs of heads that touch die together
    fn resolve_head_on(&mut self) {
        let alive: Vec<usize> = (0..self.players.len())
            .filter(|&i| self.players[i].alive)
            .collect();

        let mut doomed = Vec::new();
        for (n, &i) in alive.iter().enumerate() {
            for &j in &alive[n + 1..] {
                let (a, b) = (&self.players[i], &self.players[j]);
                if PhysicsSystem::check_head_on(a.x, a.y, b.x, b.y, self.rules.head_on_distance) {
                    doomed.push((i, j));
                }
            }
        }

        for (i, j) in doomed {
            self.players[i].alive = false;
            self.players[j].alive = false;
            let (a, b) = (&self.players[i], &self.players[j]);
            let (x, y) = ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
            let colors = vec![a.color, b.color];
            self.push_effect(
                EffectKind::Player,
                x,
                y,
                colors,
                self.rules.collision_effect_frames,
            );
        }
    }

    fn push_effect(&mut self, kind: EffectKind, x: f32, y: f32, colors: Vec<&'static str>, duration: u64) {
        let id = self.next_effect_id;
        self.next_effect_id = self.next_effect_id.wrapping_add(1);
        self.effects.push(Effect {
            id,
            kind,
            x,
            y,
            colors,
            created_at: self.frame,
            duration,
        });
    }

    fn random_gap_phase(&mut self) -> u32 {
        self.rng.gen_range(0..self.rules.gap_interval.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{PowerUpKind, TrailPoint};
    use std::time::Duration;

    /// Gap counter value whose next increment lands outside the gap window
    const DRAWING: u32 = 50;
    /// Gap counter value whose next increment lands inside the gap window
    const GAPPING: u32 = 0;

    fn quiet_rules() -> GameRules {
        GameRules {
            powerup_spawn_interval: 0,
            ..GameRules::default()
        }
    }

    fn engine_with(count: usize) -> (MatchEngine, Vec<Uuid>) {
        let mut engine = MatchEngine::new(quiet_rules(), 42);
        let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        for (i, id) in ids.iter().enumerate() {
            engine.join(*id, &format!("P{}", i)).unwrap();
        }
        (engine, ids)
    }

    fn place(engine: &mut MatchEngine, index: usize, x: f32, y: f32, angle: f32, gap: u32) {
        let p = &mut engine.players[index];
        p.x = x;
        p.y = y;
        p.angle = angle;
        p.gap_counter = gap;
        p.trail.clear();
    }

    #[test]
    fn test_join_assigns_palette_slots() {
        let (mut engine, ids) = engine_with(3);
        assert_eq!(engine.players()[1].color, PLAYER_COLORS[1]);
        assert_eq!(engine.players()[2].controls, CONTROL_SCHEMES[2]);

        engine.disconnect(ids[1]);
        let newcomer = Uuid::new_v4();
        let player = engine.join(newcomer, "   ").unwrap();
        assert_eq!(player.slot, 1);
        assert_eq!(player.color, PLAYER_COLORS[1]);
        assert_eq!(player.name, "Player 2");
    }

    #[test]
    fn test_join_rejects_when_full() {
        let (mut engine, _) = engine_with(10);
        let result = engine.join(Uuid::new_v4(), "Late");
        assert_eq!(result.unwrap_err(), JoinError::GameFull { capacity: 10 });
        assert_eq!(engine.players().len(), 10);
        assert_eq!(
            JoinError::GameFull { capacity: 10 }.to_string(),
            "Game is full (max 10 players)"
        );
    }

    #[test]
    fn test_duplicate_join_is_rejected() {
        let (mut engine, ids) = engine_with(1);
        assert_eq!(engine.join(ids[0], "Again").unwrap_err(), JoinError::AlreadyJoined);
        assert_eq!(engine.players().len(), 1);
    }

    #[test]
    fn test_ready_starts_countdown_only_when_everyone_ready() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);

        assert!(engine.ready(ids[0], now));
        assert!(engine.ready(ids[0], now));
        assert_eq!(engine.phase(), Phase::Lobby);

        assert!(!engine.ready(Uuid::new_v4(), now));
        assert_eq!(engine.phase(), Phase::Lobby);

        engine.ready(ids[1], now);
        assert_eq!(engine.phase(), Phase::Countdown);
        assert_eq!(engine.countdown(), 3);
    }

    #[test]
    fn test_single_ready_player_never_starts() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(1);
        engine.ready(ids[0], now);
        assert_eq!(engine.phase(), Phase::Lobby);
    }

    #[test]
    fn test_countdown_runs_into_round() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);
        engine.ready(ids[0], now);
        engine.ready(ids[1], now);

        assert_eq!(engine.run_due(now), None);
        assert_eq!(
            engine.run_due(now + Duration::from_secs(1)),
            Some(Transition::CountdownTick)
        );
        assert_eq!(engine.countdown(), 2);
        assert_eq!(
            engine.run_due(now + Duration::from_secs(2)),
            Some(Transition::CountdownTick)
        );
        assert_eq!(
            engine.run_due(now + Duration::from_secs(3)),
            Some(Transition::RoundStarted)
        );

        assert_eq!(engine.phase(), Phase::Playing);
        assert_eq!(engine.frame(), 0);
        assert_eq!(engine.ready_players().count(), 0);
        assert!(engine.players().iter().all(|p| p.alive && p.trail.is_empty()));
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn test_start_positions_are_collision_free() {
        let (mut engine, _) = engine_with(10);
        engine.start_round();

        let players = engine.players();
        for i in 0..players.len() {
            for j in (i + 1)..players.len() {
                let d = PhysicsSystem::distance(players[i].x, players[i].y, players[j].x, players[j].y);
                assert!(d > engine.rules().head_on_distance * 4.0);
            }
            assert!(players[i].x > 0.0 && players[i].x < CANVAS_WIDTH);
            assert!(players[i].y > 0.0 && players[i].y < CANVAS_HEIGHT);
        }
    }

    #[test]
    fn test_input_only_applies_while_playing() {
        let (mut engine, ids) = engine_with(2);
        assert!(!engine.set_turning(ids[0], Turning::Left));
        assert_eq!(engine.players()[0].turning, Turning::Straight);

        engine.start_round();
        assert!(engine.set_turning(ids[0], Turning::Left));
        assert!(!engine.set_turning(Uuid::new_v4(), Turning::Left));
        assert_eq!(engine.players()[0].turning, Turning::Left);
    }

    #[test]
    fn test_trail_kill_scenario() {
        let now = Instant::now();
        let (mut engine, _) = engine_with(3);
        engine.start_round();

        // victim heads east just above the owner's trail
        place(&mut engine, 0, 200.0, 303.0, 0.0, DRAWING);
        place(&mut engine, 1, 900.0, 600.0, 0.0, GAPPING);
        place(&mut engine, 2, 900.0, 100.0, 0.0, GAPPING);
        engine.players[1].trail = (0..=100)
            .map(|i| TrailPoint::new(100.0 + i as f32 * 2.0, 300.0, false))
            .collect();

        let outcome = engine.tick(now);

        assert!(!engine.players()[0].alive);
        assert!(engine.players()[1].alive);
        assert!(engine.players()[2].alive);
        assert_eq!(engine.players()[1].score, 0);
        assert!(outcome.round.is_none());
        assert_eq!(engine.phase(), Phase::Playing);

        let effect = engine.effects().last().unwrap();
        assert_eq!(effect.kind, EffectKind::Trail);
        assert_eq!(effect.colors, vec![PLAYER_COLORS[0], PLAYER_COLORS[1]]);
    }

    #[test]
    fn test_trail_break_is_passable() {
        let now = Instant::now();
        let (mut engine, _) = engine_with(3);
        engine.start_round();

        place(&mut engine, 0, 200.0, 303.0, 0.0, DRAWING);
        place(&mut engine, 1, 900.0, 600.0, 0.0, GAPPING);
        place(&mut engine, 2, 900.0, 100.0, 0.0, GAPPING);
        engine.players[1].trail = vec![
            TrailPoint::new(100.0, 300.0, false),
            TrailPoint::new(300.0, 300.0, true),
        ];

        engine.tick(now);
        assert!(engine.players()[0].alive);
    }

    #[test]
    fn test_self_collision_outside_grace_window() {
        let now = Instant::now();
        let (mut engine, _) = engine_with(3);
        engine.start_round();

        place(&mut engine, 0, 200.0, 303.0, 0.0, DRAWING);
        place(&mut engine, 1, 900.0, 600.0, 0.0, GAPPING);
        place(&mut engine, 2, 900.0, 100.0, 0.0, GAPPING);
        let old: Vec<TrailPoint> = (0..=100)
            .map(|i| TrailPoint::new(100.0 + i as f32 * 2.0, 300.0, false))
            .collect();
        engine.players[0].trail = old;
        // recent points far away so the old line is outside the window
        engine.players[0]
            .trail
            .extend((0..10).map(|i| TrailPoint::new(600.0 + i as f32 * 2.0, 500.0, false)));

        engine.tick(now);

        assert!(!engine.players()[0].alive);
        let effect = engine.effects().last().unwrap();
        assert_eq!(effect.kind, EffectKind::SelfHit);
        assert_eq!(effect.colors, vec![PLAYER_COLORS[0]]);
    }

    #[test]
    fn test_straight_run_never_hits_own_recent_points() {
        let now = Instant::now();
        let (mut engine, _) = engine_with(2);
        engine.start_round();
        place(&mut engine, 0, 100.0, 100.0, 0.0, DRAWING);
        place(&mut engine, 1, 100.0, 600.0, 0.0, DRAWING);

        for _ in 0..40 {
            engine.tick(now);
        }
        assert!(engine.players().iter().all(|p| p.alive));
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn test_head_on_leaves_survivor_scenario() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(3);
        engine.start_round();

        place(&mut engine, 0, 500.0, 350.0, 0.0, GAPPING);
        place(&mut engine, 1, 506.0, 350.0, PI, GAPPING);
        place(&mut engine, 2, 100.0, 100.0, 0.0, GAPPING);

        let outcome = engine.tick(now);

        assert!(!engine.players()[0].alive);
        assert!(!engine.players()[1].alive);
        assert!(engine.players()[2].alive);
        assert_eq!(engine.players()[2].score, 1);
        assert_eq!(engine.players()[0].score, 0);
        assert_eq!(
            outcome.round,
            Some(RoundResult {
                winner: Some(ids[2]),
                game_over: false
            })
        );
        assert_eq!(engine.phase(), Phase::RoundEnd);

        let effect = engine.effects().last().unwrap();
        assert_eq!(effect.kind, EffectKind::Player);
        assert!((effect.x - 503.0).abs() < 0.01);
    }

    #[test]
    fn test_trail_victim_is_out_of_head_on_check() {
        let now = Instant::now();
        let (mut engine, _) = engine_with(3);
        engine.start_round();

        // 0 dies on 2's trail, ending the tick about 6 units from 1's head
        place(&mut engine, 0, 200.0, 303.0, 0.0, DRAWING);
        place(&mut engine, 1, 206.0, 309.0, PI, GAPPING);
        place(&mut engine, 2, 900.0, 100.0, 0.0, GAPPING);
        engine.players[2].trail = (0..=100)
            .map(|i| TrailPoint::new(100.0 + i as f32 * 2.0, 300.0, false))
            .collect();

        let outcome = engine.tick(now);

        let (a, b) = (&engine.players()[0], &engine.players()[1]);
        assert!(PhysicsSystem::check_head_on(a.x, a.y, b.x, b.y, engine.rules().head_on_distance));
        let alive: Vec<bool> = engine.players().iter().map(|p| p.alive).collect();
        assert_eq!(alive, vec![false, true, true]);
        assert!(outcome.round.is_none());
        assert!(engine.effects().iter().all(|e| e.kind != EffectKind::Player));
        assert_eq!(engine.effects().last().unwrap().kind, EffectKind::Trail);
    }

    #[test]
    fn test_draw_awards_nothing() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);
        engine.start_round();
        place(&mut engine, 0, 500.0, 350.0, 0.0, GAPPING);
        place(&mut engine, 1, 506.0, 350.0, PI, GAPPING);

        let outcome = engine.tick(now);
        assert_eq!(
            outcome.round,
            Some(RoundResult {
                winner: None,
                game_over: false
            })
        );
        assert!(ids.iter().all(|id| engine.player(*id).unwrap().score == 0));
        assert_eq!(engine.phase(), Phase::RoundEnd);
    }

    #[test]
    fn test_winning_score_ends_match() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);
        engine.start_round();
        place(&mut engine, 0, 100.0, 100.0, 0.0, GAPPING);
        engine.players[0].score = engine.rules().winning_score - 1;
        engine.players[1].alive = false;

        let outcome = engine.tick(now);

        assert_eq!(
            outcome.round,
            Some(RoundResult {
                winner: Some(ids[0]),
                game_over: true
            })
        );
        assert_eq!(engine.phase(), Phase::GameOver);
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(engine.run_due(now + Duration::from_secs(60)), None);
        assert_eq!(engine.phase(), Phase::GameOver);
    }

    #[test]
    fn test_round_restarts_after_delay() {
        let now = Instant::now();
        let (mut engine, _) = engine_with(2);
        engine.start_round();
        engine.players[1].alive = false;
        engine.tick(now);
        assert_eq!(engine.phase(), Phase::RoundEnd);

        assert_eq!(engine.run_due(now + Duration::from_millis(2999)), None);
        assert_eq!(
            engine.run_due(now + Duration::from_secs(3)),
            Some(Transition::RoundStarted)
        );
        assert_eq!(engine.phase(), Phase::Playing);
        assert_eq!(engine.alive_count(), 2);
        assert_eq!(engine.players()[0].score, 1);
    }

    #[test]
    fn test_stale_restart_cannot_fire_after_lobby_reset() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);
        engine.start_round();
        engine.players[1].alive = false;
        engine.tick(now);
        assert!(engine.next_deadline().is_some());

        engine.disconnect(ids[1]);
        assert_eq!(engine.phase(), Phase::Lobby);
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(engine.run_due(now + Duration::from_secs(10)), None);
        assert_eq!(engine.phase(), Phase::Lobby);
    }

    #[test]
    fn test_disconnect_below_minimum_forces_lobby_scenario() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);
        engine.start_round();
        for _ in 0..30 {
            engine.tick(now);
        }
        engine.players[0].score = 2;

        assert!(engine.disconnect(ids[1]));

        assert_eq!(engine.phase(), Phase::Lobby);
        assert_eq!(engine.countdown(), 0);
        assert_eq!(engine.ready_players().count(), 0);
        let remaining = &engine.players()[0];
        assert!(!remaining.alive);
        assert!(remaining.trail.is_empty());
        assert_eq!(remaining.score, 2);
    }

    #[test]
    fn test_disconnect_during_countdown_cancels_it() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);
        engine.ready(ids[0], now);
        engine.ready(ids[1], now);
        engine.disconnect(ids[0]);

        assert_eq!(engine.phase(), Phase::Lobby);
        assert_eq!(engine.run_due(now + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_wrap_marks_next_point_only() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);
        engine.start_round();
        place(&mut engine, 0, CANVAS_WIDTH - 1.0, 200.0, 0.0, DRAWING);
        place(&mut engine, 1, 100.0, 600.0, 0.0, GAPPING);
        engine.players[0].trail.push(TrailPoint::new(CANVAS_WIDTH - 3.0, 200.0, false));

        let first = engine.tick(now);
        let update = first.trail_updates.iter().find(|u| u.player_id == ids[0]).unwrap();
        assert!(update.point.after_gap);
        assert!((update.point.x - 1.0).abs() < 1e-3);

        let second = engine.tick(now);
        let update = second.trail_updates.iter().find(|u| u.player_id == ids[0]).unwrap();
        assert!(!update.point.after_gap);
        assert!(engine.players()[0].alive);
    }

    #[test]
    fn test_wrap_during_gap_marks_first_point_after_gap() {
        let now = Instant::now();
        let rules = quiet_rules();
        let (mut engine, ids) = engine_with(2);
        engine.start_round();
        // last gap tick: counter becomes 14
        place(&mut engine, 0, CANVAS_WIDTH - 1.0, 200.0, 0.0, 13);
        place(&mut engine, 1, 100.0, 600.0, 0.0, GAPPING);
        engine.players[0].trail.push(TrailPoint::new(CANVAS_WIDTH - 3.0, 200.0, false));

        let first = engine.tick(now);
        assert!(first.trail_updates.iter().all(|u| u.player_id != ids[0]));
        assert!(rules.in_gap(engine.players()[0].gap_counter));

        let second = engine.tick(now);
        let update = second.trail_updates.iter().find(|u| u.player_id == ids[0]).unwrap();
        assert!(update.point.after_gap);
    }

    #[test]
    fn test_gap_produces_break_in_trail() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);
        engine.start_round();
        // draws for 10 ticks, then 15 gap ticks, then draws again
        place(&mut engine, 0, 100.0, 100.0, 0.0, 89);
        place(&mut engine, 1, 100.0, 600.0, 0.0, GAPPING);

        let mut emitted = Vec::new();
        for _ in 0..30 {
            let outcome = engine.tick(now);
            emitted.extend(
                outcome
                    .trail_updates
                    .into_iter()
                    .filter(|u| u.player_id == ids[0])
                    .map(|u| u.point),
            );
        }

        assert_eq!(emitted.len(), 15);
        let breaks: Vec<usize> = emitted
            .iter()
            .enumerate()
            .filter(|(_, p)| p.after_gap)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(breaks, vec![10]);
        assert_eq!(engine.players()[0].trail, emitted);
    }

    #[test]
    fn test_speed_boost_lifecycle_scenario() {
        let now = Instant::now();
        let (mut engine, _) = engine_with(2);
        engine.start_round();
        place(&mut engine, 0, 600.0, 350.0, 0.0, GAPPING);
        place(&mut engine, 1, 100.0, 100.0, 0.0, GAPPING);
        engine.powerups.push(PowerUp {
            id: 99,
            x: 610.0,
            y: 350.0,
            kind: PowerUpKind::SpeedBoost,
            spawned_at: 0,
        });

        engine.tick(now);
        let pickup_frame = engine.frame();
        let duration = engine.rules().powerup_duration;

        assert!(engine.powerups().is_empty());
        assert_eq!(engine.players()[0].speed, 3.0);
        assert_eq!(
            engine.players()[0].powerup.map(|p| p.expires_at),
            Some(pickup_frame + duration)
        );
        assert_eq!(engine.effects().last().map(|e| e.kind), Some(EffectKind::PowerUp));

        while engine.frame() < pickup_frame + duration - 1 {
            for p in &mut engine.players {
                p.trail.clear();
            }
            engine.tick(now);
            assert_eq!(engine.players()[0].speed, 3.0);
        }

        engine.tick(now);
        assert_eq!(engine.frame(), pickup_frame + duration);
        assert_eq!(engine.players()[0].speed, 2.0);
        assert!(engine.players()[0].powerup.is_none());
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn test_powerups_spawn_on_interval_up_to_cap() {
        let now = Instant::now();
        let rules = GameRules {
            powerup_spawn_interval: 5,
            ..GameRules::default()
        };
        let mut engine = MatchEngine::new(rules, 3);
        engine.join(Uuid::new_v4(), "A").unwrap();
        engine.join(Uuid::new_v4(), "B").unwrap();
        engine.start_round();

        for _ in 0..4 {
            for p in &mut engine.players {
                p.trail.clear();
                p.x = 5.0;
                p.alive = true;
            }
            engine.players[1].y = 600.0;
            engine.players[0].y = 5.0;
            engine.tick(now);
        }
        assert!(engine.powerups().is_empty());

        let mut spawned_frames = Vec::new();
        for _ in 0..30 {
            for p in &mut engine.players {
                p.trail.clear();
                p.x = 5.0;
                p.alive = true;
                p.powerup = None;
            }
            engine.players[1].y = 600.0;
            engine.players[0].y = 5.0;
            let before = engine.powerups().len();
            engine.tick(now);
            if engine.powerups().len() > before {
                spawned_frames.push(engine.frame());
            }
        }

        assert!(engine.powerups().len() <= 3);
        assert!(spawned_frames.iter().all(|f| f % 5 == 0));
    }

    #[test]
    fn test_cosmetic_tick_decays_effects() {
        let now = Instant::now();
        let (mut engine, _) = engine_with(2);
        engine.start_round();
        place(&mut engine, 0, 500.0, 350.0, 0.0, GAPPING);
        place(&mut engine, 1, 506.0, 350.0, PI, GAPPING);
        engine.tick(now);
        assert_eq!(engine.phase(), Phase::RoundEnd);
        assert_eq!(engine.effects().len(), 1);

        let frame = engine.frame();
        let positions: Vec<(f32, f32)> = engine.players().iter().map(|p| (p.x, p.y)).collect();
        for _ in 0..engine.rules().collision_effect_frames {
            engine.tick_cosmetic();
        }

        assert_eq!(engine.frame(), frame + engine.rules().collision_effect_frames);
        assert!(engine.effects().is_empty());
        let after: Vec<(f32, f32)> = engine.players().iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(positions, after);
    }

    #[test]
    fn test_tick_outside_playing_is_noop() {
        let now = Instant::now();
        let (mut engine, _) = engine_with(2);
        let outcome = engine.tick(now);
        assert!(outcome.trail_updates.is_empty());
        assert!(outcome.round.is_none());
        assert_eq!(engine.frame(), 0);
    }

    #[test]
    fn test_rematch_after_game_over() {
        let now = Instant::now();
        let (mut engine, ids) = engine_with(2);
        engine.start_round();
        engine.players[0].score = engine.rules().winning_score - 1;
        engine.players[1].alive = false;
        engine.tick(now);
        assert_eq!(engine.phase(), Phase::GameOver);

        engine.ready(ids[0], now);
        assert_eq!(engine.phase(), Phase::GameOver);
        engine.ready(ids[1], now);

        assert_eq!(engine.phase(), Phase::Countdown);
        assert!(engine.players().iter().all(|p| p.score == 0));
        assert_eq!(engine.ready_players().count(), 0);
    }
}
