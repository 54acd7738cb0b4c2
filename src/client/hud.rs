//! HUD and scoreboard models, plus the refresh throttle

use std::time::{Duration, Instant};

use crate::util::time::SIMULATION_TPS;
use crate::ws::protocol::{Phase, PowerUpKind};

use super::reconcile::ClientView;

/// Minimum wall-clock time between HUD rebuilds
pub const HUD_REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// Limits HUD rebuilds to one per interval, whatever the message rate
#[derive(Debug, Clone)]
pub struct HudThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl HudThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// True when a refresh is due at `now`; records it as done
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}

impl Default for HudThrottle {
    fn default() -> Self {
        Self::new(HUD_REFRESH_INTERVAL)
    }
}

/// One player line in the HUD
#[derive(Debug, Clone, PartialEq)]
pub struct HudRow {
    pub name: String,
    pub color: String,
    pub controls: String,
    pub score: u32,
    pub alive: bool,
    /// Active power-up and whole seconds left, rounded up
    pub powerup: Option<(PowerUpKind, u64)>,
}

impl HudRow {
    pub fn powerup_label(&self) -> Option<String> {
        self.powerup.map(|(kind, secs)| {
            let name = match kind {
                PowerUpKind::SpeedBoost => "Speed+",
                PowerUpKind::SpeedSlow => "Speed-",
            };
            format!("{} {}s", name, secs)
        })
    }
}

/// HUD rows in roster order
pub fn hud_rows(view: &ClientView) -> Vec<HudRow> {
    let tps = SIMULATION_TPS as u64;
    view.players
        .iter()
        .map(|p| HudRow {
            name: p.name.clone(),
            color: p.color.clone(),
            controls: p.controls.clone(),
            score: p.score,
            alive: p.alive,
            powerup: p.powerup.and_then(|active| {
                let remaining = active.end_frame.saturating_sub(view.frame_count);
                (remaining > 0).then(|| (active.kind, remaining.div_ceil(tps)))
            }),
        })
        .collect()
}

/// Headline shown over the board between rounds
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub text: String,
    /// Winner color, none for a draw
    pub color: Option<String>,
}

/// Round or match result headline, if the phase has one
pub fn banner(view: &ClientView) -> Option<Banner> {
    match view.phase {
        Phase::RoundEnd => Some(match view.players.iter().find(|p| p.alive) {
            Some(winner) => Banner {
                text: format!("{} Wins!", winner.name),
                color: Some(winner.color.clone()),
            },
            None => Banner {
                text: "Draw!".to_string(),
                color: None,
            },
        }),
        Phase::GameOver => scoreboard(view).first().map(|winner| Banner {
            text: format!("Game Over! {} Wins the Match!", winner.name),
            color: Some(winner.color.clone()),
        }),
        _ => None,
    }
}

/// Players by descending score, roster order among ties
pub fn scoreboard(view: &ClientView) -> Vec<HudRow> {
    let mut rows = hud_rows(view);
    rows.sort_by(|a, b| b.score.cmp(&a.score));
    rows
}
