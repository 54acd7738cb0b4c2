//! Layered rendering: cached background, accumulated trail raster, per-frame overlay
//!
//! Drawing goes through the `Surface` trait. A browser canvas adapter
//! implements it outside this crate.

use std::f32::consts::TAU;

use crate::game::rules::{CANVAS_HEIGHT, CANVAS_WIDTH, POWERUP_RADIUS, TRAIL_WIDTH};
use crate::ws::protocol::{EffectKind, EffectState, Phase, PowerUpKind, PowerUpState};

use super::reconcile::{CachedPlayer, ClientView, Segment, TrailUpdate};

const BACKGROUND_COLOR: &str = "#1A1A1A";
const GRID_COLOR: &str = "rgba(255, 255, 255, 0.03)";
const GRID_SPACING: f32 = 50.0;
const BORDER_COLOR: &str = "#E20074";
const BORDER_WIDTH: f32 = 3.0;

const TRAIL_GLOW: f32 = 10.0;
const HEAD_RADIUS: f32 = TRAIL_WIDTH * 1.5;
const NAME_OFFSET: f32 = 15.0;
const AURA_ALPHA: f32 = 0.6;
/// Remaining ticks that map to the widest aura
const AURA_FULL_TICKS: f32 = 600.0;
const POWERUP_INNER_RADIUS: f32 = 14.0;

/// Stroke parameters for lines and rings
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f32,
    pub alpha: f32,
    pub glow: f32,
}

impl Stroke {
    pub fn solid(color: &str, width: f32) -> Self {
        Self {
            color: color.to_string(),
            width,
            alpha: 1.0,
            glow: 0.0,
        }
    }
}

/// Minimal 2D drawing target
pub trait Surface {
    /// Erase everything drawn so far
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: &str);
    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, stroke: &Stroke);
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: &Stroke);
    fn fill_circle(&mut self, x: f32, y: f32, r: f32, color: &str);
    fn stroke_circle(&mut self, x: f32, y: f32, r: f32, stroke: &Stroke);
    fn fill_polygon(&mut self, points: &[(f32, f32)], color: &str);
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: &str);
    /// Composite another layer on top
    fn blit(&mut self, layer: &Self);
}

/// Draw the static background: fill, faint grid, border
pub fn draw_background<S: Surface>(surface: &mut S) {
    surface.clear();
    surface.fill_rect(0.0, 0.0, CANVAS_WIDTH, CANVAS_HEIGHT, BACKGROUND_COLOR);

    let grid = Stroke::solid(GRID_COLOR, 1.0);
    let mut x = 0.0;
    while x < CANVAS_WIDTH {
        surface.stroke_line((x, 0.0), (x, CANVAS_HEIGHT), &grid);
        x += GRID_SPACING;
    }
    let mut y = 0.0;
    while y < CANVAS_HEIGHT {
        surface.stroke_line((0.0, y), (CANVAS_WIDTH, y), &grid);
        y += GRID_SPACING;
    }

    surface.stroke_rect(
        0.0,
        0.0,
        CANVAS_WIDTH,
        CANVAS_HEIGHT,
        &Stroke::solid(BORDER_COLOR, BORDER_WIDTH),
    );
}

/// Apply a reconcile result to the trail raster
pub fn apply_trail_update<S: Surface>(surface: &mut S, update: &TrailUpdate) {
    match update {
        TrailUpdate::Unchanged => {}
        TrailUpdate::Clear => surface.clear(),
        TrailUpdate::Rebuild(segments) => {
            surface.clear();
            stroke_segments(surface, segments);
        }
        TrailUpdate::Append(segments) => stroke_segments(surface, segments),
    }
}

fn stroke_segments<S: Surface>(surface: &mut S, segments: &[Segment]) {
    for segment in segments {
        let stroke = Stroke {
            color: segment.color.clone(),
            width: TRAIL_WIDTH,
            alpha: 1.0,
            glow: TRAIL_GLOW,
        };
        surface.stroke_line(
            (segment.from.x, segment.from.y),
            (segment.to.x, segment.to.y),
            &stroke,
        );
    }
}

/// Whether the per-frame overlay is drawn at all in this phase
pub fn overlay_visible(phase: Phase) -> bool {
    matches!(phase, Phase::Playing | Phase::RoundEnd)
}

/// Draw heads, power-ups and effects for the current view
pub fn draw_overlay<S: Surface>(surface: &mut S, view: &ClientView) {
    for player in view.players.iter().filter(|p| p.alive) {
        draw_player(surface, player, view.frame_count);
    }
    for powerup in &view.powerups {
        draw_powerup(surface, powerup);
    }
    for effect in &view.effects {
        draw_effect(surface, effect, view.frame_count);
    }
}

fn draw_player<S: Surface>(surface: &mut S, player: &CachedPlayer, frame: u64) {
    if let Some(active) = player.powerup {
        let remaining = active.end_frame.saturating_sub(frame) as f32;
        if remaining > 0.0 {
            let progress = remaining / AURA_FULL_TICKS;
            let stroke = Stroke {
                color: active.kind.color().to_string(),
                width: 3.0,
                alpha: AURA_ALPHA,
                glow: 0.0,
            };
            surface.stroke_circle(player.x, player.y, HEAD_RADIUS + progress * 10.0, &stroke);
        }
    }

    surface.fill_circle(player.x, player.y, HEAD_RADIUS, &player.color);
    surface.fill_text(&player.name, player.x, player.y - NAME_OFFSET, "#FFFFFF");
}

fn draw_powerup<S: Surface>(surface: &mut S, powerup: &PowerUpState) {
    let (x, y) = (powerup.x, powerup.y);
    surface.fill_circle(x, y, POWERUP_RADIUS, &powerup.color);
    surface.fill_circle(x, y, POWERUP_INNER_RADIUS, "#FFFFFF");

    let arrow = match powerup.kind {
        PowerUpKind::SpeedBoost => [(x, y - 8.0), (x - 5.0, y + 3.0), (x + 5.0, y + 3.0)],
        PowerUpKind::SpeedSlow => [(x, y + 8.0), (x - 5.0, y - 3.0), (x + 5.0, y - 3.0)],
    };
    surface.fill_polygon(&arrow, &powerup.color);
}

fn draw_effect<S: Surface>(surface: &mut S, effect: &EffectState, frame: u64) {
    let age = frame.saturating_sub(effect.created_at_frame) as f32;
    let progress = if effect.duration_frames == 0 {
        1.0
    } else {
        (age / effect.duration_frames as f32).clamp(0.0, 1.0)
    };
    let fade = 1.0 - progress;
    let radius = 6.0 + progress * 34.0;
    let alpha = 0.75 * fade;

    let fallback = ["#FFFFFF".to_string()];
    let colors: &[String] = if effect.colors.is_empty() {
        &fallback
    } else {
        &effect.colors
    };

    // Multi-color rings are offset so each stays visible
    for (i, color) in colors.iter().enumerate() {
        let stroke = Stroke {
            color: color.clone(),
            width: 2.0 + fade * 3.0,
            alpha,
            glow: 12.0 * fade,
        };
        surface.stroke_circle(effect.x, effect.y, radius + i as f32 * 2.0, &stroke);
    }

    let spark_count = if effect.kind == EffectKind::Player { 14 } else { 10 };
    for s in 0..spark_count {
        let seed = effect.id as f64 * 997.0 + s as f64 * 101.0;
        let angle = seeded01(seed) * TAU;
        let len = (8.0 + seeded01(seed + 7.0) * 14.0) * fade;
        let inner = radius * (0.6 + seeded01(seed + 13.0) * 0.4);

        let from = (effect.x + angle.cos() * inner, effect.y + angle.sin() * inner);
        let to = (
            effect.x + angle.cos() * (inner + len),
            effect.y + angle.sin() * (inner + len),
        );
        let stroke = Stroke {
            color: colors[s % colors.len()].clone(),
            width: 2.0,
            alpha,
            glow: 8.0 * fade,
        };
        surface.stroke_line(from, to, &stroke);
    }
}

/// Deterministic pseudo-random value in `[0, 1)` for a seed
pub fn seeded01(seed: f64) -> f32 {
    let x = seed.sin() * 10_000.0;
    (x - x.floor()) as f32
}

/// Background and trail layers, kept between frames
#[derive(Debug)]
pub struct RenderLayers<S> {
    background: S,
    trails: S,
}

impl<S: Surface> RenderLayers<S> {
    /// Takes two blank surfaces; the background is drawn once here
    pub fn new(mut background: S, trails: S) -> Self {
        draw_background(&mut background);
        Self { background, trails }
    }

    pub fn trails(&self) -> &S {
        &self.trails
    }

    pub fn apply(&mut self, update: &TrailUpdate) {
        apply_trail_update(&mut self.trails, update);
    }

    /// Compose one animation frame onto `screen`. Returns false when the
    /// phase has no game canvas to show.
    pub fn draw_frame(&self, screen: &mut S, view: &ClientView) -> bool {
        if !overlay_visible(view.phase) {
            return false;
        }
        screen.clear();
        screen.blit(&self.background);
        screen.blit(&self.trails);
        draw_overlay(screen, view);
        true
    }
}
