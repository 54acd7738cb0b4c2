//! Movement integration, screen-wrap and distance queries

use crate::ws::protocol::{TrailPoint, Turning};

use super::rules::{CANVAS_HEIGHT, CANVAS_WIDTH};

/// Physics system for moving heads and measuring distances
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Turn and move one step.
    /// Returns (new_x, new_y, new_angle)
    pub fn advance(
        x: f32,
        y: f32,
        angle: f32,
        turning: Turning,
        turn_speed: f32,
        speed: f32,
    ) -> (f32, f32, f32) {
        let new_angle = angle + turning.factor() * turn_speed;
        let new_x = x + new_angle.cos() * speed;
        let new_y = y + new_angle.sin() * speed;
        (new_x, new_y, new_angle)
    }

    /// Wrap a position that left the canvas onto the opposite edge.
    /// Returns (x, y, wrapped)
    pub fn wrap(x: f32, y: f32) -> (f32, f32, bool) {
        let mut wrapped = false;
        let mut x = x;
        let mut y = y;

        if x < 0.0 {
            x += CANVAS_WIDTH;
            wrapped = true;
        } else if x > CANVAS_WIDTH {
            x -= CANVAS_WIDTH;
            wrapped = true;
        }

        if y < 0.0 {
            y += CANVAS_HEIGHT;
            wrapped = true;
        } else if y > CANVAS_HEIGHT {
            y -= CANVAS_HEIGHT;
            wrapped = true;
        }

        (x, y, wrapped)
    }

    pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
        let dx = x2 - x1;
        let dy = y2 - y1;
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance from a point to the segment `a..b`.
    /// A zero-length segment reduces to the distance to `a`.
    pub fn distance_to_segment(px: f32, py: f32, a: &TrailPoint, b: &TrailPoint) -> f32 {
        let l2 = (b.x - a.x) * (b.x - a.x) + (b.y - a.y) * (b.y - a.y);
        if l2 == 0.0 {
            return Self::distance(px, py, a.x, a.y);
        }

        let t = ((px - a.x) * (b.x - a.x) + (py - a.y) * (b.y - a.y)) / l2;
        let t = t.clamp(0.0, 1.0);

        let proj_x = a.x + t * (b.x - a.x);
        let proj_y = a.y + t * (b.y - a.y);
        Self::distance(px, py, proj_x, proj_y)
    }

    /// Check whether two heads are close enough to collide
    pub fn check_head_on(x1: f32, y1: f32, x2: f32, y2: f32, threshold: f32) -> bool {
        Self::distance(x1, y1, x2, y2) < threshold
    }
}
