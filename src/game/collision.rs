//! Trail hit detection

use uuid::Uuid;

use crate::ws::protocol::TrailPoint;

use super::physics::PhysicsSystem;
use super::player::Player;

/// Trail hit found for a moving head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailHit {
    /// Owner of the trail that was hit
    pub owner_id: Uuid,
    /// The head ran into its own trail
    pub self_hit: bool,
}

/// Collision system for trail checks
pub struct CollisionSystem;

impl CollisionSystem {
    /// Check a head position against one trail.
    ///
    /// The `skip_recent` newest points are left out entirely, and a segment
    /// is only tested when its second point is not `after_gap`.
    pub fn hits_trail(
        x: f32,
        y: f32,
        trail: &[TrailPoint],
        skip_recent: usize,
        width: f32,
    ) -> bool {
        if trail.len() < 2 {
            return false;
        }

        let end = trail.len().saturating_sub(skip_recent);
        trail[..end]
            .windows(2)
            .filter(|pair| !pair[1].after_gap)
            .any(|pair| PhysicsSystem::distance_to_segment(x, y, &pair[0], &pair[1]) < width)
    }

    /// Find the first trail in roster order that the head of `players[index]` touches
    pub fn find_trail_hit(
        players: &[Player],
        index: usize,
        skip_self: usize,
        width: f32,
    ) -> Option<TrailHit> {
        let mover = players.get(index)?;

        players.iter().find_map(|owner| {
            let self_hit = owner.id == mover.id;
            let skip = if self_hit { skip_self } else { 0 };
            Self::hits_trail(mover.x, mover.y, &owner.trail, skip, width).then_some(TrailHit {
                owner_id: owner.id,
                self_hit,
            })
        })
    }
}
