//! Browser-independent client core
//!
//! Network messages flow through `reconcile` into a cached view; render
//! hints drive the trail raster, and the draw loop composes the cached
//! layers with a per-frame overlay.

pub mod hud;
pub mod input;
pub mod reconcile;
#[cfg(test)]
pub(crate) mod recording;
pub mod render;
pub mod shared;

pub use reconcile::{reconcile, CachedPlayer, ClientView, RenderHints, Segment, TrailUpdate};
pub use render::{RenderLayers, Surface};
pub use shared::SharedClient;
