//! Client state shared between the network handler and the draw loop
//!
//! The network side takes the write lock for a whole message, so the draw
//! loop never observes a half-applied update.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::warn;

use crate::ws::protocol::{ClientMsg, Phase, ServerMsg};

use super::hud::{hud_rows, HudRow, HudThrottle};
use super::input::{InputState, Key};
use super::reconcile::{reconcile, ClientView, RenderHints};
use super::render::{RenderLayers, Surface};

/// Result of applying one message
#[derive(Debug, Default)]
pub struct Applied {
    pub hints: RenderHints,
    /// Fresh HUD rows, present when the HUD should be rebuilt now
    pub hud: Option<Vec<HudRow>>,
    /// Turning to send because a round started with a key held
    pub input: Option<ClientMsg>,
}

struct ClientState<S> {
    view: Option<ClientView>,
    layers: RenderLayers<S>,
    hud_throttle: HudThrottle,
    input: InputState,
}

/// Cloneable handle on the cached view and render layers
pub struct SharedClient<S> {
    inner: Arc<RwLock<ClientState<S>>>,
}

impl<S> Clone for SharedClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Surface> SharedClient<S> {
    pub fn new(background: S, trails: S) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ClientState {
                view: None,
                layers: RenderLayers::new(background, trails),
                hud_throttle: HudThrottle::default(),
                input: InputState::new(),
            })),
        }
    }

    /// Parse and apply a raw server message. Malformed input is logged and dropped.
    pub fn on_text(&self, text: &str, now: Instant) -> Option<Applied> {
        match serde_json::from_str::<ServerMsg>(text) {
            Ok(msg) => Some(self.on_message(&msg, now)),
            Err(e) => {
                warn!(error = %e, "Failed to parse server message");
                None
            }
        }
    }

    pub fn on_message(&self, msg: &ServerMsg, now: Instant) -> Applied {
        let mut state = self.inner.write();
        let (view, hints) = reconcile(state.view.take(), msg);
        state.view = view;
        state.layers.apply(&hints.trail);
        let phase = state.view.as_ref().map(|v| v.phase);
        let input = phase.and_then(|phase| state.input.set_phase(phase));

        // Snapshots always refresh the HUD; deltas only in play, throttled
        let refresh = match msg {
            ServerMsg::GameState(_) => true,
            ServerMsg::Frame(_) => {
                let in_play = state
                    .view
                    .as_ref()
                    .is_some_and(|v| matches!(v.phase, Phase::Playing | Phase::RoundEnd));
                hints.phase_changed || (in_play && state.hud_throttle.ready(now))
            }
            ServerMsg::Error { .. } => false,
        };
        let hud = if refresh {
            state.view.as_ref().map(hud_rows)
        } else {
            None
        };

        Applied { hints, hud, input }
    }

    /// Key went down. Returns the message to send, if any.
    pub fn key_down(&self, key: Key) -> Option<ClientMsg> {
        let mut state = self.inner.write();
        let phase = state.view.as_ref().map_or(Phase::Lobby, |v| v.phase);
        state.input.press(key, phase)
    }

    /// Key went up
    pub fn key_up(&self, key: Key) -> Option<ClientMsg> {
        self.inner.write().input.release(key)
    }

    /// Draw one animation frame. Returns false when nothing was drawn.
    pub fn draw_frame(&self, screen: &mut S) -> bool {
        let state = self.inner.read();
        match &state.view {
            Some(view) => state.layers.draw_frame(screen, view),
            None => false,
        }
    }

    /// Copy of the cached view
    pub fn view(&self) -> Option<ClientView> {
        self.inner.read().view.clone()
    }

    /// Run `f` against the trail raster
    pub fn with_trails<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(self.inner.read().layers.trails())
    }
}
