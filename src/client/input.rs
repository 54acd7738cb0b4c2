//! Keyboard to turning intent

use std::collections::HashSet;

use crate::ws::protocol::{ClientMsg, Phase, Turning};

/// Keys the client reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
}

impl Key {
    /// Map a browser `KeyboardEvent.key` name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ArrowLeft" => Some(Key::Left),
            "ArrowRight" => Some(Key::Right),
            _ => None,
        }
    }
}

/// Held keys and the last turning sent to the server
#[derive(Debug, Default)]
pub struct InputState {
    pressed: HashSet<Key>,
    last_sent: Turning,
    phase: Phase,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turning for the held keys. Left wins when both are down.
    pub fn turning(&self) -> Turning {
        if self.pressed.contains(&Key::Left) {
            Turning::Left
        } else if self.pressed.contains(&Key::Right) {
            Turning::Right
        } else {
            Turning::Straight
        }
    }

    /// Forget what the server was told. Every round starts it at `Straight`.
    pub fn reset(&mut self) {
        self.last_sent = Turning::Straight;
    }

    /// Track the match phase. Entering a round resends any key still held.
    pub fn set_phase(&mut self, phase: Phase) -> Option<ClientMsg> {
        if phase == self.phase {
            return None;
        }
        self.phase = phase;
        if phase != Phase::Playing {
            return None;
        }
        self.reset();
        self.emit()
    }

    /// Key went down. Presses only count while a round is being played.
    pub fn press(&mut self, key: Key, phase: Phase) -> Option<ClientMsg> {
        let resent = self.set_phase(phase);
        if phase != Phase::Playing {
            return None;
        }
        self.pressed.insert(key);
        self.emit().or(resent)
    }

    /// Key went up
    pub fn release(&mut self, key: Key) -> Option<ClientMsg> {
        self.pressed.remove(&key);
        self.emit()
    }

    // Key repeat would otherwise flood the socket
    fn emit(&mut self) -> Option<ClientMsg> {
        let turning = self.turning();
        if turning == self.last_sent {
            return None;
        }
        self.last_sent = turning;
        Some(ClientMsg::PlayerInput { turning })
    }
}
