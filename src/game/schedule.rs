//! Cancellable scheduled transitions for the match state machine
//!
//! At most one task is pending at a time. Scheduling a new task cancels the
//! previous one, so a stale restart can never fire after a newer phase began.

use std::time::Instant;

/// Delayed phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Decrement the countdown, start the round at zero
    CountdownStep,
    /// Leave `round_end` for the next round (or the lobby)
    RestartRound,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    task: Task,
    due: Instant,
}

/// Single-slot task scheduler
#[derive(Debug, Default)]
pub struct Scheduler {
    pending: Option<Pending>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` at `due`, replacing anything pending
    pub fn schedule(&mut self, task: Task, due: Instant) {
        self.pending = Some(Pending { task, due });
    }

    /// Drop the pending task, if any
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// When the pending task becomes due
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.due)
    }

    /// Take the pending task if it is due at `now`
    pub fn take_due(&mut self, now: Instant) -> Option<Task> {
        match self.pending {
            Some(p) if p.due <= now => {
                self.pending = None;
                Some(p.task)
            }
            _ => None,
        }
    }
}
