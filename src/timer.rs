//! Debounce state machine
//!
//! A [`Debouncer`] is either idle or pending with a deadline. Every
//! [`schedule`](Debouncer::schedule) call moves the deadline to
//! `now + delay`, so a burst of calls fires once, `delay` after the last one.
//! Nothing fires on its own: the owner polls with the current time.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::after;

/// Current debounce state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Arm or restart the timer
    pub fn schedule(&mut self, now: DateTime<Utc>) {
        self.state = DebounceState::Pending {
            deadline: after(now, self.delay),
        };
    }

    /// Return to idle without firing
    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Pending { deadline } => Some(deadline),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DebounceState::Pending { .. })
    }

    /// Fire if the deadline has passed
    ///
    /// Returns true exactly once per armed period and moves back to idle.
    pub fn fire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            DebounceState::Pending { deadline } if now >= deadline => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}
