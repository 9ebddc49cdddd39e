//! Retry state and controller phases.

use std::fmt;

/// Phase of the retry controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Idle,
    Attempting,
    Retrying,
    Succeeded,
    Exhausted,
}

impl ControllerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerPhase::Succeeded | ControllerPhase::Exhausted)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: ControllerPhase) -> bool {
        use ControllerPhase::*;
        matches!(
            (self, next),
            (Idle, Attempting)
                | (Attempting, Succeeded)
                | (Attempting, Retrying)
                | (Attempting, Exhausted)
                | (Retrying, Attempting)
        )
    }
}

impl fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerPhase::Idle => "idle",
            ControllerPhase::Attempting => "attempting",
            ControllerPhase::Retrying => "retrying",
            ControllerPhase::Succeeded => "succeeded",
            ControllerPhase::Exhausted => "exhausted",
        };
        write!(f, "{}", name)
    }
}

/// Counters owned by the retry controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub succeeded: bool,
    phase: ControllerPhase,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
            succeeded: false,
            phase: ControllerPhase::Idle,
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Index of the next attempt
    pub fn next_index(&self) -> u32 {
        self.attempts_made
    }

    pub fn is_terminal(&self) -> bool {
        self.succeeded || self.attempts_made >= self.max_attempts
    }

    pub fn begin_attempt(&mut self) {
        self.transition(ControllerPhase::Attempting);
    }

    pub fn record_success(&mut self) {
        self.succeeded = true;
        self.transition(ControllerPhase::Succeeded);
    }

    /// Count a non-success outcome. Returns true when another attempt follows.
    pub fn record_failure(&mut self) -> bool {
        self.attempts_made += 1;
        if self.attempts_made >= self.max_attempts {
            self.transition(ControllerPhase::Exhausted);
            false
        } else {
            self.transition(ControllerPhase::Retrying);
            true
        }
    }

    fn transition(&mut self, next: ControllerPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {} -> {}",
            self.phase,
            next
        );
        log::debug!("Retry phase {} -> {}", self.phase, next);
        self.phase = next;
    }
}
