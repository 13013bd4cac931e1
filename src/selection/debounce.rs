//! Deadlines for selection checks.
//!
//! Change notifications are coalesced: each one pushes the debounced deadline
//! out, so only the last of a burst fires. Interaction signals schedule a
//! separate prompt deadline that is never pushed later.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debouncer {
    debounce: Duration,
    prompt: Duration,
    debounced_at: Option<Instant>,
    prompt_at: Option<Instant>,
}

impl Debouncer {
    pub fn new(debounce: Duration, prompt: Duration) -> Self {
        Self {
            debounce,
            prompt,
            debounced_at: None,
            prompt_at: None,
        }
    }

    /// A change was observed; supersedes any pending debounced check.
    pub fn schedule_debounced(&mut self, now: Instant) {
        self.debounced_at = Some(now + self.debounce);
    }

    /// A pointer or key interaction ended; check soon.
    pub fn schedule_prompt(&mut self, now: Instant) {
        let at = now + self.prompt;
        self.prompt_at = Some(self.prompt_at.map_or(at, |current| current.min(at)));
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.debounced_at, self.prompt_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Clear every deadline at or before `now`; true if any was due.
    pub fn take_due(&mut self, now: Instant) -> bool {
        let mut due = false;
        for slot in [&mut self.debounced_at, &mut self.prompt_at] {
            if slot.is_some_and(|at| at <= now) {
                *slot = None;
                due = true;
            }
        }
        due
    }
}
