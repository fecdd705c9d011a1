//! Per-question countdowns.
//!
//! `Timer` is owned by the session controller and only changes on state
//! transitions: `arm` when a timed question is pushed, `disarm` when it is
//! answered or the session is suspended. `tick` is driven once per second.

use std::collections::HashMap;

use crate::models::question::QuestionType;
use crate::session::models::SessionKey;

/// Seconds allowed for a question of this type. `None` = untimed.
pub fn seconds_for(question_type: QuestionType) -> Option<u32> {
    question_type.time_limit_secs()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting; carries the seconds left after this tick.
    Running(u32),
    /// Reached zero on this tick. The countdown is disarmed.
    Expired,
}

/// At most one armed countdown per session.
#[derive(Debug, Default)]
pub struct Timer {
    armed: HashMap<SessionKey, u32>,
}

impl Timer {
    /// Arms a countdown, replacing any previous one for the same session.
    /// Returns `true` if a countdown was already armed (the caller forgot to disarm).
    pub fn arm(&mut self, key: &SessionKey, seconds: u32) -> bool {
        self.armed.insert(key.clone(), seconds).is_some()
    }

    /// Disarms the session's countdown, returning the seconds it had left.
    pub fn disarm(&mut self, key: &SessionKey) -> Option<u32> {
        self.armed.remove(key)
    }

    /// Advances every armed countdown by one second.
    pub fn tick(&mut self) -> Vec<(SessionKey, TickOutcome)> {
        let mut outcomes = Vec::with_capacity(self.armed.len());
        for (key, left) in self.armed.iter_mut() {
            *left = left.saturating_sub(1);
            let outcome = if *left == 0 {
                TickOutcome::Expired
            } else {
                TickOutcome::Running(*left)
            };
            outcomes.push((key.clone(), outcome));
        }
        self.armed.retain(|_, left| *left > 0);
        outcomes
    }
}
