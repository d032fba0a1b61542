// Noise-filtering policies.
//
// Both debouncers are pure state machines: the caller supplies the
// observation and the evaluation instant, the policy decides whether
// anything changed. Nothing here reads the client or sends anything.

use std::time::{Duration, Instant};

use crate::core::model::IdleState;

/// Short absence timeout for combat targets.
pub const OPPONENT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);
/// Long absence timeout for skill training, XP drops are bursty.
pub const SKILL_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

pub const MIN_IDLE_THRESHOLD_SECS: u64 = 1;
pub const MAX_IDLE_THRESHOLD_SECS: u64 = 60;

/// Outcome of an [`IdentityDebounce`] evaluation that must be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChange {
    Became(String),
    /// Absent for at least the idle timeout
    Cleared,
}

/// Remembers the last observed name and reports only changes.
#[derive(Debug, Clone)]
pub struct IdentityDebounce {
    idle_timeout: Duration,
    remembered: Option<String>,
    last_seen_at: Option<Instant>,
}

impl IdentityDebounce {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            remembered: None,
            last_seen_at: None,
        }
    }

    pub fn observe(&mut self, observed: Option<&str>, now: Instant) -> Option<IdentityChange> {
        match observed {
            Some(value) => {
                self.last_seen_at = Some(now);
                if self.remembered.as_deref() == Some(value) {
                    return None;
                }
                self.remembered = Some(value.to_string());
                Some(IdentityChange::Became(value.to_string()))
            }
            None => {
                self.remembered.as_ref()?;
                let last_seen = self.last_seen_at?;
                if now.saturating_duration_since(last_seen) < self.idle_timeout {
                    return None;
                }
                self.remembered = None;
                Some(IdentityChange::Cleared)
            }
        }
    }

    pub fn reset(&mut self) {
        self.remembered = None;
        self.last_seen_at = None;
    }

    pub fn remembered(&self) -> Option<&str> {
        self.remembered.as_deref()
    }
}

/// Idle/active switch that needs a sustained quiet period before going idle.
#[derive(Debug, Clone)]
pub struct BinaryDebounce {
    threshold: Duration,
    idle: bool,
    pending_since: Option<Instant>,
}

impl BinaryDebounce {
    pub fn new(threshold_secs: u64) -> Self {
        Self {
            threshold: clamp_threshold(threshold_secs),
            idle: false,
            pending_since: None,
        }
    }

    /// Returns the new state on a transition, `None` otherwise.
    pub fn observe(&mut self, active: bool, now: Instant) -> Option<IdleState> {
        if self.idle {
            if !active {
                return None;
            }
            self.idle = false;
            self.pending_since = None;
            return Some(IdleState::NotIdle);
        }

        if active {
            self.pending_since = None;
            return None;
        }

        let since = *self.pending_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.threshold {
            self.idle = true;
            return Some(IdleState::Idle);
        }
        None
    }

    pub fn set_threshold(&mut self, threshold_secs: u64) {
        self.threshold = clamp_threshold(threshold_secs);
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn state(&self) -> IdleState {
        IdleState::from_idle(self.idle)
    }

    pub fn reset(&mut self) {
        self.idle = false;
        self.pending_since = None;
    }
}

fn clamp_threshold(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_IDLE_THRESHOLD_SECS, MAX_IDLE_THRESHOLD_SECS))
}
