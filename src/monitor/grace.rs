//! Grace-period decisions.
//!
//! Given the previous consecutive-failure count and one fresh outcome, decide
//! the count to persist and which alert, if any, fires. Pure: no I/O, no clock.
//!
//! Going down fires only on the exact crossing (`failures == grace_period`), so
//! an outage alerts once no matter how long it lasts. Coming back fires iff the
//! outage had reached the grace period (`previous >= grace_period`). A dip that
//! recovers before the crossing is silent in both directions.

use crate::probe::ProbeOutcome;

/// Alert to send after a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    NotifyDown,
    NotifyUp,
}

/// Health as seen through the failure counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded { failures: u32, alerted: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub consecutive_failures: u32,
    pub action: Action,
}

impl Transition {
    pub fn state(&self, grace_period: u32) -> HealthState {
        match self.consecutive_failures {
            0 => HealthState::Healthy,
            n => HealthState::Degraded {
                failures: n,
                alerted: n >= grace_period,
            },
        }
    }
}

/// Advance the failure counter by one outcome.
pub fn advance(previous: u32, outcome: &ProbeOutcome, grace_period: u32) -> Transition {
    if outcome.up {
        let action = if previous >= grace_period {
            Action::NotifyUp
        } else {
            Action::None
        };
        return Transition {
            consecutive_failures: 0,
            action,
        };
    }

    let failures = previous.saturating_add(1);
    let action = if failures == grace_period {
        Action::NotifyDown
    } else {
        Action::None
    };
    Transition {
        consecutive_failures: failures,
        action,
    }
}
