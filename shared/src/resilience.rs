//! Restart Escalation
//!
//! Process-wide count of consecutive telemetry publish failures. Air-quality
//! publishes are best-effort: they neither escalate nor clear the streak.

use crate::schedule::{PublishOutcome, PublishTarget};
use crate::timing;

/// What the caller must do after recording an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Keep running
    None,
    /// Failure threshold reached: indicate, cool down, restart
    Restart { failures: u32 },
}

#[derive(Debug, Clone)]
pub struct RestartPolicy {
    consecutive_failures: u32,
    threshold: u32,
    fired: bool,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(timing::RESTART_THRESHOLD)
    }
}

impl RestartPolicy {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold: threshold.max(1),
            fired: false,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record an attempt on `target`. Only a telemetry success clears the count.
    pub fn record(&mut self, target: PublishTarget, outcome: &PublishOutcome) -> Escalation {
        match (target, outcome) {
            (PublishTarget::Aqi, _) => Escalation::None,
            (PublishTarget::Telemetry, PublishOutcome::Success) => {
                self.consecutive_failures = 0;
                self.fired = false;
                Escalation::None
            }
            (PublishTarget::Telemetry, PublishOutcome::TransientFailure(_)) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= self.threshold && !self.fired {
                    self.fired = true;
                    Escalation::Restart {
                        failures: self.consecutive_failures,
                    }
                } else {
                    Escalation::None
                }
            }
        }
    }
}
