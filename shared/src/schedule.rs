//! Publish Scheduler
//!
//! Holds the next-due timestamps for routine telemetry and air-quality
//! telemetry and decides how they move after each publish attempt.

use crate::{timing, Timestamp};
use std::time::Duration;

/// The two independently scheduled publish targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishTarget {
    /// Routine environmental telemetry
    Telemetry,
    /// Air-quality payload
    Aqi,
}

impl std::fmt::Display for PublishTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishTarget::Telemetry => write!(f, "telemetry"),
            PublishTarget::Aqi => write!(f, "aqi"),
        }
    }
}

/// Result of a single publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Success,
    TransientFailure(String),
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Success)
    }
}

/// Next-due timestamps and the regular intervals that advance them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleState {
    pub next_telemetry_due: Timestamp,
    pub next_aqi_due: Timestamp,
    pub telemetry_interval: Duration,
    pub aqi_interval: Duration,
}

impl ScheduleState {
    /// Schedule the first publishes after a sensor warm-up period
    pub fn starting_at(
        now: Timestamp,
        warmup: Duration,
        telemetry_interval: Duration,
        aqi_interval: Duration,
    ) -> Self {
        let first = now + secs(warmup);
        Self {
            next_telemetry_due: first,
            next_aqi_due: first + timing::AQI_WARMUP_OFFSET_SECS as i64,
            telemetry_interval,
            aqi_interval,
        }
    }

    pub fn due_telemetry(&self, now: Timestamp) -> bool {
        now >= self.next_telemetry_due
    }

    pub fn due_aqi(&self, now: Timestamp) -> bool {
        now >= self.next_aqi_due
    }

    pub fn is_due(&self, target: PublishTarget, now: Timestamp) -> bool {
        match target {
            PublishTarget::Telemetry => self.due_telemetry(now),
            PublishTarget::Aqi => self.due_aqi(now),
        }
    }

    pub fn next_due(&self, target: PublishTarget) -> Timestamp {
        match target {
            PublishTarget::Telemetry => self.next_telemetry_due,
            PublishTarget::Aqi => self.next_aqi_due,
        }
    }

    /// Seconds until the target is next due (negative when overdue)
    pub fn remaining(&self, target: PublishTarget, now: Timestamp) -> i64 {
        self.next_due(target) - now
    }

    fn interval(&self, target: PublishTarget) -> Duration {
        match target {
            PublishTarget::Telemetry => self.telemetry_interval,
            PublishTarget::Aqi => self.aqi_interval,
        }
    }

    fn set_next_due(&mut self, target: PublishTarget, at: Timestamp) {
        match target {
            PublishTarget::Telemetry => self.next_telemetry_due = at,
            PublishTarget::Aqi => self.next_aqi_due = at,
        }
    }
}

/// Consecutive failed attempts per target since its last success
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureCounter {
    pub telemetry: u32,
    pub aqi: u32,
}

impl FailureCounter {
    pub fn get(&self, target: PublishTarget) -> u32 {
        match target {
            PublishTarget::Telemetry => self.telemetry,
            PublishTarget::Aqi => self.aqi,
        }
    }

    fn slot(&mut self, target: PublishTarget) -> &mut u32 {
        match target {
            PublishTarget::Telemetry => &mut self.telemetry,
            PublishTarget::Aqi => &mut self.aqi,
        }
    }
}

/// Quick-retry behaviour after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before retrying a failed publish
    pub short_retry_delay: Duration,
    /// Consecutive failures at which quick retries give way to the full interval
    pub escalation_threshold: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            short_retry_delay: Duration::from_secs(timing::SHORT_RETRY_DELAY_SECS),
            escalation_threshold: timing::RETRY_ESCALATION_THRESHOLD,
        }
    }
}

/// Owns the schedule and the per-target failure counters
#[derive(Debug, Clone)]
pub struct PublishScheduler {
    state: ScheduleState,
    failures: FailureCounter,
    retry: RetryPolicy,
}

impl PublishScheduler {
    pub fn new(state: ScheduleState, retry: RetryPolicy) -> Self {
        Self {
            state,
            failures: FailureCounter::default(),
            retry,
        }
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn failures(&self) -> FailureCounter {
        self.failures
    }

    /// Targets due at `now`, telemetry always ahead of AQI
    pub fn due_targets(&self, now: Timestamp) -> Vec<PublishTarget> {
        [PublishTarget::Telemetry, PublishTarget::Aqi]
            .into_iter()
            .filter(|target| self.state.is_due(*target, now))
            .collect()
    }

    /// Feed the outcome of an attempt back into the schedule.
    ///
    /// Returns the timestamp the target is next due at.
    pub fn on_attempt(
        &mut self,
        target: PublishTarget,
        outcome: &PublishOutcome,
        now: Timestamp,
    ) -> Timestamp {
        let next = match outcome {
            PublishOutcome::Success => {
                *self.failures.slot(target) = 0;
                now + secs(self.state.interval(target))
            }
            PublishOutcome::TransientFailure(_) => {
                let count = self.failures.slot(target);
                *count = count.saturating_add(1);
                if *count >= self.retry.escalation_threshold {
                    // Stop spinning on quick retries until the next full interval
                    now + secs(self.state.interval(target))
                } else {
                    now + secs(self.retry.short_retry_delay)
                }
            }
        };

        self.state.set_next_due(target, next);
        next
    }
}

fn secs(duration: Duration) -> i64 {
    duration.as_secs() as i64
}
