//! SGP30 Calibration Lifecycle
//!
//! Tracks whether the air-quality sensor is inside its self-calibration
//! window or running on a remote or static fallback baseline.

use crate::Timestamp;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;

/// An (eCO2, TVOC) baseline pair as used by the SGP30 driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    #[serde(rename = "baseline_eCO2", deserialize_with = "baseline_word")]
    pub eco2: u16,
    #[serde(rename = "baseline_TVOC", deserialize_with = "baseline_word")]
    pub tvoc: u16,
}

/// Accept a 16-bit word written either as `36172` or `36172.0`
fn baseline_word<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&value) {
        Ok(value as u16)
    } else {
        Err(D::Error::custom(format!("baseline {value} is not a 16-bit word")))
    }
}

impl Baseline {
    pub const fn new(eco2: u16, tvoc: u16) -> Self {
        Self { eco2, tvoc }
    }
}

impl std::fmt::Display for Baseline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.eco2, self.tvoc)
    }
}

/// Errors raised while parsing an inbound baseline message
#[derive(Error, Debug)]
pub enum CalibrationParseError {
    #[error("Malformed baseline message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Inbound baseline shapes: the flat message, or a retained telemetry
/// payload carrying the pair under `sgp30`
#[derive(Deserialize)]
#[serde(untagged)]
enum BaselineMessage {
    Flat(Baseline),
    Telemetry { sgp30: Baseline },
}

/// Parse an inbound baseline message
pub fn parse_baseline(payload: &[u8]) -> Result<Baseline, CalibrationParseError> {
    let message: BaselineMessage = serde_json::from_slice(payload)?;
    Ok(match message {
        BaselineMessage::Flat(baseline) => baseline,
        BaselineMessage::Telemetry { sgp30 } => sgp30,
    })
}

/// Calibration state of the air-quality sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    /// Sensor is self-calibrating until `deadline`; `fallback` is held for
    /// reporting once the window closes
    Calibrating { deadline: Timestamp, fallback: Baseline },
    /// Baseline received from the broker
    UsingRemoteBaseline(Baseline),
    /// Static baseline from configuration
    UsingFallbackBaseline(Baseline),
}

/// Result of offering a remote baseline to the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteUpdate {
    /// State is now `UsingRemoteBaseline`; the baseline must be seeded into the sensor
    Applied(Baseline),
    /// Sensor is self-calibrating; message dropped
    IgnoredWhileCalibrating,
}

impl CalibrationState {
    /// Start a fresh self-calibration window
    pub fn fresh(now: Timestamp, window: Duration, fallback: Baseline) -> Self {
        CalibrationState::Calibrating {
            deadline: now + window.as_secs() as i64,
            fallback,
        }
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self, CalibrationState::Calibrating { .. })
    }

    pub fn using_fallback(&self) -> bool {
        matches!(self, CalibrationState::UsingFallbackBaseline(_))
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        match self {
            CalibrationState::Calibrating { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    /// The baseline this state considers authoritative
    pub fn baseline(&self) -> Baseline {
        match self {
            CalibrationState::Calibrating { fallback, .. } => *fallback,
            CalibrationState::UsingRemoteBaseline(b) | CalibrationState::UsingFallbackBaseline(b) => *b,
        }
    }

    /// Seconds left in the calibration window, zero once it has closed
    pub fn remaining(&self, now: Timestamp) -> i64 {
        self.deadline()
            .map(|deadline| (deadline - now).max(0))
            .unwrap_or(0)
    }

    /// Advance the lifecycle to `now`.
    ///
    /// Identity while `now <= deadline`. Past the deadline the held baseline
    /// becomes authoritative; it is not re-applied to the sensor.
    pub fn advance(self, now: Timestamp) -> Self {
        match self {
            CalibrationState::Calibrating { deadline, fallback } if now > deadline => {
                CalibrationState::UsingFallbackBaseline(fallback)
            }
            other => other,
        }
    }

    /// Offer a parsed remote baseline
    pub fn accept_remote(&mut self, baseline: Baseline) -> RemoteUpdate {
        if self.is_calibrating() {
            return RemoteUpdate::IgnoredWhileCalibrating;
        }
        *self = CalibrationState::UsingRemoteBaseline(baseline);
        RemoteUpdate::Applied(baseline)
    }

    /// Parse and offer a raw inbound message. Malformed input leaves the
    /// state untouched.
    pub fn apply_remote(&mut self, payload: &[u8]) -> Result<RemoteUpdate, CalibrationParseError> {
        let baseline = parse_baseline(payload)?;
        Ok(self.accept_remote(baseline))
    }

    pub fn label(&self) -> &'static str {
        match self {
            CalibrationState::Calibrating { .. } => "calibrating",
            CalibrationState::UsingRemoteBaseline(_) => "remote-baseline",
            CalibrationState::UsingFallbackBaseline(_) => "fallback-baseline",
        }
    }
}
