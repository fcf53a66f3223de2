//! Ivy Shared Types
//!
//! This crate provides the I/O-free core of the sensor node: the calibration
//! lifecycle, the publish scheduler, the restart escalation policy and the
//! JSON payloads published to the broker.

pub mod calibration;
pub mod payload;
pub mod resilience;
pub mod schedule;

use std::time::{SystemTime, UNIX_EPOCH};

pub use calibration::{parse_baseline, Baseline, CalibrationParseError, CalibrationState, RemoteUpdate};
pub use payload::{
    AirQualityReading, AmbientReading, AqiPayload, LightReading, NodeInfo, Readings, SoilReading,
    TelemetryPayload,
};
pub use resilience::{Escalation, RestartPolicy};
pub use schedule::{
    FailureCounter, PublishOutcome, PublishScheduler, PublishTarget, RetryPolicy, ScheduleState,
};

/// Wall-clock time in whole seconds since the Unix epoch (UTC)
pub type Timestamp = i64;

/// Get current timestamp in seconds since Unix epoch
pub fn now_secs() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as Timestamp
}

/// Timing parameters for the node
pub mod timing {
    /// Length of the SGP30 self-calibration window (12 hours)
    pub const CALIBRATION_WINDOW_SECS: u64 = 12 * 60 * 60;

    /// Routine telemetry publish interval
    pub const TELEMETRY_INTERVAL_SECS: u64 = 30 * 60;

    /// Air-quality publish interval
    pub const AQI_INTERVAL_SECS: u64 = 5 * 60;

    /// Sensor warm-up before the first publish
    pub const WARMUP_SECS: u64 = 2 * 60;

    /// Extra offset of the first AQI publish after warm-up
    pub const AQI_WARMUP_OFFSET_SECS: u64 = 10;

    /// Quick retry delay after a failed publish
    pub const SHORT_RETRY_DELAY_SECS: u64 = 60;

    /// Consecutive failures per target after which quick retries stop
    pub const RETRY_ESCALATION_THRESHOLD: u32 = 2;

    /// Consecutive telemetry failures that trigger a full restart
    pub const RESTART_THRESHOLD: u32 = 5;

    /// Cooldown between the fatal indication and the restart
    pub const RESTART_COOLDOWN_SECS: u64 = 10;

    /// Main loop tick
    pub const TICK_INTERVAL_MS: u64 = 1000;

    /// Remote baseline fetch attempts at startup
    pub const BOOTSTRAP_ATTEMPTS: u32 = 3;

    /// Delay between remote baseline fetch attempts
    pub const BOOTSTRAP_RETRY_DELAY_SECS: u64 = 2;

    /// Default static fallback baseline (eCO2, TVOC)
    pub const FALLBACK_BASELINE: (u16, u16) = (36515, 37460);
}
