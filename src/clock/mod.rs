//! Clock Source
//!
//! Wall-clock time for scheduling decisions and monotonic uptime for
//! diagnostics. The wall clock is corrected once at startup from SNTP.

mod sntp;

use sntp::sync;

use crate::config::{TimeSyncConfig, TimeSyncFailure};
use crate::error::TimeSyncError;
use crate::status::{Status, StatusIndicator};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use ivy_shared::{now_secs, Timestamp};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub trait Clock: Send + Sync {
    /// Current wall time in Unix seconds
    fn now(&self) -> Timestamp;

    /// Time since this clock was created
    fn uptime(&self) -> Duration;
}

/// System clock shifted by an offset learned from network time
#[derive(Debug, Clone)]
pub struct SyncedClock {
    offset_secs: i64,
    started: Instant,
}

impl SyncedClock {
    /// Trust the system clock as-is
    pub fn unsynced() -> Self {
        Self::with_offset(0)
    }

    pub fn with_offset(offset_secs: i64) -> Self {
        Self {
            offset_secs,
            started: Instant::now(),
        }
    }

    /// Offset so that `now()` matches `network_time` at this instant
    pub fn from_network_time(network_time: Timestamp) -> Self {
        Self::with_offset(network_time - now_secs())
    }

    pub fn offset_secs(&self) -> i64 {
        self.offset_secs
    }
}

impl Clock for SyncedClock {
    fn now(&self) -> Timestamp {
        now_secs() + self.offset_secs
    }

    fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Startup time sync. On exhaustion the pre-calibration colour is shown and
/// `on_failure` decides between an error (restart) and the system clock.
pub async fn synchronise(
    config: &TimeSyncConfig,
    indicator: &mut dyn StatusIndicator,
) -> Result<SyncedClock, TimeSyncError> {
    if !config.enabled {
        info!("[TIME] Sync disabled, using system clock");
        return Ok(SyncedClock::unsynced());
    }

    match sync(config).await {
        Ok(clock) => Ok(clock),
        Err(e) => {
            indicator.set(Status::PreCalibrationFailure);
            match config.on_failure {
                TimeSyncFailure::Restart => Err(e),
                TimeSyncFailure::Proceed => {
                    warn!("[TIME] {}. Continuing on the system clock", e);
                    Ok(SyncedClock::unsynced())
                }
            }
        }
    }
}

/// Format a timestamp as e.g. `Mon, Jan 1, 2024 at 09:05:03` in a fixed UTC offset
pub fn format_local(timestamp: Timestamp, offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap_or_else(|| Utc.fix());

    match DateTime::from_timestamp(timestamp, 0) {
        Some(utc) => utc
            .with_timezone(&offset)
            .format("%a, %b %-d, %Y at %H:%M:%S")
            .to_string(),
        None => format!("@{timestamp}"),
    }
}

/// Hand-driven clock for tests
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: std::sync::Arc<std::sync::atomic::AtomicI64>,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(now: Timestamp) -> Self {
        let clock = Self::default();
        clock.set(now);
        clock
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn uptime(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RecordingIndicator;

    #[test]
    fn test_format_local_applies_offset() {
        // 2024-01-01T16:05:03Z
        let ts = 1_704_125_103;
        assert_eq!(format_local(ts, -7), "Mon, Jan 1, 2024 at 09:05:03");
        assert_eq!(format_local(ts, 0), "Mon, Jan 1, 2024 at 16:05:03");
    }

    #[test]
    fn test_format_local_invalid_offset_falls_back_to_utc() {
        assert_eq!(format_local(1_704_125_103, 48), "Mon, Jan 1, 2024 at 16:05:03");
    }

    #[test]
    fn test_synced_clock_offset() {
        let target = now_secs() + 3600;
        let clock = SyncedClock::from_network_time(target);
        let drift = clock.now() - target;
        assert!((0..=1).contains(&drift));
    }

    /// Config pointing at a bound socket that never answers
    fn silent_server(on_failure: TimeSyncFailure) -> (TimeSyncConfig, std::net::UdpSocket) {
        let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = TimeSyncConfig {
            enabled: true,
            server: silent.local_addr().unwrap().to_string(),
            attempts: 1,
            retry_delay_secs: 0,
            request_timeout_secs: 0,
            on_failure,
        };
        (config, silent)
    }

    #[tokio::test]
    async fn test_sync_failure_can_proceed_on_system_clock() {
        let (config, _silent) = silent_server(TimeSyncFailure::Proceed);
        let mut indicator = RecordingIndicator::default();

        let clock = synchronise(&config, &mut indicator).await.unwrap();

        assert_eq!(clock.offset_secs(), 0);
        assert_eq!(indicator.last(), Some(Status::PreCalibrationFailure));
    }

    #[tokio::test]
    async fn test_sync_failure_can_demand_restart() {
        let (config, _silent) = silent_server(TimeSyncFailure::Restart);
        let mut indicator = RecordingIndicator::default();

        let result = synchronise(&config, &mut indicator).await;

        assert!(matches!(result, Err(TimeSyncError::Exhausted { attempts: 1 })));
        assert_eq!(indicator.last(), Some(Status::PreCalibrationFailure));
    }

    #[tokio::test]
    async fn test_sync_disabled_skips_network() {
        let config = TimeSyncConfig {
            enabled: false,
            ..TimeSyncConfig::default()
        };
        let mut indicator = RecordingIndicator::default();

        let clock = synchronise(&config, &mut indicator).await.unwrap();

        assert_eq!(clock.offset_secs(), 0);
        assert_eq!(indicator.last(), None);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::at(100);
        clock.advance(5);
        assert_eq!(clock.now(), 105);
    }
}
