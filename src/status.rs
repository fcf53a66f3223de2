//! Status indicator
//!
//! A single RGB output set to a fixed colour per condition. Purely
//! observational; nothing reads it back.

use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Everything nominal, LED off
    Idle,
    /// Retrying the remote baseline fetch
    CalibrationRetry,
    /// Telemetry publish failed
    PublishFailure,
    /// AQI publish failed
    AqiFailure,
    /// Startup failed before calibration could begin
    PreCalibrationFailure,
}

impl Status {
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Status::Idle => (0, 0, 0),
            Status::CalibrationRetry => (255, 165, 0),
            Status::PublishFailure => (255, 0, 0),
            Status::AqiFailure => (255, 0, 255),
            Status::PreCalibrationFailure => (0, 0, 255),
        }
    }
}

pub trait StatusIndicator: Send {
    fn set(&mut self, status: Status);
}

/// Indicator for hosted targets: logs each colour change
#[derive(Debug, Default)]
pub struct LogIndicator {
    current: Option<Status>,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusIndicator for LogIndicator {
    fn set(&mut self, status: Status) {
        if self.current == Some(status) {
            return;
        }
        let (r, g, b) = status.rgb();
        info!("[STATUS] {:?} -> rgb({}, {}, {})", status, r, g, b);
        self.current = Some(status);
    }
}

/// Records every colour set, for tests
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    pub history: std::sync::Arc<std::sync::Mutex<Vec<Status>>>,
}

#[cfg(test)]
impl RecordingIndicator {
    pub fn last(&self) -> Option<Status> {
        self.history.lock().unwrap().last().copied()
    }

    pub fn contains(&self, status: Status) -> bool {
        self.history.lock().unwrap().contains(&status)
    }
}

#[cfg(test)]
impl StatusIndicator for RecordingIndicator {
    fn set(&mut self, status: Status) {
        self.history.lock().unwrap().push(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colours_are_distinct() {
        let all = [
            Status::Idle,
            Status::CalibrationRetry,
            Status::PublishFailure,
            Status::AqiFailure,
            Status::PreCalibrationFailure,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.rgb(), b.rgb());
            }
        }
        assert_eq!(Status::Idle.rgb(), (0, 0, 0));
    }

    #[test]
    fn test_log_indicator_tracks_current() {
        let mut indicator = LogIndicator::new();
        assert_eq!(indicator.current, None);
        indicator.set(Status::AqiFailure);
        indicator.set(Status::AqiFailure);
        assert_eq!(indicator.current, Some(Status::AqiFailure));
    }
}
