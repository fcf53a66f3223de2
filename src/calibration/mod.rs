//! Calibration Lifecycle
//!
//! Wraps the pure `CalibrationState` machine with its one side effect:
//! every transition into a baseline-holding state seeds the air-quality
//! sensor exactly once.

mod bootstrap;

pub use bootstrap::BootstrapSettings;

use crate::sensors::SensorSuite;
use ivy_shared::{Baseline, CalibrationParseError, CalibrationState, RemoteUpdate, Timestamp};
use tracing::{info, warn};

#[derive(Debug)]
pub struct CalibrationLifecycle {
    state: CalibrationState,
}

impl CalibrationLifecycle {
    /// Lifecycle that stays in an existing state; nothing is seeded
    pub fn from_state(state: CalibrationState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    /// Close the calibration window once `now` has passed its deadline.
    ///
    /// Returns true when the state changed.
    pub fn advance(&mut self, now: Timestamp) -> bool {
        let next = self.state.advance(now);
        if next == self.state {
            return false;
        }
        info!(
            "[CALIB] Calibration window closed, reporting baseline {}",
            next.baseline()
        );
        self.state = next;
        true
    }

    /// Handle an inbound baseline message: parse, record and seed
    pub fn on_remote_message(
        &mut self,
        payload: &[u8],
        sensors: &mut SensorSuite,
    ) -> Result<RemoteUpdate, CalibrationParseError> {
        let update = self.state.apply_remote(payload)?;
        match update {
            RemoteUpdate::Applied(baseline) => {
                info!("[CALIB] Remote baseline received: {}", baseline);
                seed(sensors, baseline);
            }
            RemoteUpdate::IgnoredWhileCalibrating => {
                info!("[CALIB] Ignoring remote baseline while self-calibrating");
            }
        }
        Ok(update)
    }

    /// Switch to the static fallback and seed it
    fn adopt_fallback(&mut self, fallback: Baseline, sensors: &mut SensorSuite) {
        self.state = CalibrationState::UsingFallbackBaseline(fallback);
        seed(sensors, fallback);
    }
}

fn seed(sensors: &mut SensorSuite, baseline: Baseline) {
    match sensors.seed_baseline(baseline) {
        Ok(()) => info!("[CALIB] Sensor baseline set to {}", baseline),
        Err(e) => warn!("[CALIB] Failed to seed baseline {}: {}", baseline, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::fake;
    use std::time::Duration;

    #[test]
    fn test_remote_message_seeds_exactly_once() {
        let (mut sensors, seeded) = fake::suite();
        let mut lifecycle = CalibrationLifecycle::from_state(
            CalibrationState::UsingFallbackBaseline(Baseline::new(36515, 37460)),
        );

        let update = lifecycle
            .on_remote_message(br#"{"baseline_eCO2":36172,"baseline_TVOC":37415}"#, &mut sensors)
            .unwrap();

        assert_eq!(update, RemoteUpdate::Applied(Baseline::new(36172, 37415)));
        assert_eq!(
            *lifecycle.state(),
            CalibrationState::UsingRemoteBaseline(Baseline::new(36172, 37415))
        );
        assert_eq!(seeded.lock().unwrap().seeded, vec![Baseline::new(36172, 37415)]);
    }

    #[test]
    fn test_malformed_message_neither_changes_nor_seeds() {
        let (mut sensors, seeded) = fake::suite();
        let initial = CalibrationState::UsingFallbackBaseline(Baseline::new(36515, 37460));
        let mut lifecycle = CalibrationLifecycle::from_state(initial);

        assert!(lifecycle.on_remote_message(b"{\"baseline_eCO2\":", &mut sensors).is_err());
        assert_eq!(*lifecycle.state(), initial);
        assert!(seeded.lock().unwrap().seeded.is_empty());
    }

    #[test]
    fn test_calibrating_ignores_remote_and_does_not_seed() {
        let (mut sensors, seeded) = fake::suite();
        let mut lifecycle = CalibrationLifecycle::from_state(CalibrationState::fresh(
            0,
            Duration::from_secs(100),
            Baseline::new(1, 1),
        ));

        let update = lifecycle
            .on_remote_message(br#"{"baseline_eCO2":5,"baseline_TVOC":6}"#, &mut sensors)
            .unwrap();

        assert_eq!(update, RemoteUpdate::IgnoredWhileCalibrating);
        assert!(lifecycle.state().is_calibrating());
        assert!(seeded.lock().unwrap().seeded.is_empty());
    }

    #[test]
    fn test_advance_closes_window_without_seeding() {
        let (_, seeded) = fake::suite();
        let mut lifecycle = CalibrationLifecycle::from_state(CalibrationState::fresh(
            0,
            Duration::from_secs(100),
            Baseline::new(36515, 37460),
        ));

        assert!(!lifecycle.advance(100));
        assert!(lifecycle.advance(101));
        assert!(lifecycle.state().using_fallback());
        assert!(!lifecycle.advance(102));
        assert!(seeded.lock().unwrap().seeded.is_empty());
    }
}
