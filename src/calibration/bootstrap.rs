//! One-shot baseline acquisition at startup

use super::CalibrationLifecycle;
use crate::config::NodeConfig;
use crate::error::TransportError;
use crate::sensors::SensorSuite;
use crate::status::{Status, StatusIndicator};
use crate::transport::{MessageHandler, Transport};
use ivy_shared::{Baseline, CalibrationState, RemoteUpdate, Timestamp};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    /// Start a fresh self-calibration window instead of fetching
    pub fresh: bool,
    pub window: Duration,
    pub fallback: Baseline,
    pub topic: String,
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl BootstrapSettings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            fresh: config.calibration.fresh,
            window: Duration::from_secs(config.calibration.window_secs),
            fallback: config.fallback_baseline(),
            topic: config.baseline_topic(),
            attempts: config.calibration.bootstrap_attempts.max(1),
            retry_delay: Duration::from_secs(config.calibration.bootstrap_retry_delay_secs),
        }
    }
}

/// Routes messages on the baseline topic into the lifecycle
struct BaselineListener<'a> {
    topic: &'a str,
    lifecycle: &'a mut CalibrationLifecycle,
    sensors: &'a mut SensorSuite,
    applied: bool,
}

impl MessageHandler for BaselineListener<'_> {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        if topic != self.topic {
            debug!("[CALIB] Ignoring message on {}", topic);
            return;
        }
        match self.lifecycle.on_remote_message(payload, self.sensors) {
            Ok(RemoteUpdate::Applied(_)) => self.applied = true,
            Ok(RemoteUpdate::IgnoredWhileCalibrating) => {}
            Err(e) => warn!("[CALIB] Discarding baseline message: {}", e),
        }
    }
}

async fn fetch_round<T: Transport>(
    transport: &mut T,
    topic: &str,
    listener: &mut BaselineListener<'_>,
) -> Result<(), TransportError> {
    transport.connect().await?;
    transport.subscribe(topic).await?;
    transport.loop_once(listener).await
}

impl CalibrationLifecycle {
    /// Establish the starting calibration state.
    ///
    /// A fresh calibration never touches the network. Otherwise the baseline
    /// topic is polled in bounded rounds; a round that yields no valid
    /// baseline counts as failed, and exhausting them adopts the fallback.
    pub async fn initialize<T: Transport>(
        settings: &BootstrapSettings,
        now: Timestamp,
        transport: &mut T,
        sensors: &mut SensorSuite,
        indicator: &mut dyn StatusIndicator,
    ) -> Self {
        if settings.fresh {
            let state = CalibrationState::fresh(now, settings.window, settings.fallback);
            info!(
                "[CALIB] Starting {}s self-calibration window",
                settings.window.as_secs()
            );
            return Self::from_state(state);
        }

        // Not calibrating, so remote messages are accepted; seeded only on adoption
        let mut lifecycle =
            CalibrationLifecycle::from_state(CalibrationState::UsingFallbackBaseline(settings.fallback));

        for attempt in 1..=settings.attempts {
            info!(
                "[CALIB] Fetching baseline from {} (attempt {}/{})",
                settings.topic, attempt, settings.attempts
            );

            let mut listener = BaselineListener {
                topic: &settings.topic,
                lifecycle: &mut lifecycle,
                sensors: &mut *sensors,
                applied: false,
            };
            let result = fetch_round(transport, &settings.topic, &mut listener).await;
            let applied = listener.applied;

            if let Err(e) = transport.disconnect().await {
                debug!("[CALIB] Disconnect failed: {}", e);
            }

            match result {
                Ok(()) if applied => {
                    indicator.set(Status::Idle);
                    return lifecycle;
                }
                Ok(()) => warn!("[CALIB] No baseline received on {}", settings.topic),
                Err(e) => warn!("[CALIB] Baseline fetch failed: {}", e),
            }

            indicator.set(Status::CalibrationRetry);
            if attempt < settings.attempts {
                sleep(settings.retry_delay).await;
            }
        }

        warn!(
            "[CALIB] Retried {} times. Using fallback calibration {}",
            settings.attempts, settings.fallback
        );
        lifecycle.adopt_fallback(settings.fallback, sensors);
        indicator.set(Status::Idle);
        lifecycle
    }
}
