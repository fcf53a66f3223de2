//! Main loop: one tick per second, telemetry before air quality

use super::Node;
use crate::clock::{format_local, Clock};
use crate::error::SensorError;
use crate::status::Status;
use crate::transport::Transport;
use ivy_shared::{
    AqiPayload, Escalation, NodeInfo, PublishOutcome, PublishTarget, TelemetryPayload, Timestamp,
};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Attempts in the order they were made
    pub attempts: Vec<(PublishTarget, PublishOutcome)>,
    /// Set when the failure threshold was reached; holds the failure count
    pub restart: Option<u32>,
}

/// Why `Node::run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Restart { failures: u32 },
}

impl<C: Clock, T: Transport> Node<C, T> {
    pub async fn run(&mut self) -> RunExit {
        info!(
            "[NODE] Running since {}, telemetry every {}s, AQI every {}s",
            self.running_since,
            self.settings.telemetry_interval.as_secs(),
            self.settings.aqi_interval.as_secs()
        );

        loop {
            match self.tick().await {
                Ok(TickOutcome {
                    restart: Some(failures),
                    ..
                }) => return RunExit::Restart { failures },
                Ok(_) => {}
                Err(e) => warn!("[NODE] Skipping tick: {}", e),
            }
            sleep(self.settings.tick_interval).await;
        }
    }

    /// Run one pass of the loop against the current time.
    ///
    /// A sensor error aborts the tick before anything is published.
    pub async fn tick(&mut self) -> Result<TickOutcome, SensorError> {
        let now = self.clock.now();
        self.calibration.advance(now);

        let readings = self.sensors.read_all()?;

        let now_time = format_local(now, self.settings.timezone_offset_hours);
        let info = NodeInfo {
            ip_address: &self.ip_address,
            running_since: &self.running_since,
            now_time: &now_time,
            mqtt_fail_count: self.restart.consecutive_failures(),
        };
        let telemetry = TelemetryPayload::assemble(
            &info,
            &readings,
            self.scheduler.state(),
            self.calibration.state(),
            now,
        );
        debug!("[NODE] {:?}", telemetry);

        let mut outcome = TickOutcome::default();
        for target in self.scheduler.due_targets(now) {
            let result = match target {
                PublishTarget::Telemetry => {
                    self.publisher
                        .publish(&self.settings.telemetry_topic, &telemetry)
                        .await
                }
                PublishTarget::Aqi => {
                    let payload = AqiPayload::assemble(&readings.air, self.calibration.state(), now);
                    self.log_aqi(&payload).await;
                    self.publisher.publish(&self.settings.aqi_topic, &payload).await
                }
            };

            let escalation = self.record(target, &result, now);
            outcome.attempts.push((target, result));

            if let Escalation::Restart { failures } = escalation {
                error!(
                    "[NODE] {} consecutive publish failures after {}s uptime, restarting in {}s",
                    failures,
                    self.clock.uptime().as_secs(),
                    self.settings.restart_cooldown.as_secs()
                );
                self.indicator.set(Status::PublishFailure);
                sleep(self.settings.restart_cooldown).await;
                outcome.restart = Some(failures);
                return Ok(outcome);
            }
        }

        if !outcome.attempts.is_empty() {
            debug!(
                "[NODE] {}/{} publishes succeeded",
                outcome.attempts.iter().filter(|(_, r)| r.is_success()).count(),
                outcome.attempts.len()
            );
        }
        Ok(outcome)
    }

    fn record(&mut self, target: PublishTarget, result: &PublishOutcome, now: Timestamp) -> Escalation {
        let next = self.scheduler.on_attempt(target, result, now);
        let escalation = self.restart.record(target, result);

        match result {
            PublishOutcome::Success => {
                info!("[NODE] Published {}, next in {}s", target, next - now);
                let failures = self.scheduler.failures();
                if failures.telemetry == 0 && failures.aqi == 0 {
                    self.indicator.set(Status::Idle);
                }
            }
            PublishOutcome::TransientFailure(reason) => {
                warn!(
                    "[NODE] {} publish failed ({} in a row, {}/{} toward restart), retrying in {}s: {}",
                    target,
                    self.scheduler.failures().get(target),
                    self.restart.consecutive_failures(),
                    self.restart.threshold(),
                    next - now,
                    reason
                );
                self.indicator.set(match target {
                    PublishTarget::Telemetry => Status::PublishFailure,
                    PublishTarget::Aqi => Status::AqiFailure,
                });
            }
        }

        escalation
    }

    async fn log_aqi(&self, payload: &AqiPayload) {
        if let Some(log) = &self.aqi_log {
            if let Err(e) = log.append(payload).await {
                warn!("[NODE] Failed to append to {}: {}", log.path().display(), e);
            }
        }
    }
}
