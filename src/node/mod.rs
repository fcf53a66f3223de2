//! Node
//!
//! Owns every piece of runtime state: the clock, the sensors, the publisher,
//! the schedule, the restart counter and the calibration lifecycle. A single
//! task drives it; see `driver` for the tick itself.

mod driver;

pub use driver::{RunExit, TickOutcome};

use crate::calibration::CalibrationLifecycle;
use crate::clock::{format_local, Clock};
use crate::config::NodeConfig;
use crate::publish::Publisher;
use crate::sensors::SensorSuite;
use crate::status::StatusIndicator;
use crate::store::AqiLog;
use crate::transport::Transport;
use ivy_shared::{PublishScheduler, RestartPolicy, RetryPolicy, ScheduleState};
use std::net::UdpSocket;
use std::time::Duration;

/// Tunables for the main loop
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub telemetry_topic: String,
    pub aqi_topic: String,
    pub timezone_offset_hours: i32,
    pub warmup: Duration,
    pub telemetry_interval: Duration,
    pub aqi_interval: Duration,
    pub retry: RetryPolicy,
    pub tick_interval: Duration,
    pub publish_timeout: Duration,
    pub restart_threshold: u32,
    pub restart_cooldown: Duration,
}

impl NodeSettings {
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            telemetry_topic: config.telemetry_topic(),
            aqi_topic: config.aqi_topic(),
            timezone_offset_hours: config.device.timezone_offset_hours,
            warmup: Duration::from_secs(config.schedule.warmup_secs),
            telemetry_interval: Duration::from_secs(config.schedule.telemetry_interval_secs),
            aqi_interval: Duration::from_secs(config.schedule.aqi_interval_secs),
            retry: config.retry_policy(),
            tick_interval: Duration::from_millis(config.schedule.tick_interval_ms),
            publish_timeout: Duration::from_secs(config.resilience.publish_timeout_secs),
            restart_threshold: config.resilience.restart_threshold,
            restart_cooldown: Duration::from_secs(config.resilience.restart_cooldown_secs),
        }
    }
}

/// Everything a node is assembled from after startup
pub struct NodeParts<C, T> {
    pub clock: C,
    pub sensors: SensorSuite,
    pub transport: T,
    pub indicator: Box<dyn StatusIndicator>,
    pub calibration: CalibrationLifecycle,
    pub aqi_log: Option<AqiLog>,
    pub ip_address: String,
}

pub struct Node<C: Clock, T: Transport> {
    settings: NodeSettings,
    clock: C,
    sensors: SensorSuite,
    publisher: Publisher<T>,
    indicator: Box<dyn StatusIndicator>,
    aqi_log: Option<AqiLog>,
    scheduler: PublishScheduler,
    restart: RestartPolicy,
    calibration: CalibrationLifecycle,
    running_since: String,
    ip_address: String,
}

impl<C: Clock, T: Transport> Node<C, T> {
    /// Build a node whose first publishes fall one warm-up after now
    pub fn new(settings: NodeSettings, parts: NodeParts<C, T>) -> Self {
        let now = parts.clock.now();
        let schedule = ScheduleState::starting_at(
            now,
            settings.warmup,
            settings.telemetry_interval,
            settings.aqi_interval,
        );

        Self {
            scheduler: PublishScheduler::new(schedule, settings.retry),
            restart: RestartPolicy::new(settings.restart_threshold),
            publisher: Publisher::new(parts.transport, settings.publish_timeout),
            running_since: format_local(now, settings.timezone_offset_hours),
            clock: parts.clock,
            sensors: parts.sensors,
            indicator: parts.indicator,
            aqi_log: parts.aqi_log,
            calibration: parts.calibration,
            ip_address: parts.ip_address,
            settings,
        }
    }

    pub fn scheduler(&self) -> &PublishScheduler {
        &self.scheduler
    }

    pub fn restart_policy(&self) -> &RestartPolicy {
        &self.restart
    }

    pub fn calibration(&self) -> &CalibrationLifecycle {
        &self.calibration
    }
}

/// Address of the interface that routes to `host`, without sending anything
pub fn local_ip_address(host: &str, port: u16) -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect((host, port)).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        let config = NodeConfig::default();
        let settings = NodeSettings::from_config(&config);

        assert_eq!(settings.telemetry_topic, config.telemetry_topic());
        assert_eq!(settings.aqi_topic, config.aqi_topic());
        assert_eq!(settings.telemetry_interval, Duration::from_secs(1800));
        assert_eq!(settings.aqi_interval, Duration::from_secs(300));
        assert_eq!(settings.warmup, Duration::from_secs(120));
        assert_eq!(settings.restart_threshold, 5);
        assert_eq!(settings.restart_cooldown, Duration::from_secs(10));
        assert_eq!(settings.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_local_ip_for_loopback() {
        assert_eq!(local_ip_address("127.0.0.1", 1883).as_deref(), Some("127.0.0.1"));
    }
}
