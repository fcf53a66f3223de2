//! Node configuration
//!
//! Every section has working defaults; a TOML file only needs the values
//! that differ. MQTT credentials are read from the environment.

use anyhow::{Context, Result};
use ivy_shared::{timing, Baseline, RetryPolicy};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the config file when no argument is given
pub const CONFIG_ENV: &str = "IVY_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub device: DeviceConfig,
    pub mqtt: MqttConfig,
    pub schedule: ScheduleConfig,
    pub resilience: ResilienceConfig,
    pub calibration: CalibrationConfig,
    pub time_sync: TimeSyncConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Plant identifier, used in topic names
    pub plant_name: String,
    /// Fixed UTC offset in hours for human-readable timestamps
    pub timezone_offset_hours: i32,
    /// Overrides the detected IP address reported in telemetry
    pub ip_address: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            plant_name: "englishivy_70da9e".into(),
            timezone_offset_hours: -7,
            ip_address: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_topic: String,
    pub keep_alive_secs: u64,
    /// Bound on each wait for a broker acknowledgement
    pub ack_timeout_secs: u64,
    /// How long `loop_once` listens for inbound messages
    pub loop_window_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 1883,
            client_id: "ivy-node".into(),
            username: None,
            password: None,
            base_topic: "mac2010/circuitpython/plants".into(),
            keep_alive_secs: 30,
            ack_timeout_secs: 5,
            loop_window_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub telemetry_interval_secs: u64,
    pub aqi_interval_secs: u64,
    pub warmup_secs: u64,
    pub short_retry_delay_secs: u64,
    pub escalation_threshold: u32,
    pub tick_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            telemetry_interval_secs: timing::TELEMETRY_INTERVAL_SECS,
            aqi_interval_secs: timing::AQI_INTERVAL_SECS,
            warmup_secs: timing::WARMUP_SECS,
            short_retry_delay_secs: timing::SHORT_RETRY_DELAY_SECS,
            escalation_threshold: timing::RETRY_ESCALATION_THRESHOLD,
            tick_interval_ms: timing::TICK_INTERVAL_MS,
        }
    }
}

/// How a full restart is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartMode {
    /// Drop all state and start again inside the same process
    #[default]
    InProcess,
    /// Exit with a non-zero status and leave the restart to the supervisor
    Exit,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub restart_threshold: u32,
    pub restart_cooldown_secs: u64,
    pub publish_timeout_secs: u64,
    pub restart_mode: RestartMode,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            restart_threshold: timing::RESTART_THRESHOLD,
            restart_cooldown_secs: timing::RESTART_COOLDOWN_SECS,
            publish_timeout_secs: 15,
            restart_mode: RestartMode::InProcess,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Start a fresh self-calibration window instead of fetching a baseline
    pub fresh: bool,
    pub window_secs: u64,
    pub fallback_eco2: u16,
    pub fallback_tvoc: u16,
    pub bootstrap_attempts: u32,
    pub bootstrap_retry_delay_secs: u64,
    /// Topic carrying the remote baseline; the telemetry topic when unset
    pub baseline_topic: Option<String>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            fresh: true,
            window_secs: timing::CALIBRATION_WINDOW_SECS,
            fallback_eco2: timing::FALLBACK_BASELINE.0,
            fallback_tvoc: timing::FALLBACK_BASELINE.1,
            bootstrap_attempts: timing::BOOTSTRAP_ATTEMPTS,
            bootstrap_retry_delay_secs: timing::BOOTSTRAP_RETRY_DELAY_SECS,
            baseline_topic: None,
        }
    }
}

/// What to do when network time cannot be obtained at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeSyncFailure {
    /// Restart from scratch
    #[default]
    Restart,
    /// Carry on with the unsynchronised system clock
    Proceed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeSyncConfig {
    pub enabled: bool,
    pub server: String,
    pub attempts: u32,
    pub retry_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub on_failure: TimeSyncFailure,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: "0.pool.ntp.org:123".into(),
            attempts: 6,
            retry_delay_secs: 10,
            request_timeout_secs: 5,
            on_failure: TimeSyncFailure::Restart,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub aqi_log_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            aqi_log_path: "data/aqi.jsonl".into(),
        }
    }
}

impl NodeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load from argv[1], then `IVY_CONFIG`, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var(CONFIG_ENV).ok());

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Pick up broker credentials from the environment
    pub fn apply_env(&mut self) {
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
    }

    pub fn telemetry_topic(&self) -> String {
        format!("{}/{}", self.mqtt.base_topic, self.device.plant_name)
    }

    pub fn aqi_topic(&self) -> String {
        format!("{}/sgp30", self.telemetry_topic())
    }

    pub fn baseline_topic(&self) -> String {
        self.calibration
            .baseline_topic
            .clone()
            .unwrap_or_else(|| self.telemetry_topic())
    }

    pub fn fallback_baseline(&self) -> Baseline {
        Baseline::new(self.calibration.fallback_eco2, self.calibration.fallback_tvoc)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            short_retry_delay: Duration::from_secs(self.schedule.short_retry_delay_secs),
            escalation_threshold: self.schedule.escalation_threshold,
        }
    }
}
