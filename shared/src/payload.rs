//! Sensor readings and the JSON payloads published to the broker
//!
//! Field names on the payload structs are the wire contract consumed by
//! dashboards and must not change.

use crate::calibration::CalibrationState;
use crate::schedule::{PublishTarget, ScheduleState};
use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// TSL2591 light reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightReading {
    pub full_spectrum: u32,
    pub visible: u32,
    pub infrared: u16,
    pub lux: f64,
}

/// Seesaw capacitive soil reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilReading {
    #[serde(rename = "soil_moisture")]
    pub moisture: u16,
    #[serde(rename = "soil_temp")]
    pub temperature: f64,
}

/// SHT4x temperature/humidity reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientReading {
    pub temperature: f64,
    pub relative_humidity: f64,
}

/// SGP30 air-quality reading, including the driver's live baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirQualityReading {
    pub eco2: u16,
    pub tvoc: u16,
    pub baseline_eco2: u16,
    pub baseline_tvoc: u16,
}

/// One tick's worth of readings from every sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readings {
    pub light: LightReading,
    pub soil: SoilReading,
    pub ambient: AmbientReading,
    pub air: AirQualityReading,
}

/// `sgp30` block of the telemetry payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sgp30Block {
    #[serde(rename = "baseline_TVOC")]
    pub baseline_tvoc: u16,
    #[serde(rename = "baseline_eCO2")]
    pub baseline_eco2: u16,
    #[serde(rename = "eCO2")]
    pub eco2: u16,
    #[serde(rename = "TVOC")]
    pub tvoc: u16,
    pub using_fallback: bool,
}

/// Node-level facts that do not come from sensors
#[derive(Debug, Clone)]
pub struct NodeInfo<'a> {
    pub ip_address: &'a str,
    pub running_since: &'a str,
    pub now_time: &'a str,
    pub mqtt_fail_count: u32,
}

/// Routine telemetry payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    pub ip_address: String,
    pub mqtt_fail_count: u32,
    pub running_since: String,
    pub now_time: String,
    #[serde(rename = "UTC_time")]
    pub utc_time: Timestamp,
    pub calibrating_state: bool,
    pub calib_remaining_time: i64,
    pub update_remaining_time: i64,
    pub tsl2591: LightReading,
    pub soil_sensor: SoilReading,
    pub ambient: AmbientReading,
    pub sgp30: Sgp30Block,
}

impl TelemetryPayload {
    /// Snapshot the current readings, schedule and calibration state
    pub fn assemble(
        info: &NodeInfo<'_>,
        readings: &Readings,
        schedule: &ScheduleState,
        calibration: &CalibrationState,
        now: Timestamp,
    ) -> Self {
        Self {
            ip_address: info.ip_address.to_string(),
            mqtt_fail_count: info.mqtt_fail_count,
            running_since: info.running_since.to_string(),
            now_time: info.now_time.to_string(),
            utc_time: now,
            calibrating_state: calibration.is_calibrating(),
            calib_remaining_time: calibration.remaining(now),
            update_remaining_time: schedule.remaining(PublishTarget::Telemetry, now),
            tsl2591: readings.light,
            soil_sensor: readings.soil,
            ambient: readings.ambient,
            sgp30: Sgp30Block {
                baseline_tvoc: readings.air.baseline_tvoc,
                baseline_eco2: readings.air.baseline_eco2,
                eco2: readings.air.eco2,
                tvoc: readings.air.tvoc,
                using_fallback: calibration.using_fallback(),
            },
        }
    }
}

/// Air-quality payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AqiPayload {
    #[serde(rename = "UTC_time")]
    pub utc_time: Timestamp,
    pub calibrating_state: bool,
    #[serde(rename = "baseline_TVOC")]
    pub baseline_tvoc: u16,
    #[serde(rename = "baseline_eCO2")]
    pub baseline_eco2: u16,
    #[serde(rename = "eCO2")]
    pub eco2: u16,
    #[serde(rename = "TVOC")]
    pub tvoc: u16,
    pub using_fallback: bool,
}

impl AqiPayload {
    pub fn assemble(air: &AirQualityReading, calibration: &CalibrationState, now: Timestamp) -> Self {
        Self {
            utc_time: now,
            calibrating_state: calibration.is_calibrating(),
            baseline_tvoc: air.baseline_tvoc,
            baseline_eco2: air.baseline_eco2,
            eco2: air.eco2,
            tvoc: air.tvoc,
            using_fallback: calibration.using_fallback(),
        }
    }
}
