//! Simulated sensor backend for running the node without hardware

use super::{AirQualitySensor, AmbientSensor, LightSensor, SensorSuite, SoilSensor};
use crate::error::SensorError;
use ivy_shared::{AirQualityReading, AmbientReading, Baseline, LightReading, SoilReading};
use rand::Rng;

struct SimLight;

impl LightSensor for SimLight {
    fn read(&mut self) -> Result<LightReading, SensorError> {
        let mut rng = rand::thread_rng();
        let visible: u32 = rng.gen_range(20_000..60_000);
        let infrared: u16 = rng.gen_range(200..2_000);
        Ok(LightReading {
            full_spectrum: visible + infrared as u32,
            visible,
            infrared,
            lux: visible as f64 / 250.0,
        })
    }
}

struct SimSoil;

impl SoilSensor for SimSoil {
    fn read(&mut self) -> Result<SoilReading, SensorError> {
        let mut rng = rand::thread_rng();
        Ok(SoilReading {
            moisture: rng.gen_range(350..900),
            temperature: rng.gen_range(18.0..24.0),
        })
    }
}

struct SimAmbient;

impl AmbientSensor for SimAmbient {
    fn read(&mut self) -> Result<AmbientReading, SensorError> {
        let mut rng = rand::thread_rng();
        Ok(AmbientReading {
            temperature: rng.gen_range(19.0..26.0),
            relative_humidity: rng.gen_range(35.0..65.0),
        })
    }
}

struct SimAir {
    baseline: Baseline,
}

impl AirQualitySensor for SimAir {
    fn read(&mut self, ambient: &AmbientReading) -> Result<AirQualityReading, SensorError> {
        let mut rng = rand::thread_rng();
        // Damp TVOC as humidity rises, the way compensation pulls readings down
        let damping = 1.0 - (absolute_humidity(ambient) / 100.0).min(0.5);
        let tvoc = (rng.gen_range(0.0..60.0) * damping) as u16;
        Ok(AirQualityReading {
            eco2: 400 + rng.gen_range(0..200),
            tvoc,
            baseline_eco2: self.baseline.eco2,
            baseline_tvoc: self.baseline.tvoc,
        })
    }

    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError> {
        if baseline.eco2 == 0 || baseline.tvoc == 0 {
            return Err(SensorError::BaselineRejected {
                sensor: "sgp30",
                reason: format!("zero baseline {}", baseline),
            });
        }
        self.baseline = baseline;
        Ok(())
    }
}

/// Absolute humidity in g/m³ from temperature (°C) and relative humidity (%)
pub fn absolute_humidity(ambient: &AmbientReading) -> f64 {
    let t = ambient.temperature;
    let saturation = 6.112 * ((17.62 * t) / (243.12 + t)).exp();
    216.7 * (ambient.relative_humidity / 100.0 * saturation) / (273.15 + t)
}

pub fn simulated_suite() -> SensorSuite {
    SensorSuite {
        light: Box::new(SimLight),
        soil: Box::new(SimSoil),
        ambient: Box::new(SimAmbient),
        air: Box::new(SimAir {
            baseline: Baseline::new(35_000, 36_000),
        }),
    }
}
