//! Sensor Façade
//!
//! One trait per sensor with a uniform `read`, plus the air-quality
//! sensor's baseline seed. Drivers hold no scheduling state.

mod simulated;

pub use simulated::simulated_suite;

use crate::error::SensorError;
use ivy_shared::{AirQualityReading, AmbientReading, Baseline, LightReading, Readings, SoilReading};

pub trait LightSensor: Send {
    fn read(&mut self) -> Result<LightReading, SensorError>;
}

pub trait SoilSensor: Send {
    fn read(&mut self) -> Result<SoilReading, SensorError>;
}

pub trait AmbientSensor: Send {
    fn read(&mut self) -> Result<AmbientReading, SensorError>;
}

pub trait AirQualitySensor: Send {
    /// Read eCO2/TVOC, compensating with the current ambient conditions
    fn read(&mut self, ambient: &AmbientReading) -> Result<AirQualityReading, SensorError>;

    /// Seed the sensor's internal baseline
    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError>;
}

/// All sensors on the node
pub struct SensorSuite {
    pub light: Box<dyn LightSensor>,
    pub soil: Box<dyn SoilSensor>,
    pub ambient: Box<dyn AmbientSensor>,
    pub air: Box<dyn AirQualitySensor>,
}

impl SensorSuite {
    /// Read every sensor once. The first failure aborts the whole set.
    pub fn read_all(&mut self) -> Result<Readings, SensorError> {
        let light = self.light.read()?;
        let soil = self.soil.read()?;
        let ambient = self.ambient.read()?;
        let air = self.air.read(&ambient)?;

        Ok(Readings {
            light,
            soil,
            ambient,
            air,
        })
    }

    pub fn seed_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError> {
        self.air.set_baseline(baseline)
    }
}

/// In-memory sensors for driver tests
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub struct FakeState {
        pub seeded: Vec<Baseline>,
        pub fail_light: bool,
    }

    pub type Shared = Arc<Mutex<FakeState>>;

    struct Light(Shared);
    struct Soil;
    struct Ambient;
    struct Air(Shared);

    impl LightSensor for Light {
        fn read(&mut self) -> Result<LightReading, SensorError> {
            if self.0.lock().unwrap().fail_light {
                return Err(SensorError::ReadFailed {
                    sensor: "tsl2591",
                    reason: "i2c nack".into(),
                });
            }
            Ok(LightReading {
                full_spectrum: 1000,
                visible: 900,
                infrared: 100,
                lux: 42.5,
            })
        }
    }

    impl SoilSensor for Soil {
        fn read(&mut self) -> Result<SoilReading, SensorError> {
            Ok(SoilReading {
                moisture: 600,
                temperature: 20.5,
            })
        }
    }

    impl AmbientSensor for Ambient {
        fn read(&mut self) -> Result<AmbientReading, SensorError> {
            Ok(AmbientReading {
                temperature: 22.0,
                relative_humidity: 45.0,
            })
        }
    }

    impl AirQualitySensor for Air {
        fn read(&mut self, _ambient: &AmbientReading) -> Result<AirQualityReading, SensorError> {
            let baseline = self
                .0
                .lock()
                .unwrap()
                .seeded
                .last()
                .copied()
                .unwrap_or(Baseline::new(0, 0));
            Ok(AirQualityReading {
                eco2: 400,
                tvoc: 3,
                baseline_eco2: baseline.eco2,
                baseline_tvoc: baseline.tvoc,
            })
        }

        fn set_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError> {
            self.0.lock().unwrap().seeded.push(baseline);
            Ok(())
        }
    }

    pub fn suite() -> (SensorSuite, Shared) {
        let state = Shared::default();
        let suite = SensorSuite {
            light: Box::new(Light(state.clone())),
            soil: Box::new(Soil),
            ambient: Box::new(Ambient),
            air: Box::new(Air(state.clone())),
        };
        (suite, state)
    }
}
