//! Reading every sensor once per measurement cycle.

use log::{debug, info, warn};

use crate::sample::{AirQuality, Climate, LOCATIONS, Location, Sample};
use crate::sensors::{AirQualitySensor, ClimateSensor};

/// Which reads of a cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplingReport {
    failed_locations: u8,
    air_quality_failed: bool,
}

impl SamplingReport {
    pub fn climate_failed(&self, location: Location) -> bool {
        self.failed_locations & (1 << location.index()) != 0
    }

    pub fn failed_locations(&self) -> impl Iterator<Item = Location> + '_ {
        Location::ALL
            .into_iter()
            .filter(|location| self.climate_failed(*location))
    }

    pub fn air_quality_failed(&self) -> bool {
        self.air_quality_failed
    }

    pub fn all_ok(&self) -> bool {
        self.failed_locations == 0 && !self.air_quality_failed
    }
}

/// Read all four climate sensors and the air-quality sensor.
///
/// A reading is stored as the sensor returned it, so a half-NaN reading keeps
/// its valid value but still marks the location failed. A read error stores
/// NaN for both values and a failed air-quality read stores zeros. Every
/// sensor is read regardless of earlier failures.
pub async fn take_sample<C, A>(
    climate_sensors: &mut [C; LOCATIONS],
    air_quality: &mut A,
) -> (Sample, SamplingReport)
where
    C: ClimateSensor,
    A: AirQualitySensor,
{
    let mut sample = Sample::EMPTY;
    let mut report = SamplingReport::default();

    for (location, sensor) in Location::ALL.into_iter().zip(climate_sensors.iter_mut()) {
        let reading = match sensor.read().await {
            Ok(reading) => {
                if !reading.is_valid() {
                    warn!("{} sensor returned NaN: {:?}", location.label(), reading);
                }
                reading
            }
            Err(e) => {
                warn!("{} sensor read failed: {}", location.label(), e);
                Climate::MISSING
            }
        };
        if !reading.is_valid() {
            report.failed_locations |= 1 << location.index();
        }
        sample.climate[location.index()] = reading;
    }

    sample.air = match air_quality.read().await {
        Ok(reading) => {
            if !reading.fresh {
                info!("Air-quality sensor has no new data, keeping last values");
            }
            reading.air
        }
        Err(e) => {
            warn!("Air-quality sensor read failed: {}", e);
            report.air_quality_failed = true;
            AirQuality::default()
        }
    };

    debug!("Sampled {:?}", sample);
    (sample, report)
}
