//! DHT22 (AM2302) temperature/humidity probes.
//!
//! Thin wrapper over the `embedded-dht-rs` driver that maps its readings and
//! errors onto the logger's types.

use core::fmt::Debug;

use embedded_dht_rs::SensorError as DhtError;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, error};

use super::{ClimateSensor, SensorError};
use crate::sample::Climate;

const SENSOR: &str = "DHT22";

/// Map a driver error to a [`SensorError`].
pub fn map_error<E: Debug>(error: DhtError<E>) -> SensorError {
    match error {
        DhtError::ChecksumMismatch => SensorError::Checksum { sensor: SENSOR },
        DhtError::Timeout => SensorError::Timeout {
            sensor: SENSOR,
            operation: "wait for response",
        },
        #[allow(unreachable_patterns)]
        other => {
            error!("{} pin failure: {:?}", SENSOR, other);
            SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "read",
                details: "GPIO error",
            }
        }
    }
}

/// A DHT22 on an open-drain pin with an external pull-up.
pub struct Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    driver: embedded_dht_rs::dht22::Dht22<P, D>,
}

impl<P, D> Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
    P::Error: Debug,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self {
            driver: embedded_dht_rs::dht22::Dht22::new(pin, delay),
        }
    }

    /// Run one transaction without yielding. The firmware calls this with
    /// interrupts masked.
    pub fn read_blocking(&mut self) -> Result<Climate, SensorError> {
        let reading = self.driver.read().map_err(map_error)?;
        debug!(
            "{}: {} C, {} %",
            SENSOR, reading.temperature, reading.humidity
        );
        Ok(Climate::new(reading.temperature, reading.humidity))
    }
}

impl<P, D> ClimateSensor for Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
    P::Error: Debug,
{
    async fn read(&mut self) -> Result<Climate, SensorError> {
        self.read_blocking()
    }
}
