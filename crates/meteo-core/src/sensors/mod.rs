//! Sensor traits and the protocol drivers for the logger's sensors.

pub mod ccs811;
pub mod dht22;

pub use ccs811::Ccs811;
pub use dht22::Dht22;

use thiserror_no_std::Error;

use crate::sample::{AirQuality, Climate};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: timed out waiting to {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor}: checksum mismatch")]
    Checksum { sensor: &'static str },
    #[error("{sensor}: device reported error code {code:#04x}")]
    Status { sensor: &'static str, code: u8 },
}

/// A combined temperature and humidity sensor.
pub trait ClimateSensor {
    /// Take one reading. A NaN in the result counts as a failed read.
    fn read(&mut self) -> impl Future<Output = Result<Climate, SensorError>>;
}

/// Measurement interval of an air-quality sensor running on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    Idle,
    EverySecond,
    Every10s,
    Every60s,
}

/// Result of polling the air-quality sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirQualityReading {
    pub air: AirQuality,
    /// `false` when the sensor had no new measurement since the last poll
    /// and `air` repeats the previous values.
    pub fresh: bool,
}

/// An eCO2/TVOC sensor that measures periodically in the background.
pub trait AirQualitySensor {
    /// (Re)initialize the sensor and start measuring in `mode`.
    fn start(&mut self, mode: DriveMode) -> impl Future<Output = Result<(), SensorError>>;

    fn read(&mut self) -> impl Future<Output = Result<AirQualityReading, SensorError>>;
}
