use core::time::Duration;

use crate::clock_sync::RetryPolicy;
use crate::sensors::DriveMode;

/// Fixed timing and retry parameters of the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Time between two measurement cycles.
    pub cadence: Duration,
    /// A button wake closer than this to the previous accepted press is a bounce.
    pub debounce: Duration,
    /// Retry budget for network time synchronization.
    pub sync_retry: RetryPolicy,
    /// Measurement mode the air-quality sensor is started in on cold boot.
    pub air_quality_mode: DriveMode,
}

impl LoggerConfig {
    pub const DEFAULT: LoggerConfig = LoggerConfig {
        cadence: Duration::from_secs(15),
        debounce: Duration::from_millis(1000),
        sync_retry: RetryPolicy::NETWORK,
        air_quality_mode: DriveMode::Every10s,
    };
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Config<'a> {
    pub network: NetworkConfig<'a>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    /// Host name of the SNTP server queried for wall-clock time.
    pub ntp_server: &'a str,
}

impl NetworkConfig<'_> {
    /// Without credentials there is nothing to connect to.
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }
}
