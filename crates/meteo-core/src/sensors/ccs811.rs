//! CCS811 eCO2/TVOC sensor over async I2C.
//!
//! After power-up the sensor sits in its boot loader. `start` checks the
//! hardware id, launches the application firmware and selects a drive mode;
//! from then on the sensor measures on its own and `read` polls the
//! algorithm result registers.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use log::{debug, error, info};

use super::{AirQualityReading, AirQualitySensor, DriveMode, SensorError};
use crate::sample::AirQuality;

const SENSOR: &str = "CCS811";

/// Default address with the ADDR pin low.
pub const DEFAULT_ADDRESS: u8 = 0x5A;

const REG_STATUS: u8 = 0x00;
const REG_MEAS_MODE: u8 = 0x01;
const REG_ALG_RESULT_DATA: u8 = 0x02;
const REG_HW_ID: u8 = 0x20;
const REG_ERROR_ID: u8 = 0xE0;
const REG_APP_START: u8 = 0xF4;

const HW_ID: u8 = 0x81;

const STATUS_ERROR: u8 = 0x01;
const STATUS_DATA_READY: u8 = 0x08;
const STATUS_APP_VALID: u8 = 0x10;
const STATUS_FW_MODE: u8 = 0x80;

/// Boot loader to application transition time.
const APP_START_DELAY_MS: u32 = 2;

impl DriveMode {
    /// Value of the DRIVE_MODE field in MEAS_MODE.
    const fn meas_mode(self) -> u8 {
        let mode = match self {
            DriveMode::Idle => 0,
            DriveMode::EverySecond => 1,
            DriveMode::Every10s => 2,
            DriveMode::Every60s => 3,
        };
        mode << 4
    }
}

pub struct Ccs811<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    last: AirQuality,
}

impl<I: I2c, D: DelayNs> Ccs811<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            last: AirQuality::default(),
        }
    }

    async fn read_register<const LEN: usize>(
        &mut self,
        register: u8,
        operation: &'static str,
    ) -> Result<[u8; LEN], SensorError> {
        let mut buf = [0u8; LEN];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .await
            .map_err(|e| {
                error!("{} {} failed: {:?}", SENSOR, operation, e);
                SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation,
                    details: "I2C communication error",
                }
            })?;
        Ok(buf)
    }

    async fn write(&mut self, bytes: &[u8], operation: &'static str) -> Result<(), SensorError> {
        self.i2c.write(self.address, bytes).await.map_err(|e| {
            error!("{} {} failed: {:?}", SENSOR, operation, e);
            SensorError::ReadFailed {
                sensor: SENSOR,
                operation,
                details: "I2C communication error",
            }
        })
    }

    async fn status(&mut self) -> Result<u8, SensorError> {
        let [status] = self.read_register::<1>(REG_STATUS, "read status").await?;
        Ok(status)
    }

    async fn error_code(&mut self) -> Result<u8, SensorError> {
        let [code] = self.read_register::<1>(REG_ERROR_ID, "read error id").await?;
        Ok(code)
    }
}

impl<I: I2c, D: DelayNs> AirQualitySensor for Ccs811<I, D> {
    async fn start(&mut self, mode: DriveMode) -> Result<(), SensorError> {
        let [hw_id] = self.read_register::<1>(REG_HW_ID, "read hardware id").await?;
        if hw_id != HW_ID {
            error!("{} unexpected hardware id {:#04x}", SENSOR, hw_id);
            return Err(SensorError::InitializationFailed {
                sensor: SENSOR,
                details: "unexpected hardware id",
            });
        }

        let status = self.status().await?;
        if status & STATUS_FW_MODE == 0 {
            if status & STATUS_APP_VALID == 0 {
                return Err(SensorError::InitializationFailed {
                    sensor: SENSOR,
                    details: "no valid application firmware",
                });
            }
            self.write(&[REG_APP_START], "start application").await?;
            self.delay.delay_ms(APP_START_DELAY_MS).await;

            if self.status().await? & STATUS_FW_MODE == 0 {
                return Err(SensorError::InitializationFailed {
                    sensor: SENSOR,
                    details: "application firmware did not start",
                });
            }
        }

        self.write(&[REG_MEAS_MODE, mode.meas_mode()], "set drive mode")
            .await?;
        info!("{} started in {:?}", SENSOR, mode);
        Ok(())
    }

    async fn read(&mut self) -> Result<AirQualityReading, SensorError> {
        let data = self
            .read_register::<5>(REG_ALG_RESULT_DATA, "read algorithm results")
            .await?;
        let status = data[4];

        if status & STATUS_ERROR != 0 {
            let code = self.error_code().await?;
            error!("{} reported error {:#04x}", SENSOR, code);
            return Err(SensorError::Status {
                sensor: SENSOR,
                code,
            });
        }
        if status & STATUS_FW_MODE == 0 {
            error!("{} is in boot mode (status {:#04x})", SENSOR, status);
            return Err(SensorError::ReadFailed {
                sensor: SENSOR,
                operation: "read algorithm results",
                details: "sensor not in application mode",
            });
        }

        if status & STATUS_DATA_READY == 0 {
            debug!("{} has no new data", SENSOR);
            return Ok(AirQualityReading {
                air: self.last,
                fresh: false,
            });
        }

        self.last = AirQuality {
            eco2_ppm: u16::from_be_bytes([data[0], data[1]]),
            tvoc_ppb: u16::from_be_bytes([data[2], data[3]]),
        };
        Ok(AirQualityReading {
            air: self.last,
            fresh: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use embedded_hal_async::i2c::{ErrorKind, ErrorType, Operation};

    /// Register file of a simulated CCS811.
    struct FakeBus {
        hw_id: u8,
        status: u8,
        results: [u8; 4],
        error_id: u8,
        meas_mode: Option<u8>,
        writes: Vec<Vec<u8>>,
        pointer: u8,
        fail: bool,
    }

    impl FakeBus {
        fn booted() -> Self {
            Self {
                hw_id: HW_ID,
                status: STATUS_APP_VALID,
                results: [0; 4],
                error_id: 0,
                meas_mode: None,
                writes: Vec::new(),
                pointer: 0,
                fail: false,
            }
        }

        fn register(&self, offset: usize) -> u8 {
            match (self.pointer, offset) {
                (REG_HW_ID, 0) => self.hw_id,
                (REG_STATUS, 0) => self.status,
                (REG_ERROR_ID, 0) => self.error_id,
                (REG_ALG_RESULT_DATA, 0..4) => self.results[offset],
                (REG_ALG_RESULT_DATA, 4) => self.status,
                _ => 0,
            }
        }
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), ErrorKind> {
            if self.fail || address != DEFAULT_ADDRESS {
                return Err(ErrorKind::Other);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        let bytes: &[u8] = bytes;
                        self.pointer = bytes[0];
                        match bytes {
                            [REG_APP_START] => self.status |= STATUS_FW_MODE,
                            [REG_MEAS_MODE, mode] => self.meas_mode = Some(*mode),
                            _ => {}
                        }
                        self.writes.push(bytes.to_vec());
                    }
                    Operation::Read(buf) => {
                        for (i, b) in buf.iter_mut().enumerate() {
                            *b = self.register(i);
                        }
                    }
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_start_launches_app_and_sets_mode() {
        let mut sensor = Ccs811::new(FakeBus::booted(), NoDelay);
        embassy_futures::block_on(sensor.start(DriveMode::Every10s)).unwrap();
        assert_eq!(sensor.i2c.meas_mode, Some(0x20));
        assert!(sensor.i2c.writes.iter().any(|w| w[..] == [REG_APP_START]));
    }

    #[test]
    fn test_start_rejects_unknown_device() {
        let mut bus = FakeBus::booted();
        bus.hw_id = 0x42;
        let mut sensor = Ccs811::new(bus, NoDelay);
        let result = embassy_futures::block_on(sensor.start(DriveMode::Every10s));
        assert!(matches!(result, Err(SensorError::InitializationFailed { .. })));
    }

    #[test]
    fn test_read_fresh_and_stale() {
        let mut bus = FakeBus::booted();
        bus.status = STATUS_FW_MODE | STATUS_DATA_READY;
        bus.results = [0x01, 0x90, 0x00, 0x0C];
        let mut sensor = Ccs811::new(bus, NoDelay);

        let reading = embassy_futures::block_on(sensor.read()).unwrap();
        assert!(reading.fresh);
        assert_eq!(reading.air, AirQuality { eco2_ppm: 400, tvoc_ppb: 12 });

        sensor.i2c.status = STATUS_FW_MODE;
        sensor.i2c.results = [0; 4];
        let reading = embassy_futures::block_on(sensor.read()).unwrap();
        assert!(!reading.fresh);
        assert_eq!(reading.air.eco2_ppm, 400);
    }

    #[test]
    fn test_read_reports_error_id() {
        let mut bus = FakeBus::booted();
        bus.status = STATUS_FW_MODE | STATUS_ERROR;
        bus.error_id = 0x08;
        let mut sensor = Ccs811::new(bus, NoDelay);
        assert_eq!(
            embassy_futures::block_on(sensor.read()),
            Err(SensorError::Status {
                sensor: SENSOR,
                code: 0x08
            })
        );
    }

    #[test]
    fn test_bus_failure_is_read_error() {
        let mut bus = FakeBus::booted();
        bus.fail = true;
        let mut sensor = Ccs811::new(bus, NoDelay);
        assert!(matches!(
            embassy_futures::block_on(sensor.read()),
            Err(SensorError::ReadFailed { .. })
        ));
    }
}
