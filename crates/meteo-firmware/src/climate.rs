//! DHT22 probes on plain GPIO.

use esp_hal::delay::Delay;
use esp_hal::gpio::{DriveMode, Flex, InputConfig, OutputConfig, Pull};
use meteo_core::sample::Climate;
use meteo_core::sensors::Dht22;
use meteo_core::sensors::{ClimateSensor, SensorError};

/// A DHT22 read with interrupts masked.
///
/// The bit timing is measured by polling, and an interrupt landing in the
/// middle of a pulse stretches it enough to flip the bit.
pub struct Probe {
    dht: Dht22<Flex<'static>, Delay>,
}

impl Probe {
    /// Configure `pin` as an open-drain line with the pull-up enabled.
    pub fn new(mut pin: Flex<'static>) -> Self {
        pin.apply_input_config(&InputConfig::default().with_pull(Pull::Up));
        pin.apply_output_config(
            &OutputConfig::default()
                .with_drive_mode(DriveMode::OpenDrain)
                .with_pull(Pull::Up),
        );
        pin.set_high();
        pin.set_input_enable(true);
        pin.set_output_enable(true);

        Self {
            dht: Dht22::new(pin, Delay::new()),
        }
    }
}

impl ClimateSensor for Probe {
    async fn read(&mut self) -> Result<Climate, SensorError> {
        critical_section::with(|_| self.dht.read_blocking())
    }
}
