//! Pin assignment and peripheral bring-up for the logger board.
//!
//! | Function            | Pin(s)                         |
//! |---------------------|--------------------------------|
//! | DHT22 room / wall   | GPIO16 / GPIO17                |
//! | DHT22 ext / ceiling | GPIO33 / GPIO26                |
//! | I2C (CCS811, OLED)  | SDA GPIO21, SCL GPIO22         |
//! | SD card (SPI)       | SCK 18, MOSI 23, MISO 19, CS 5 |
//! | Error LED           | GPIO2                          |
//! | Screen button       | GPIO27, active high            |

use embassy_executor::Spawner;
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use esp_hal::gpio::{AnyPin, Flex, Level, Output, OutputConfig};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::peripherals::{
    GPIO2, GPIO5, GPIO18, GPIO19, GPIO21, GPIO22, GPIO23, I2C0, SPI2, WIFI,
};
use esp_hal::rtc_cntl::Rtc;
use esp_hal::spi::Mode as SpiMode;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::{Async, Blocking};
use log::info;
use meteo_core::config::NetworkConfig;
use meteo_core::sample::LOCATIONS;
use meteo_core::sensors::Ccs811;
use meteo_core::wake::{Board, Devices};
use static_cell::StaticCell;

use crate::async_i2c_bus::{self, AsyncI2cDevice, SharedBus};
use crate::climate::Probe;
use crate::led::LedIndicator;
use crate::oled::OledPanel;
use crate::rtc_clock::RtcClock;
use crate::sd_storage::SdStorage;
use crate::wifi_clock::WifiClock;

/// Batch length: 72 samples at a 15 s cadence is 18 minutes per file.
pub const BATCH_LEN: usize = 72;

/// Network settings baked in at build time from `.env`.
pub const NETWORK: NetworkConfig<'static> = NetworkConfig {
    ssid: match option_env!("METEO_WIFI_SSID") {
        Some(ssid) => ssid,
        None => "",
    },
    password: match option_env!("METEO_WIFI_PASS") {
        Some(password) => password,
        None => "",
    },
    ntp_server: match option_env!("METEO_NTP_SERVER") {
        Some(server) => server,
        None => "pool.ntp.org",
    },
};

pub type I2cBus = I2c<'static, Async>;
pub type SharedI2c = AsyncI2cDevice<'static, I2cBus>;
pub type SdSpi = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, NoDelay>;

pub struct LoggerBoard;

impl Board for LoggerBoard {
    type Clock = RtcClock;
    type Delay = embassy_time::Delay;
    type Climate = Probe;
    type AirQuality = Ccs811<SharedI2c, embassy_time::Delay>;
    type Storage = SdStorage<SdSpi, embassy_time::Delay>;
    type Network = WifiClock;
    type Panel = OledPanel<SharedI2c>;
    type Indicator = LedIndicator<GPIO2<'static>>;
}

/// Everything [`bring_up`] takes ownership of.
pub struct BoardPeripherals {
    pub rtc: Rtc<'static>,
    /// In [`meteo_core::sample::Location`] order.
    pub dht: [AnyPin<'static>; LOCATIONS],
    pub i2c: I2C0<'static>,
    pub sda: GPIO21<'static>,
    pub scl: GPIO22<'static>,
    pub spi: SPI2<'static>,
    pub sck: GPIO18<'static>,
    pub mosi: GPIO23<'static>,
    pub miso: GPIO19<'static>,
    pub sd_cs: GPIO5<'static>,
    pub led: GPIO2<'static>,
    pub wifi: WIFI<'static>,
}

pub fn create_i2c_bus(i2c0: I2C0<'static>, sda: GPIO21<'static>, scl: GPIO22<'static>) -> I2cBus {
    // The CCS811 stretches the clock; stay at standard mode.
    I2c::new(i2c0, I2cConfig::default().with_frequency(Rate::from_khz(100)))
        .expect("Failed to configure I2C")
        .with_sda(sda)
        .with_scl(scl)
        .into_async()
}

pub fn create_sd_spi(
    spi: SPI2<'static>,
    sck: GPIO18<'static>,
    mosi: GPIO23<'static>,
    miso: GPIO19<'static>,
    cs: GPIO5<'static>,
) -> SdSpi {
    let bus = Spi::new(
        spi,
        SpiConfig::default()
            .with_frequency(Rate::from_khz(400))
            .with_mode(SpiMode::_0),
    )
    .expect("Failed to configure SPI")
    .with_sck(sck)
    .with_mosi(mosi)
    .with_miso(miso);
    let cs = Output::new(cs, Level::High, OutputConfig::default());
    ExclusiveDevice::new_no_delay(bus, cs).unwrap_or_else(|never| match never {})
}

/// Build the devices of one wake. `led_level` is the level the error LED
/// had when the chip went to sleep.
pub fn bring_up(
    p: BoardPeripherals,
    spawner: Spawner,
    seed: u64,
    led_level: bool,
) -> Devices<LoggerBoard> {
    static I2C0_BUS: StaticCell<SharedBus<I2cBus>> = StaticCell::new();
    let [for_ccs811, for_oled] = async_i2c_bus::share(&I2C0_BUS, create_i2c_bus(p.i2c, p.sda, p.scl));

    let sd_spi = create_sd_spi(p.spi, p.sck, p.mosi, p.miso, p.sd_cs);

    // SAFETY: the stolen handle only toggles the RTC pad hold of the pin
    // that `led` drives; both stay inside the indicator.
    let led_pad = unsafe { GPIO2::steal() };
    let led = Output::new(p.led, Level::from(led_level), OutputConfig::default());

    info!("Board peripherals configured");

    Devices {
        clock: RtcClock::new(p.rtc),
        delay: embassy_time::Delay,
        climate: p.dht.map(|pin| Probe::new(Flex::new(pin))),
        air_quality: Ccs811::new(for_ccs811, embassy_time::Delay),
        storage: SdStorage::new(sd_spi, embassy_time::Delay),
        network: WifiClock::new(NETWORK, spawner, p.wifi, seed),
        panel: OledPanel::new(for_oled),
        indicator: LedIndicator::new(led, led_pad),
    }
}
