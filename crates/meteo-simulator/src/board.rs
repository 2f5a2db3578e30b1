//! Virtual peripherals for running the logger on a desktop.
//!
//! All devices share one [`VirtualTime`], the time since the simulated board
//! was powered. Delays advance it instead of sleeping, so a day of wakes runs
//! in well under a second.

use std::cell::Cell;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::SimulatorDisplay;
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};
use meteo_core::clock::Clock;
use meteo_core::clock_sync::{NetworkClock, SyncError};
use meteo_core::display::framebuffer::FrameBuffer;
use meteo_core::display::{PANEL_HEIGHT_PX, PANEL_WIDTH_PX, Panel};
use meteo_core::indicator::Indicator;
use meteo_core::sample::{AirQuality, Climate, LOCATIONS, Location};
use meteo_core::sensors::{AirQualityReading, AirQualitySensor, ClimateSensor, DriveMode, SensorError};
use meteo_core::storage::{Storage, StorageError};
use meteo_core::wake::{Board, Devices};

/// Time since the simulated power-on, shared by every virtual device.
#[derive(Debug, Clone, Default)]
pub struct VirtualTime(Rc<Cell<Duration>>);

impl VirtualTime {
    pub fn get(&self) -> Duration {
        self.0.get()
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }

    pub fn advance_to(&self, at: Duration) {
        if at > self.get() {
            self.0.set(at);
        }
    }
}

/// RTC that starts at zero on power-on, like the real one.
pub struct SimClock {
    time: VirtualTime,
    offset: Duration,
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.time.get() + self.offset
    }

    fn set_unix_time(&mut self, since_epoch: Duration) {
        self.offset = since_epoch.saturating_sub(self.time.get());
    }
}

pub struct VirtualDelay(VirtualTime);

impl DelayNs for VirtualDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.advance(Duration::from_nanos(u64::from(ns)));
    }
}

/// Temperature and humidity following slow sinusoids, offset per location.
pub struct SyntheticClimate {
    location: Location,
    time: VirtualTime,
    faulty: bool,
}

impl ClimateSensor for SyntheticClimate {
    async fn read(&mut self) -> Result<Climate, SensorError> {
        if self.faulty {
            return Err(SensorError::Timeout {
                sensor: "DHT22",
                operation: "wait for response",
            });
        }
        let t = self.time.get().as_secs_f64();
        let phase = self.location.index() as f64;
        let base = match self.location {
            Location::Outside => 8.0,
            Location::Ceiling => 24.0,
            _ => 21.0,
        };
        let temperature = base + 3.0 * (t / 900.0 + phase).sin() + 0.4 * (t / 97.0).cos();
        let humidity = 50.0 + 12.0 * (t / 1_300.0 + phase).sin() + 2.0 * (t / 61.0).cos();
        Ok(Climate::new(temperature as f32, humidity as f32))
    }
}

/// An air-quality sensor with a fresh sinusoidal reading on every poll.
pub struct SyntheticAir {
    time: VirtualTime,
    mode: DriveMode,
}

impl AirQualitySensor for SyntheticAir {
    async fn start(&mut self, mode: DriveMode) -> Result<(), SensorError> {
        debug!("Air-quality sensor started in {:?}", mode);
        self.mode = mode;
        Ok(())
    }

    async fn read(&mut self) -> Result<AirQualityReading, SensorError> {
        if self.mode == DriveMode::Idle {
            return Err(SensorError::ReadFailed {
                sensor: "CCS811",
                operation: "read result",
                details: "not measuring",
            });
        }
        let t = self.time.get().as_secs_f64();
        let eco2 = 600.0 + 180.0 * (t / 1_800.0).sin() + 25.0 * (t / 41.0).cos();
        let tvoc = 30.0 + 20.0 * (t / 1_100.0).sin();
        Ok(AirQualityReading {
            air: AirQuality {
                eco2_ppm: eco2 as u16,
                tvoc_ppb: tvoc.max(0.0) as u16,
            },
            fresh: true,
        })
    }
}

/// Batch files as plain files in a host directory.
pub struct DirStorage {
    root: PathBuf,
    mounted: bool,
}

fn io_error(operation: &'static str) -> impl FnOnce(io::Error) -> StorageError {
    move |e| {
        warn!("{} failed: {}", operation, e);
        StorageError::Io {
            operation,
            details: "host I/O error",
        }
    }
}

impl DirStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            mounted: false,
        }
    }
}

impl Storage for DirStorage {
    fn mount(&mut self) -> Result<(), StorageError> {
        self.mounted = false;
        fs::create_dir_all(&self.root).map_err(|e| {
            warn!("Cannot create {}: {}", self.root.display(), e);
            StorageError::Mount("output directory unavailable")
        })?;
        self.mounted = true;
        Ok(())
    }

    fn list_files<F>(&mut self, prefix: &str, mut visit: F) -> Result<(), StorageError>
    where
        F: FnMut(&str),
    {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        for entry in fs::read_dir(&self.root).map_err(io_error("list directory"))? {
            let entry = entry.map_err(io_error("list directory"))?;
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) {
                    visit(name);
                }
            }
        }
        Ok(())
    }

    fn write_file(&mut self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        fs::write(self.root.join(name), contents).map_err(io_error("write file"))
    }
}

/// Wi-Fi that answers with the host's wall clock, or not at all.
pub struct SimNetwork {
    time: VirtualTime,
    /// Unix time at the simulated power-on.
    epoch_at_boot: Duration,
    online: bool,
}

impl NetworkClock for SimNetwork {
    async fn fetch_time(&mut self) -> Result<Duration, SyncError> {
        if self.online {
            Ok(self.epoch_at_boot + self.time.get())
        } else {
            Err(SyncError::NotConnected)
        }
    }

    async fn power_down(&mut self) {
        debug!("Radio off");
    }
}

/// The OLED as an in-memory display, printed to the terminal on request.
pub struct SimPanel {
    display: SimulatorDisplay<BinaryColor>,
    ascii: bool,
}

impl SimPanel {
    pub fn display(&self) -> &SimulatorDisplay<BinaryColor> {
        &self.display
    }

    fn print(&self) {
        if self.ascii {
            println!("{}", ascii_art(&self.display));
        }
    }
}

impl Panel for SimPanel {
    type Error = core::convert::Infallible;

    async fn show(&mut self, frame: &mut FrameBuffer) -> Result<(), Self::Error> {
        frame.flush(&mut self.display)?;
        self.print();
        Ok(())
    }

    async fn blank(&mut self) -> Result<(), Self::Error> {
        self.display.clear(BinaryColor::Off)?;
        self.print();
        Ok(())
    }
}

/// Two by two pixel blocks as one character each, framed.
pub fn ascii_art(display: &SimulatorDisplay<BinaryColor>) -> String {
    let width = PANEL_WIDTH_PX / 2;
    let border = format!("+{}+", "-".repeat(width as usize));
    let mut out = border.clone();
    for row in 0..PANEL_HEIGHT_PX / 2 {
        out.push_str("\n|");
        for col in 0..width {
            let lit = (0..2).any(|dy| {
                (0..2).any(|dx| {
                    let point = Point::new((col * 2 + dx) as i32, (row * 2 + dy) as i32);
                    display.get_pixel(point) == BinaryColor::On
                })
            });
            out.push(if lit { '#' } else { ' ' });
        }
        out.push('|');
    }
    out.push('\n');
    out.push_str(&border);
    out
}

/// The error LED, reported on every change.
#[derive(Default)]
pub struct SimLed {
    lit: bool,
}

impl SimLed {
    pub fn is_lit(&self) -> bool {
        self.lit
    }
}

impl Indicator for SimLed {
    fn set(&mut self, lit: bool) {
        if lit != self.lit {
            info!("Error LED {}", if lit { "on" } else { "off" });
        }
        self.lit = lit;
    }

    fn toggle(&mut self) {
        self.lit = !self.lit;
    }

    fn hold(&mut self) {}
}

pub struct SimBoard;

impl Board for SimBoard {
    type Clock = SimClock;
    type Delay = VirtualDelay;
    type Climate = SyntheticClimate;
    type AirQuality = SyntheticAir;
    type Storage = DirStorage;
    type Network = SimNetwork;
    type Panel = SimPanel;
    type Indicator = SimLed;
}

/// What the simulated hardware looks like.
pub struct SimSetup {
    pub output: PathBuf,
    pub online: bool,
    pub epoch_at_boot: Duration,
    pub faulty: Option<Location>,
    pub ascii: bool,
}

pub fn devices(time: &VirtualTime, setup: SimSetup) -> Devices<SimBoard> {
    let climate: [SyntheticClimate; LOCATIONS] = Location::ALL.map(|location| SyntheticClimate {
        location,
        time: time.clone(),
        faulty: setup.faulty == Some(location),
    });

    Devices {
        clock: SimClock {
            time: time.clone(),
            offset: Duration::ZERO,
        },
        delay: VirtualDelay(time.clone()),
        climate,
        air_quality: SyntheticAir {
            time: time.clone(),
            mode: DriveMode::Idle,
        },
        storage: DirStorage::new(setup.output),
        network: SimNetwork {
            time: time.clone(),
            epoch_at_boot: setup.epoch_at_boot,
            online: setup.online,
        },
        panel: SimPanel {
            display: SimulatorDisplay::new(Size::new(PANEL_WIDTH_PX, PANEL_HEIGHT_PX)),
            ascii: setup.ascii,
        },
        indicator: SimLed::default(),
    }
}
