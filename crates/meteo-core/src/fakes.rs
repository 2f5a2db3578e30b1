//! In-memory collaborators for host tests.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::Cell;
use core::task::Poll;
use core::time::Duration;

use crate::clock::Clock;
use crate::clock_sync::{NetworkClock, SyncError};
use crate::display::{FrameBuffer, Panel};
use crate::indicator::Indicator;
use crate::sample::{AirQuality, Climate};
use crate::sensors::{AirQualityReading, AirQualitySensor, ClimateSensor, DriveMode, SensorError};
use crate::storage::{Storage, StorageError};
use crate::wake::{Board, Devices};

/// Virtual time shared by the clock and the delay.
#[derive(Debug, Clone, Default)]
pub struct SharedTime(Rc<Cell<Duration>>);

impl SharedTime {
    pub fn get(&self) -> Duration {
        self.0.get()
    }

    pub fn set(&self, time: Duration) {
        self.0.set(time);
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

/// Device clock running at the pace of [`SharedTime`], offset once set.
pub struct FakeClock {
    time: SharedTime,
    offset: Duration,
}

impl FakeClock {
    pub fn new(time: &SharedTime) -> Self {
        Self {
            time: time.clone(),
            offset: Duration::ZERO,
        }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.time.get() + self.offset
    }

    fn set_unix_time(&mut self, since_epoch: Duration) {
        self.offset = since_epoch.saturating_sub(self.time.get());
    }
}

pub struct FakeDelay(SharedTime);

impl FakeDelay {
    pub fn new(time: &SharedTime) -> Self {
        Self(time.clone())
    }
}

impl embedded_hal_async::delay::DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.advance(Duration::from_nanos(u64::from(ns)));
    }
}

/// Returns queued results first, then the steady reading.
pub struct ScriptedClimate {
    script: VecDeque<Result<Climate, SensorError>>,
    steady: Climate,
}

impl ScriptedClimate {
    pub fn steady(reading: Climate) -> Self {
        Self {
            script: VecDeque::new(),
            steady: reading,
        }
    }

    pub fn push(&mut self, result: Result<Climate, SensorError>) {
        self.script.push_back(result);
    }
}

impl ClimateSensor for ScriptedClimate {
    async fn read(&mut self) -> Result<Climate, SensorError> {
        self.script.pop_front().unwrap_or(Ok(self.steady))
    }
}

pub struct FakeAirQuality {
    pub air: AirQuality,
    pub fresh: bool,
    pub fail: bool,
    pub fail_start: bool,
    pub starts: Vec<DriveMode>,
}

impl FakeAirQuality {
    pub fn steady(eco2_ppm: u16, tvoc_ppb: u16) -> Self {
        Self {
            air: AirQuality { eco2_ppm, tvoc_ppb },
            fresh: true,
            fail: false,
            fail_start: false,
            starts: Vec::new(),
        }
    }
}

impl AirQualitySensor for FakeAirQuality {
    async fn start(&mut self, mode: DriveMode) -> Result<(), SensorError> {
        self.starts.push(mode);
        if self.fail_start {
            return Err(SensorError::InitializationFailed {
                sensor: "fake",
                details: "start refused",
            });
        }
        Ok(())
    }

    async fn read(&mut self) -> Result<AirQualityReading, SensorError> {
        if self.fail {
            return Err(SensorError::Status {
                sensor: "fake",
                code: 1,
            });
        }
        Ok(AirQualityReading {
            air: self.air,
            fresh: self.fresh,
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: BTreeMap<String, String>,
    pub mount_fails: bool,
    pub fail_writes: bool,
    pub mounts: u32,
}

impl MemoryStorage {
    pub fn with_files(names: &[&str]) -> Self {
        let mut storage = Self::default();
        for name in names {
            storage.files.insert(name.to_string(), String::new());
        }
        storage
    }

    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }
}

impl Storage for MemoryStorage {
    fn mount(&mut self) -> Result<(), StorageError> {
        self.mounts += 1;
        if self.mount_fails {
            return Err(StorageError::Mount("no card"));
        }
        Ok(())
    }

    fn list_files<F>(&mut self, prefix: &str, mut visit: F) -> Result<(), StorageError>
    where
        F: FnMut(&str),
    {
        self.files
            .keys()
            .filter(|name| name.starts_with(prefix))
            .for_each(|name| visit(name.as_str()));
        Ok(())
    }

    fn write_file(&mut self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io {
                operation: "write",
                details: "card full",
            });
        }
        let text = core::str::from_utf8(contents).map_err(|_| StorageError::InvalidName)?;
        self.files.insert(name.to_string(), text.to_string());
        Ok(())
    }
}

/// Time server reporting `epoch` plus the elapsed [`SharedTime`].
pub struct FakeNetwork {
    time: SharedTime,
    pub epoch: Duration,
    pub up: bool,
    pub fail_first: u32,
    /// Virtual time each attempt takes before it answers.
    pub attempt_time: Duration,
    pub attempts: u32,
    pub power_downs: u32,
}

impl FakeNetwork {
    pub fn reachable(time: &SharedTime, epoch: Duration) -> Self {
        Self {
            time: time.clone(),
            epoch,
            up: true,
            fail_first: 0,
            attempt_time: Duration::ZERO,
            attempts: 0,
            power_downs: 0,
        }
    }

    pub fn unreachable(time: &SharedTime) -> Self {
        Self {
            up: false,
            ..Self::reachable(time, Duration::ZERO)
        }
    }
}

impl NetworkClock for FakeNetwork {
    async fn fetch_time(&mut self) -> Result<Duration, SyncError> {
        self.attempts += 1;
        let done_at = self.time.get() + self.attempt_time;
        core::future::poll_fn(|cx| {
            if self.time.get() >= done_at {
                Poll::Ready(())
            } else {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await;
        if self.up && self.attempts > self.fail_first {
            Ok(self.epoch + self.time.get())
        } else {
            Err(SyncError::NotConnected)
        }
    }

    async fn power_down(&mut self) {
        self.power_downs += 1;
    }
}

#[derive(Debug, Default)]
pub struct RecordingPanel {
    pub shows: u32,
    pub blanks: u32,
    pub lit_pixels: usize,
    pub fail: bool,
}

impl Panel for RecordingPanel {
    type Error = ();

    async fn show(&mut self, frame: &mut FrameBuffer) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.shows += 1;
        self.lit_pixels = frame.lit_count();
        Ok(())
    }

    async fn blank(&mut self) -> Result<(), ()> {
        self.blanks += 1;
        self.lit_pixels = 0;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeIndicator {
    pub lit: bool,
    pub held: bool,
    pub toggles: u32,
}

impl Indicator for FakeIndicator {
    fn set(&mut self, lit: bool) {
        self.lit = lit;
        self.held = false;
    }

    fn toggle(&mut self) {
        self.lit = !self.lit;
        self.held = false;
        self.toggles += 1;
    }

    fn hold(&mut self) {
        self.held = true;
    }
}

pub struct TestBoard;

impl Board for TestBoard {
    type Clock = FakeClock;
    type Delay = FakeDelay;
    type Climate = ScriptedClimate;
    type AirQuality = FakeAirQuality;
    type Storage = MemoryStorage;
    type Network = FakeNetwork;
    type Panel = RecordingPanel;
    type Indicator = FakeIndicator;
}

/// Nominal sensors, empty storage, and the given network.
pub fn test_devices(time: &SharedTime, network: FakeNetwork) -> Devices<TestBoard> {
    Devices {
        clock: FakeClock::new(time),
        delay: FakeDelay::new(time),
        climate: core::array::from_fn(|i| {
            ScriptedClimate::steady(Climate::new(18.5 + i as f32, 45.0 + i as f32))
        }),
        air_quality: FakeAirQuality::steady(450, 12),
        storage: MemoryStorage::default(),
        network,
        panel: RecordingPanel::default(),
        indicator: FakeIndicator::default(),
    }
}
