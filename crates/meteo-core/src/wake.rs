//! Wake dispatcher and cadence controller.
//!
//! Every wake from deep sleep runs exactly one of two branches. A button
//! wake advances the status screen and keeps the measurement schedule. A
//! timer wake (or a cold boot) runs the full measurement cycle: clock sync
//! when a new batch starts, sampling, and the batch flush once the buffer is
//! full. Both end by latching the error indicator and telling the caller how
//! long to sleep.

use core::time::Duration;

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::clock::{Clock, elapsed_since};
use crate::clock_sync::{self, NetworkClock};
use crate::config::LoggerConfig;
use crate::display::{self, FrameBuffer, Panel};
use crate::indicator::Indicator;
use crate::retained::{RetainedState, SyncState};
use crate::sample::LOCATIONS;
use crate::sampling::{self, SamplingReport};
use crate::sensors::{AirQualitySensor, ClimateSensor};
use crate::storage::{self, FileName, Storage};

/// Why the chip is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// Power-on, reset, or a wake without usable retained state.
    ColdBoot,
    Timer,
    Button,
}

impl WakeCause {
    pub const fn is_cold_boot(self) -> bool {
        matches!(self, WakeCause::ColdBoot)
    }
}

/// The concrete collaborator types of a board.
pub trait Board {
    type Clock: Clock;
    type Delay: DelayNs;
    type Climate: ClimateSensor;
    type AirQuality: AirQualitySensor;
    type Storage: Storage;
    type Network: NetworkClock;
    type Panel: Panel;
    type Indicator: Indicator;
}

/// Every peripheral the logger drives during a wake.
pub struct Devices<B: Board> {
    pub clock: B::Clock,
    pub delay: B::Delay,
    /// Indexed by [`crate::sample::Location::index`].
    pub climate: [B::Climate; LOCATIONS],
    pub air_quality: B::AirQuality,
    pub storage: B::Storage,
    pub network: B::Network,
    pub panel: B::Panel,
    pub indicator: B::Indicator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    NotDue,
    Synced,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushStatus {
    NotDue,
    Written(FileName),
    Failed,
}

/// Outcome of every step of a measurement cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub storage_mounted: bool,
    pub clock_sync: SyncStatus,
    pub sensors_started: bool,
    pub slot: usize,
    pub sampling: SamplingReport,
    pub flush: FlushStatus,
}

impl CycleReport {
    /// Whether the cycle ran without a failure that lights the indicator.
    ///
    /// A failed clock sync is not counted; the status screens show it
    /// instead.
    pub fn healthy(&self) -> bool {
        self.storage_mounted
            && self.sensors_started
            && self.sampling.all_ok()
            && self.flush != FlushStatus::Failed
    }
}

/// What the caller has to do before the next wake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeOutcome {
    pub cause: WakeCause,
    pub sleep_for: Duration,
    pub error_latched: bool,
    /// Present for measurement cycles.
    pub report: Option<CycleReport>,
}

/// Sleep left in the current cadence at `now`, zero if it is already over.
pub fn remaining_sleep(cadence: Duration, cycle_start: Duration, now: Duration) -> Duration {
    cadence.saturating_sub(elapsed_since(now, cycle_start))
}

/// The logger: configuration, peripherals and the screen buffer.
pub struct Logger<B: Board> {
    config: LoggerConfig,
    devices: Devices<B>,
    frame: FrameBuffer,
}

impl<B: Board> Logger<B> {
    pub fn new(config: LoggerConfig, devices: Devices<B>) -> Self {
        Self {
            config,
            devices,
            frame: FrameBuffer::new(),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn devices(&self) -> &Devices<B> {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut Devices<B> {
        &mut self.devices
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn into_devices(self) -> Devices<B> {
        self.devices
    }

    /// Handle one wake and leave `state` ready for the next one.
    pub async fn wake<const N: usize>(
        &mut self,
        cause: WakeCause,
        state: &mut RetainedState<N>,
    ) -> WakeOutcome {
        info!("Woke up: {:?}", cause);

        let (sleep_for, report) = match cause {
            WakeCause::Button => (self.on_button(state).await, None),
            WakeCause::Timer | WakeCause::ColdBoot => {
                let report = self.measure(cause, state).await;
                state.error_latched = !report.healthy();
                state.sleep_cycle_start = self.devices.clock.now();
                (self.config.cadence, Some(report))
            }
        };

        self.devices.indicator.set(state.error_latched);
        self.devices.indicator.hold();

        info!(
            "Sleeping for {} ms (error latch {})",
            sleep_for.as_millis(),
            if state.error_latched { "on" } else { "off" }
        );
        WakeOutcome {
            cause,
            sleep_for,
            error_latched: state.error_latched,
            report,
        }
    }

    async fn on_button<const N: usize>(&mut self, state: &mut RetainedState<N>) -> Duration {
        let now = self.devices.clock.now();

        let accepted = state
            .last_button_press
            .is_none_or(|previous| elapsed_since(now, previous) > self.config.debounce);
        if accepted {
            state.last_button_press = Some(now);
            state.screen = state.screen.next();
            info!("Button pressed, showing {:?}", state.screen.screen());
            self.render(state).await;
        } else {
            info!("Ignoring button bounce");
        }

        remaining_sleep(self.config.cadence, state.sleep_cycle_start, now)
    }

    async fn measure<const N: usize>(
        &mut self,
        cause: WakeCause,
        state: &mut RetainedState<N>,
    ) -> CycleReport {
        let storage_mounted = match self.devices.storage.mount() {
            Ok(()) => true,
            Err(e) => {
                error!("Storage mount failed: {}", e);
                false
            }
        };

        let clock_sync = if state.readings.at_batch_start() {
            self.sync_clock(cause, storage_mounted, &mut state.sync)
                .await
        } else {
            SyncStatus::NotDue
        };

        let sensors_started = if cause.is_cold_boot() {
            match self
                .devices
                .air_quality
                .start(self.config.air_quality_mode)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    error!("Air-quality sensor start failed: {}", e);
                    false
                }
            }
        } else {
            true
        };

        let (sample, sampling) =
            sampling::take_sample(&mut self.devices.climate, &mut self.devices.air_quality).await;
        let slot = state.readings.push(sample);
        info!("Stored reading in slot {}/{}", slot + 1, N);

        let flush = if !state.readings.batch_complete() {
            FlushStatus::NotDue
        } else if !storage_mounted {
            error!("Batch complete but storage is unavailable, dropping {} readings", N);
            FlushStatus::Failed
        } else {
            let epoch = self.devices.clock.now().as_secs();
            match storage::flush_batch(
                &mut self.devices.storage,
                &state.readings,
                &mut state.sync,
                epoch,
            ) {
                Ok(name) => FlushStatus::Written(name),
                Err(e) => {
                    error!("Batch flush failed: {}", e);
                    FlushStatus::Failed
                }
            }
        };

        self.render(state).await;

        CycleReport {
            storage_mounted,
            clock_sync,
            sensors_started,
            slot,
            sampling,
            flush,
        }
    }

    /// Synchronize the clock at the start of a batch. When that fails during
    /// an unsynced run, make sure the run has a session id.
    async fn sync_clock(
        &mut self,
        cause: WakeCause,
        storage_mounted: bool,
        sync: &mut SyncState,
    ) -> SyncStatus {
        let d = &mut self.devices;
        let result = clock_sync::synchronize(
            &mut d.network,
            &mut d.clock,
            &mut d.delay,
            &mut d.indicator,
            &self.config.sync_retry,
            cause.is_cold_boot(),
        )
        .await;

        match result {
            Ok(now) => {
                sync.mark_synced(now);
                SyncStatus::Synced
            }
            Err(_) if sync.synced => {
                warn!("Keeping previous clock synchronization");
                SyncStatus::Failed
            }
            Err(_) => {
                if storage_mounted {
                    if let Err(e) = storage::batch::ensure_session(&mut d.storage, sync) {
                        warn!("Could not allocate unsynced session: {}", e);
                    }
                } else if sync.session.is_none() {
                    warn!("Storage unavailable, deferring unsynced session allocation");
                }
                SyncStatus::Failed
            }
        }
    }

    async fn render<const N: usize>(&mut self, state: &RetainedState<N>) {
        if let Err(e) = display::present(
            &mut self.devices.panel,
            &mut self.frame,
            state.screen,
            state.readings.latest(),
            state.sync.synced,
        )
        .await
        {
            warn!("Display update failed: {:?}", e);
        }
    }
}
