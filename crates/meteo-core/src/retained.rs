//! State that survives deep sleep.
//!
//! Everything the logger remembers between wakes lives in one
//! [`RetainedState`], placed by the firmware in RTC memory. The memory keeps
//! its contents through deep sleep but not through a power loss, so the
//! region is wrapped in a [`RetainedSlot`] that tells a resumed state apart
//! from leftover bytes.

use core::mem::{MaybeUninit, size_of};
use core::time::Duration;

use log::{info, warn};

use crate::display::ScreenIndex;
use crate::sample::Sample;
use crate::storage::SessionId;
use crate::wake::WakeCause;

/// Fixed-capacity sample buffer with a cursor on the last written slot.
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    slots: [Sample; N],
    cursor: Option<usize>,
}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        const { assert!(N > 0, "ring buffer needs at least one slot") };
        Self {
            slots: [Sample::EMPTY; N],
            cursor: None,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Slot written most recently, `None` before the first write.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Slot the next sample goes to.
    pub fn next_slot(&self) -> usize {
        match self.cursor {
            None => 0,
            Some(last) => (last + 1) % N,
        }
    }

    /// True when the next write starts a new batch.
    pub fn at_batch_start(&self) -> bool {
        self.next_slot() == 0
    }

    /// True right after the last slot of a batch has been written.
    pub fn batch_complete(&self) -> bool {
        self.cursor == Some(N - 1)
    }

    /// Write `sample` into the next slot and return the slot index.
    pub fn push(&mut self, sample: Sample) -> usize {
        let slot = self.next_slot();
        self.slots[slot] = sample;
        self.cursor = Some(slot);
        slot
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.cursor.map(|slot| &self.slots[slot])
    }

    /// All slots in buffer order.
    pub fn samples(&self) -> &[Sample; N] {
        &self.slots
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock synchronization status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    pub synced: bool,
    pub last_sync: Option<Duration>,
    /// Id shared by every file written while the clock is not synchronized.
    pub session: Option<SessionId>,
}

impl SyncState {
    pub const fn unsynced() -> Self {
        Self {
            synced: false,
            last_sync: None,
            session: None,
        }
    }

    pub fn mark_synced(&mut self, at: Duration) {
        self.synced = true;
        self.last_sync = Some(at);
        self.session = None;
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::unsynced()
    }
}

/// Everything carried from one wake to the next.
#[derive(Debug, Clone)]
pub struct RetainedState<const N: usize> {
    pub readings: RingBuffer<N>,
    pub screen: ScreenIndex,
    pub sync: SyncState,
    /// When the current measurement cadence started.
    pub sleep_cycle_start: Duration,
    /// Last button press that was accepted, `None` until the first one.
    pub last_button_press: Option<Duration>,
    pub error_latched: bool,
}

impl<const N: usize> RetainedState<N> {
    /// State of a freshly powered device.
    pub const fn cold_boot() -> Self {
        Self {
            readings: RingBuffer::new(),
            screen: ScreenIndex::AIR_QUALITY,
            sync: SyncState::unsynced(),
            sleep_cycle_start: Duration::ZERO,
            last_button_press: None,
            error_latched: false,
        }
    }
}

impl<const N: usize> Default for RetainedState<N> {
    fn default() -> Self {
        Self::cold_boot()
    }
}

/// Storage for a [`RetainedState`] that may hold garbage.
///
/// Meant to be placed in a `static` in RTC memory, initialized with
/// [`RetainedSlot::vacant`] so the loader does not touch its contents.
#[repr(C)]
pub struct RetainedSlot<const N: usize> {
    signature: u32,
    state: MaybeUninit<RetainedState<N>>,
}

impl<const N: usize> RetainedSlot<N> {
    /// Changes whenever the layout or batch length of the state changes, so a
    /// firmware update never reinterprets an old image.
    const SIGNATURE: u32 =
        0x4D45_5430 ^ (size_of::<RetainedState<N>>() as u32).rotate_left(12) ^ (N as u32);

    pub const fn vacant() -> Self {
        Self {
            signature: 0,
            state: MaybeUninit::uninit(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.signature == Self::SIGNATURE
    }

    /// Hand out the state for this wake.
    ///
    /// A cold boot, or any other wake that finds no valid state, starts over
    /// from [`RetainedState::cold_boot`]; the returned cause is then
    /// [`WakeCause::ColdBoot`].
    pub fn resume(&mut self, cause: WakeCause) -> (WakeCause, &mut RetainedState<N>) {
        let cause = match cause {
            WakeCause::ColdBoot => WakeCause::ColdBoot,
            _ if self.is_valid() => cause,
            _ => {
                warn!("Retained state is invalid after {:?} wake, starting over", cause);
                WakeCause::ColdBoot
            }
        };

        if cause == WakeCause::ColdBoot {
            info!("Initializing retained state for {} slots", N);
            self.state.write(RetainedState::cold_boot());
            self.signature = Self::SIGNATURE;
        }

        // SAFETY: the signature is only set right after `state` has been fully
        // written above, and it matches nothing but a state of this exact
        // layout written by this firmware.
        let state = unsafe { self.state.assume_init_mut() };
        (cause, state)
    }

    /// Forget the state so the next wake starts over.
    pub fn invalidate(&mut self) {
        self.signature = 0;
    }
}

impl<const N: usize> Default for RetainedSlot<N> {
    fn default() -> Self {
        Self::vacant()
    }
}
