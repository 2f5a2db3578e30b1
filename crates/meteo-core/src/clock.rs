//! Wall-clock access.

use core::time::Duration;

/// The real-time clock that keeps running across deep sleep.
///
/// Until the first successful network synchronization the value is only
/// meaningful relative to other readings of the same clock.
pub trait Clock {
    /// Current time, as Unix time once the clock has been set.
    fn now(&self) -> Duration;

    /// Set the clock to the given time since the Unix epoch.
    fn set_unix_time(&mut self, since_epoch: Duration);
}

/// Time elapsed from `earlier` to `now`, zero if the clock went backwards.
pub fn elapsed_since(now: Duration, earlier: Duration) -> Duration {
    now.saturating_sub(earlier)
}
