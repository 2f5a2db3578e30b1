//! Network time synchronization with a bounded retry budget.

use core::fmt::Debug;
use core::time::Duration;

use embassy_futures::select::{Either, select};
use embedded_hal_async::delay::DelayNs;
use log::{debug, info, warn};
use thiserror_no_std::Error;

use crate::clock::{Clock, elapsed_since};
use crate::indicator::Indicator;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    #[error("no network credentials configured")]
    NotConfigured,
    #[error("not connected to the access point")]
    NotConnected,
    #[error("no IP address assigned")]
    NoAddress,
    #[error("time server lookup failed")]
    Dns,
    #[error("no reply from time server")]
    Timeout,
    #[error("bad reply from time server: {0}")]
    BadReply(&'static str),
}

/// A source of wall-clock time reachable over the network.
pub trait NetworkClock {
    /// Make one attempt at fetching the current time since the Unix epoch.
    ///
    /// Connecting to the network is part of the attempt, so a first call may
    /// only start the connection and fail.
    fn fetch_time(&mut self) -> impl Future<Output = Result<Duration, SyncError>>;

    /// Shut the radio down once synchronization is over.
    fn power_down(&mut self) -> impl Future<Output = ()>;
}

/// How a retried operation ended without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every attempt failed; holds the last error.
    Exhausted(E),
    /// The time budget ran out, possibly in the middle of an attempt.
    OutOfTime,
}

/// How often and how far apart an operation is retried, and how long all
/// attempts may take together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub backoff: Duration,
    pub budget: Duration,
}

impl RetryPolicy {
    pub const NETWORK: RetryPolicy = RetryPolicy {
        max_attempts: 10,
        backoff: Duration::from_secs(1),
        budget: Duration::from_secs(10),
    };

    /// Run `attempt` until it succeeds, `max_attempts` are used up or the
    /// budget measured on `clock` is spent.
    ///
    /// Each attempt races a `delay` for the remaining budget and is dropped
    /// if the delay wins. Before each wait `between` is called with the
    /// number of the attempt that just failed.
    pub async fn run<T, E, C, D, F>(
        &self,
        clock: &C,
        delay: &mut D,
        mut between: impl FnMut(u8),
        mut attempt: F,
    ) -> Result<T, RetryError<E>>
    where
        C: Clock,
        D: DelayNs,
        E: Debug,
        F: AsyncFnMut(u8) -> Result<T, E>,
    {
        let attempts = self.max_attempts.max(1);
        let start = clock.now();
        let remaining = || self.budget.saturating_sub(elapsed_since(clock.now(), start));

        let mut n = 1;
        loop {
            let left = remaining();
            if left.is_zero() {
                warn!("Retry budget of {:?} spent after {} attempts", self.budget, n - 1);
                return Err(RetryError::OutOfTime);
            }

            let outcome = select(attempt(n), delay.delay_us(as_micros(left))).await;
            match outcome {
                Either::First(Ok(value)) => return Ok(value),
                Either::First(Err(e)) if n >= attempts => return Err(RetryError::Exhausted(e)),
                Either::First(Err(e)) => {
                    debug!("Attempt {}/{} failed: {:?}", n, attempts, e);
                    between(n);
                    let wait = self.backoff.min(remaining());
                    delay.delay_us(as_micros(wait)).await;
                    n += 1;
                }
                Either::Second(()) => {
                    warn!("Attempt {} cut off, retry budget of {:?} spent", n, self.budget);
                    return Err(RetryError::OutOfTime);
                }
            }
        }
    }
}

fn as_micros(duration: Duration) -> u32 {
    duration.as_micros().min(u128::from(u32::MAX)) as u32
}

/// Fetch the time from `network` under `policy` and set `clock` to it.
///
/// With `blink` the indicator toggles once between consecutive attempts so a
/// freshly powered device shows it is waiting for the network. The network
/// is powered down afterwards whatever the outcome.
pub async fn synchronize<N, C, D, I>(
    network: &mut N,
    clock: &mut C,
    delay: &mut D,
    indicator: &mut I,
    policy: &RetryPolicy,
    blink: bool,
) -> Result<Duration, SyncError>
where
    N: NetworkClock,
    C: Clock,
    D: DelayNs,
    I: Indicator,
{
    info!(
        "Synchronizing clock ({} attempts, {:?} apart, {:?} in total)",
        policy.max_attempts, policy.backoff, policy.budget
    );

    let result = policy
        .run(
            &*clock,
            delay,
            |_| {
                if blink {
                    indicator.toggle();
                }
            },
            async |attempt| {
                debug!("Time sync attempt {}", attempt);
                network.fetch_time().await
            },
        )
        .await
        .map_err(|e| match e {
            RetryError::Exhausted(e) => e,
            RetryError::OutOfTime => SyncError::Timeout,
        });
    network.power_down().await;

    match result {
        Ok(now) => {
            clock.set_unix_time(now);
            info!("Clock set to Unix time {}", now.as_secs());
            Ok(now)
        }
        Err(e) => {
            warn!("Clock sync gave up: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeClock, FakeDelay, FakeIndicator, FakeNetwork, SharedTime};
    use embassy_futures::block_on;

    const UNIX_NOW: Duration = Duration::from_secs(1_700_000_000);

    #[test]
    fn test_retry_stops_at_first_success() {
        let time = SharedTime::default();
        let clock = FakeClock::new(&time);
        let mut delay = FakeDelay::new(&time);
        let mut calls = 0;
        let result: Result<u8, RetryError<()>> = block_on(RetryPolicy::NETWORK.run(
            &clock,
            &mut delay,
            |_| {},
            async |n| {
                calls += 1;
                if n == 4 { Ok(n) } else { Err(()) }
            },
        ));
        assert_eq!(result, Ok(4));
        assert_eq!(calls, 4);
        assert_eq!(time.get(), Duration::from_secs(3));
    }

    #[test]
    fn test_retry_budget_is_bounded() {
        let time = SharedTime::default();
        let clock = FakeClock::new(&time);
        let mut delay = FakeDelay::new(&time);
        let mut waits = 0;
        let result: Result<(), RetryError<u8>> = block_on(RetryPolicy::NETWORK.run(
            &clock,
            &mut delay,
            |_| waits += 1,
            async |n| Err(n),
        ));
        assert_eq!(result, Err(RetryError::Exhausted(10)));
        assert_eq!(waits, 9);
        assert_eq!(time.get(), Duration::from_secs(9));
    }

    #[test]
    fn test_retry_backoff_is_cut_to_budget() {
        let time = SharedTime::default();
        let clock = FakeClock::new(&time);
        let mut delay = FakeDelay::new(&time);
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff: Duration::from_secs(4),
            budget: Duration::from_secs(10),
        };
        let mut calls = 0;
        let result: Result<(), RetryError<()>> = block_on(policy.run(
            &clock,
            &mut delay,
            |_| {},
            async |_| {
                calls += 1;
                Err(())
            },
        ));
        assert_eq!(result, Err(RetryError::OutOfTime));
        assert_eq!(calls, 3);
        assert_eq!(time.get(), Duration::from_secs(10));
    }

    #[test]
    fn test_slow_attempts_stop_at_budget() {
        let time = SharedTime::default();
        let mut network = FakeNetwork::reachable(&time, UNIX_NOW);
        network.attempt_time = Duration::from_secs(23);
        let mut clock = FakeClock::new(&time);
        let mut indicator = FakeIndicator::default();

        let result = block_on(synchronize(
            &mut network,
            &mut clock,
            &mut FakeDelay::new(&time),
            &mut indicator,
            &RetryPolicy::NETWORK,
            true,
        ));
        assert_eq!(result, Err(SyncError::Timeout));
        assert!(time.get() <= Duration::from_secs(11));
        assert_eq!(network.attempts, 1);
        assert_eq!(network.power_downs, 1);
        assert_eq!(clock.now(), time.get());
    }

    #[test]
    fn test_synchronize_sets_clock_and_powers_down() {
        let time = SharedTime::default();
        let mut network = FakeNetwork::reachable(&time, UNIX_NOW);
        network.fail_first = 2;
        let mut clock = FakeClock::new(&time);
        let mut indicator = FakeIndicator::default();

        let result = block_on(synchronize(
            &mut network,
            &mut clock,
            &mut FakeDelay::new(&time),
            &mut indicator,
            &RetryPolicy::NETWORK,
            true,
        ));
        let expected = UNIX_NOW + Duration::from_secs(2);
        assert_eq!(result, Ok(expected));
        assert_eq!(clock.now(), expected);
        assert_eq!(network.attempts, 3);
        assert_eq!(network.power_downs, 1);
        assert_eq!(indicator.toggles, 2);
    }

    #[test]
    fn test_synchronize_failure_leaves_clock_alone() {
        let time = SharedTime::default();
        let mut network = FakeNetwork::unreachable(&time);
        let mut clock = FakeClock::new(&time);
        let mut indicator = FakeIndicator::default();

        let result = block_on(synchronize(
            &mut network,
            &mut clock,
            &mut FakeDelay::new(&time),
            &mut indicator,
            &RetryPolicy::NETWORK,
            false,
        ));
        assert_eq!(result, Err(SyncError::NotConnected));
        assert_eq!(network.attempts, 10);
        assert_eq!(network.power_downs, 1);
        assert_eq!(indicator.toggles, 0);
        assert_eq!(clock.now(), Duration::from_secs(9));
    }
}
