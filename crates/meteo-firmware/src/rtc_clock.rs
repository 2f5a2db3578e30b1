//! Wall clock kept by the RTC, which keeps counting through deep sleep.

use core::time::Duration;

use esp_hal::rtc_cntl::Rtc;
use meteo_core::clock::Clock;

pub struct RtcClock {
    rtc: Rtc<'static>,
}

impl RtcClock {
    pub fn new(rtc: Rtc<'static>) -> Self {
        Self { rtc }
    }

    /// Hand the RTC back for entering deep sleep.
    pub fn into_rtc(self) -> Rtc<'static> {
        self.rtc
    }
}

impl Clock for RtcClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.rtc.current_time_us())
    }

    fn set_unix_time(&mut self, since_epoch: Duration) {
        let micros = u64::try_from(since_epoch.as_micros()).unwrap_or(u64::MAX);
        self.rtc.set_current_time_us(micros);
    }
}
