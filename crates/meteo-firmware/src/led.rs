//! The error LED on an RTC capable pad.
//!
//! Digital outputs float once the chip is in deep sleep. Latching the RTC pad
//! keeps the LED at its last level until the next wake releases it.

use esp_hal::gpio::{Level, Output, RtcPin};
use meteo_core::indicator::Indicator;

pub struct LedIndicator<P: RtcPin> {
    led: Output<'static>,
    pad: P,
}

impl<P: RtcPin> LedIndicator<P> {
    /// `pad` must refer to the same pin that drives `led`.
    pub fn new(led: Output<'static>, pad: P) -> Self {
        pad.rtcio_pad_hold(false);
        Self { led, pad }
    }
}

impl<P: RtcPin> Indicator for LedIndicator<P> {
    fn set(&mut self, lit: bool) {
        self.led.set_level(Level::from(lit));
    }

    fn toggle(&mut self) {
        self.led.toggle();
    }

    fn hold(&mut self) {
        self.pad.rtcio_pad_hold(true);
    }
}
