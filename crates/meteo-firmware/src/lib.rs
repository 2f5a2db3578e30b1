//! ESP32 firmware-specific modules for meteo-rs
//!
//! This crate contains the hardware half of the logger: peripheral bring-up,
//! the RTC backed clock, the SD card and OLED adapters, the Wi-Fi time source
//! and the error LED. Everything here implements a `meteo_core` trait so the
//! wake cycle itself stays host-testable.

#![no_std]

extern crate alloc;

pub mod async_i2c_bus;
pub mod board;
pub mod climate;
pub mod led;
pub mod oled;
pub mod rtc_clock;
pub mod sd_storage;
pub mod wifi_clock;

/// Place a value in a `static` and hand out its `'static` reference.
///
/// Panics if the same invocation site runs twice.
#[macro_export]
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}
