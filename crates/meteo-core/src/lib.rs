//! Hardware-independent core library for meteo-rs
//!
//! This crate contains the platform-agnostic half of the meteo deep-sleep
//! environmental logger: the wake-cycle state machine, the retained sample
//! ring buffer, batch CSV flushing, network clock synchronization with a
//! bounded retry policy, the button-cycled status screens, and the traits the
//! hardware collaborators implement.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod clock;
pub mod clock_sync;
pub mod config;
pub mod display;
pub mod indicator;
pub mod retained;
pub mod sample;
pub mod sampling;
pub mod sensors;
pub mod sntp;
pub mod storage;
pub mod wake;

#[cfg(test)]
mod fakes;
