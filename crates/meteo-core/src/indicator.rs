//! The error indicator LED.

/// A single output level that survives deep sleep.
pub trait Indicator {
    fn set(&mut self, lit: bool);

    fn toggle(&mut self);

    /// Freeze the current level so it is kept while the chip sleeps.
    fn hold(&mut self);
}
