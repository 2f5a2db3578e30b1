//! Sharing one async I2C bus between the CCS811 and the OLED.
//!
//! `embedded-hal-bus` only ships a blocking critical-section device. This one
//! holds an embassy [`Mutex`] across the await points of a transaction so the
//! executor keeps running while a transfer is in flight.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};
use static_cell::StaticCell;

pub type SharedBus<T> = Mutex<CriticalSectionRawMutex, T>;

/// One device's handle on a [`SharedBus`].
pub struct AsyncI2cDevice<'a, T> {
    bus: &'a SharedBus<T>,
}

impl<'a, T> AsyncI2cDevice<'a, T> {
    #[inline]
    pub const fn new(bus: &'a SharedBus<T>) -> Self {
        Self { bus }
    }
}

impl<T> Clone for AsyncI2cDevice<'_, T> {
    fn clone(&self) -> Self {
        Self { bus: self.bus }
    }
}

/// Move `bus` into `cell` and return a handle for each of `N` devices.
pub fn share<T, const N: usize>(
    cell: &'static StaticCell<SharedBus<T>>,
    bus: T,
) -> [AsyncI2cDevice<'static, T>; N] {
    let bus: &'static SharedBus<T> = cell.init(Mutex::new(bus));
    core::array::from_fn(|_| AsyncI2cDevice::new(bus))
}

impl<T> ErrorType for AsyncI2cDevice<'_, T>
where
    T: ErrorType,
{
    type Error = T::Error;
}

impl<T> I2c for AsyncI2cDevice<'_, T>
where
    T: I2c,
{
    #[inline]
    async fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.lock().await.read(address, read).await
    }

    #[inline]
    async fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Self::Error> {
        self.bus.lock().await.write(address, write).await
    }

    #[inline]
    async fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.bus.lock().await.write_read(address, write, read).await
    }

    /// The lock is held for the whole transaction, so no other device can
    /// slip a transfer between a register write and its read.
    #[inline]
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut bus = self.bus.lock().await;
        bus.transaction(address, operations).await
    }
}
