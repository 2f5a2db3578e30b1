//! SSD1306 128x64 OLED on the shared I2C bus.

use embedded_hal_async::i2c::I2c;
use log::{debug, error};
use meteo_core::display::Panel;
use meteo_core::display::framebuffer::FrameBuffer;
use ssd1306::mode::BufferedGraphicsModeAsync;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306Async};
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelError {
    #[error("display init failed")]
    Init,
    #[error("display transfer failed")]
    Transfer,
}

type Driver<I> = Ssd1306Async<
    I2CInterface<I>,
    DisplaySize128x64,
    BufferedGraphicsModeAsync<DisplaySize128x64>,
>;

/// The status display. The controller is initialized on first use, so wakes
/// that never draw leave the bus untouched.
pub struct OledPanel<I> {
    driver: Driver<I>,
    initialized: bool,
}

impl<I: I2c> OledPanel<I> {
    pub fn new(i2c: I) -> Self {
        let interface = I2CDisplayInterface::new(i2c);
        let driver = Ssd1306Async::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        Self {
            driver,
            initialized: false,
        }
    }

    async fn ensure_initialized(&mut self) -> Result<(), PanelError> {
        if !self.initialized {
            self.driver.init().await.map_err(|e| {
                error!("SSD1306 init failed: {:?}", e);
                PanelError::Init
            })?;
            self.initialized = true;
            debug!("SSD1306 initialized");
        }
        Ok(())
    }

    async fn push(&mut self) -> Result<(), PanelError> {
        self.driver.flush().await.map_err(|e| {
            error!("SSD1306 flush failed: {:?}", e);
            PanelError::Transfer
        })
    }
}

impl<I: I2c> Panel for OledPanel<I> {
    type Error = PanelError;

    async fn show(&mut self, frame: &mut FrameBuffer) -> Result<(), PanelError> {
        self.ensure_initialized().await?;
        // Copies the dirty region into the driver's buffer; the bus transfer
        // happens in `push`.
        frame.flush(&mut self.driver).map_err(|e| {
            error!("SSD1306 buffer update failed: {:?}", e);
            PanelError::Transfer
        })?;
        self.push().await
    }

    async fn blank(&mut self) -> Result<(), PanelError> {
        self.ensure_initialized().await?;
        self.driver.clear_buffer();
        self.push().await
    }
}
