//! Button-cycled status screens.

pub mod framebuffer;
pub mod render;

pub use framebuffer::FrameBuffer;
pub use render::draw_screen;

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use log::debug;

use crate::sample::{LOCATIONS, Location, Sample};

pub const PANEL_WIDTH_PX: u32 = 128;
pub const PANEL_HEIGHT_PX: u32 = 64;

/// Off, air quality, then one screen per location.
pub const SCREEN_COUNT: u8 = 2 + LOCATIONS as u8;

/// What the panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Off,
    AirQuality,
    Climate(Location),
}

/// Position in the screen cycle, persisted across sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenIndex(u8);

impl ScreenIndex {
    pub const OFF: ScreenIndex = ScreenIndex(0);
    pub const AIR_QUALITY: ScreenIndex = ScreenIndex(1);

    /// Out-of-range values wrap around.
    pub const fn new(raw: u8) -> Self {
        Self(raw % SCREEN_COUNT)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// The screen shown after the next button press.
    pub const fn next(self) -> Self {
        Self((self.0 + 1) % SCREEN_COUNT)
    }

    pub fn screen(self) -> Screen {
        match self.0 {
            0 => Screen::Off,
            1 => Screen::AirQuality,
            n => Location::from_index(n as usize - 2).map_or(Screen::Off, Screen::Climate),
        }
    }
}

/// The physical status panel.
pub trait Panel {
    type Error: core::fmt::Debug;

    /// Make the panel show the contents of `frame`.
    fn show(&mut self, frame: &mut FrameBuffer) -> impl Future<Output = Result<(), Self::Error>>;

    /// Turn all pixels off.
    fn blank(&mut self) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Render the screen at `index` for the latest sample and hand it to `panel`.
pub async fn present<P: Panel>(
    panel: &mut P,
    frame: &mut FrameBuffer,
    index: ScreenIndex,
    latest: Option<&Sample>,
    synced: bool,
) -> Result<(), P::Error> {
    let screen = index.screen();
    debug!("Presenting {:?}", screen);

    frame
        .clear(BinaryColor::Off)
        .unwrap_or_else(|never| match never {});
    if screen == Screen::Off {
        return panel.blank().await;
    }

    draw_screen(frame, screen, latest, synced).unwrap_or_else(|never| match never {});
    panel.show(frame).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_advances_return_to_start() {
        let mut index = ScreenIndex::AIR_QUALITY;
        let mut seen = alloc::vec::Vec::new();
        for _ in 0..SCREEN_COUNT {
            index = index.next();
            seen.push(index.screen());
        }
        assert_eq!(index, ScreenIndex::AIR_QUALITY);
        assert_eq!(
            seen,
            [
                Screen::Climate(Location::Room),
                Screen::Climate(Location::Wall),
                Screen::Climate(Location::Outside),
                Screen::Climate(Location::Ceiling),
                Screen::Off,
                Screen::AirQuality,
            ]
        );
    }

    #[test]
    fn test_index_wraps() {
        assert_eq!(ScreenIndex::new(SCREEN_COUNT), ScreenIndex::OFF);
        assert_eq!(ScreenIndex::new(7).get(), 1);
    }
}
