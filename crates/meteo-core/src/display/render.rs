use core::fmt::Write;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_9X15;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, Triangle};
use embedded_graphics::text::{Baseline, Text};
use heapless::String;

use super::{PANEL_WIDTH_PX, Screen};
use crate::sample::Sample;

type TextLine = String<16>;

const LINE_HEIGHT: i32 = 20;
const MARGIN: i32 = 2;

/// The three text lines of a screen, empty for [`Screen::Off`].
pub fn screen_lines(screen: Screen, latest: Option<&Sample>) -> heapless::Vec<TextLine, 3> {
    let mut lines = heapless::Vec::new();
    let mut push = |args: core::fmt::Arguments| {
        let mut line = TextLine::new();
        // Lines are sized for the panel width; anything longer is cut off.
        let _ = line.write_fmt(args);
        let _ = lines.push(line);
    };

    match screen {
        Screen::Off => {}
        Screen::AirQuality => {
            push(format_args!("Particles"));
            match latest {
                Some(sample) => {
                    push(format_args!("CO2 {}ppm", sample.air.eco2_ppm));
                    push(format_args!("VOC {}ppb", sample.air.tvoc_ppb));
                }
                None => {
                    push(format_args!("CO2 --"));
                    push(format_args!("VOC --"));
                }
            }
        }
        Screen::Climate(location) => {
            push(format_args!("{}", location.label()));
            let climate = latest.map(|s| s.at(location));
            match climate.map(|c| c.temperature).filter(|t| !t.is_nan()) {
                Some(t) => push(format_args!("Temp {:.1}C", t)),
                None => push(format_args!("Temp --")),
            }
            match climate.map(|c| c.humidity).filter(|h| !h.is_nan()) {
                Some(h) => push(format_args!("Hum  {:.1}%", h)),
                None => push(format_args!("Hum  --")),
            }
        }
    }
    lines
}

/// Draw `screen` and, when the clock is not synchronized, a warning sign in
/// the top right corner.
pub fn draw_screen<D>(
    target: &mut D,
    screen: Screen,
    latest: Option<&Sample>,
    synced: bool,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let style = MonoTextStyle::new(&FONT_9X15, BinaryColor::On);
    for (row, line) in screen_lines(screen, latest).iter().enumerate() {
        let origin = Point::new(MARGIN, MARGIN + row as i32 * LINE_HEIGHT);
        Text::with_baseline(line, origin, style, Baseline::Top).draw(target)?;
    }

    if !synced && screen != Screen::Off {
        draw_unsynced_warning(target)?;
    }
    Ok(())
}

fn draw_unsynced_warning<D>(target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let apex = Point::new(PANEL_WIDTH_PX as i32 - 9, 0);
    Triangle::new(apex, apex + Point::new(-8, 14), apex + Point::new(8, 14))
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
        .draw(target)?;

    Line::new(apex + Point::new(0, 4), apex + Point::new(0, 9))
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::Off, 2))
        .draw(target)?;
    Pixel(apex + Point::new(0, 12), BinaryColor::Off).draw(target)
}
