//! One measurement cycle worth of readings.

/// Number of temperature/humidity measurement points.
pub const LOCATIONS: usize = 4;

/// Where a temperature/humidity sensor is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Room,
    Wall,
    Outside,
    Ceiling,
}

impl Location {
    /// All locations in sensor-array and CSV column order.
    pub const ALL: [Location; LOCATIONS] = [
        Location::Room,
        Location::Wall,
        Location::Outside,
        Location::Ceiling,
    ];

    /// Position of this location in the sensor array.
    pub const fn index(self) -> usize {
        match self {
            Location::Room => 0,
            Location::Wall => 1,
            Location::Outside => 2,
            Location::Ceiling => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Human readable name used as the screen title.
    pub const fn label(self) -> &'static str {
        match self {
            Location::Room => "Room",
            Location::Wall => "Wall",
            Location::Outside => "Outside",
            Location::Ceiling => "Ceiling",
        }
    }

    /// Suffix used in the CSV header columns (`temp_<suffix>`, `hum_<suffix>`).
    pub const fn column(self) -> &'static str {
        match self {
            Location::Room => "room",
            Location::Wall => "wall",
            Location::Outside => "ext",
            Location::Ceiling => "ceiling",
        }
    }
}

/// A temperature (°C) and relative humidity (%) pair.
///
/// Either value may be NaN when the sensor at that location could not be read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    pub temperature: f32,
    pub humidity: f32,
}

impl Climate {
    /// Placeholder stored for a location whose read failed.
    pub const MISSING: Climate = Climate {
        temperature: f32::NAN,
        humidity: f32::NAN,
    };

    pub const fn new(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
        }
    }

    /// A reading is only usable when both halves are numbers.
    pub fn is_valid(&self) -> bool {
        !self.temperature.is_nan() && !self.humidity.is_nan()
    }
}

/// Equivalent CO2 (ppm) and total volatile organic compounds (ppb).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AirQuality {
    pub eco2_ppm: u16,
    pub tvoc_ppb: u16,
}

/// Everything recorded in a single ring buffer slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub climate: [Climate; LOCATIONS],
    pub air: AirQuality,
}

impl Sample {
    /// Contents of a slot that has never been written.
    pub const EMPTY: Sample = Sample {
        climate: [Climate::MISSING; LOCATIONS],
        air: AirQuality {
            eco2_ppm: 0,
            tvoc_ppb: 0,
        },
    };

    pub fn at(&self, location: Location) -> Climate {
        self.climate[location.index()]
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::EMPTY
    }
}
