//! Batch file format.
//!
//! A header line followed by one row per sample in buffer order:
//! `co2, tvoc` as integers, then temperature and humidity for each location
//! with two decimals. Unreadable values are written as `NaN`.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write};

use thiserror_no_std::Error;

use crate::sample::{AirQuality, Climate, LOCATIONS, Sample};

pub const HEADER: &str = "co2, tvoc, temp_room, hum_room, temp_wall, hum_wall, temp_ext, hum_ext, temp_ceiling, hum_ceiling";

const COLUMNS: usize = 2 + 2 * LOCATIONS;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvError {
    #[error("missing or unexpected header")]
    Header,
    #[error("row {row}: found {found} columns")]
    ColumnCount { row: usize, found: usize },
    #[error("row {row}: column {column} is not a number")]
    Value { row: usize, column: usize },
}

/// Append one sample as a newline terminated row.
pub fn write_row<W: Write>(out: &mut W, sample: &Sample) -> fmt::Result {
    write!(out, "{},{}", sample.air.eco2_ppm, sample.air.tvoc_ppb)?;
    for climate in &sample.climate {
        write!(out, ",{:.2},{:.2}", climate.temperature, climate.humidity)?;
    }
    out.write_char('\n')
}

/// Serialize a whole batch: header, then every sample.
pub fn encode_batch(samples: &[Sample]) -> String {
    let mut out = String::with_capacity(HEADER.len() + 1 + samples.len() * 64);
    out.push_str(HEADER);
    out.push('\n');
    for sample in samples {
        // Writing into a String cannot fail.
        let _ = write_row(&mut out, sample);
    }
    out
}

/// Parse a batch produced by [`encode_batch`].
pub fn decode_batch(text: &str) -> Result<Vec<Sample>, CsvError> {
    let mut lines = text.lines();
    if lines.next().map(str::trim) != Some(HEADER) {
        return Err(CsvError::Header);
    }

    lines
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(row, line)| parse_row(row, line))
        .collect()
}

fn parse_row(row: usize, line: &str) -> Result<Sample, CsvError> {
    let mut fields: heapless::Vec<&str, COLUMNS> = heapless::Vec::new();
    let mut found = 0;
    for field in line.split(',') {
        found += 1;
        let _ = fields.push(field.trim());
    }
    if found != COLUMNS {
        return Err(CsvError::ColumnCount { row, found });
    }

    let integer = |column: usize| {
        fields[column]
            .parse::<u16>()
            .map_err(|_| CsvError::Value { row, column })
    };
    let float = |column: usize| {
        fields[column]
            .parse::<f32>()
            .map_err(|_| CsvError::Value { row, column })
    };

    let mut climate = [Climate::MISSING; LOCATIONS];
    for (i, slot) in climate.iter_mut().enumerate() {
        *slot = Climate::new(float(2 + 2 * i)?, float(3 + 2 * i)?);
    }

    Ok(Sample {
        climate,
        air: AirQuality {
            eco2_ppm: integer(0)?,
            tvoc_ppb: integer(1)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Location;

    fn sample(seed: u16) -> Sample {
        let mut climate = [Climate::new(0.0, 0.0); LOCATIONS];
        for (i, c) in climate.iter_mut().enumerate() {
            *c = Climate::new(seed as f32 + i as f32 * 0.25 - 10.0, 40.5 + i as f32);
        }
        Sample {
            climate,
            air: AirQuality {
                eco2_ppm: 400 + seed,
                tvoc_ppb: seed,
            },
        }
    }

    #[test]
    fn test_header_matches_location_columns() {
        let mut expected = String::from("co2, tvoc");
        for location in Location::ALL {
            let _ = write!(
                expected,
                ", temp_{0}, hum_{0}",
                location.column()
            );
        }
        assert_eq!(HEADER, expected);
    }

    #[test]
    fn test_row_format() {
        let mut row = String::new();
        let mut s = sample(2);
        s.climate[3] = Climate::MISSING;
        write_row(&mut row, &s).unwrap();
        assert_eq!(row, "402,2,-8.00,40.50,-7.75,41.50,-7.50,42.50,NaN,NaN\n");
    }

    #[test]
    fn test_batch_has_header_and_one_row_per_sample() {
        let samples = [sample(1), sample(2), sample(3)];
        let text = encode_batch(&samples);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], HEADER);
        assert!(text.ends_with('\n'));

        let decoded = decode_batch(&text).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_missing_values_survive_parsing() {
        let mut s = sample(5);
        s.climate[1] = Climate::MISSING;
        let decoded = decode_batch(&encode_batch(&[s])).unwrap();
        assert!(!decoded[0].climate[1].is_valid());
        assert_eq!(decoded[0].climate[0], s.climate[0]);
    }

    #[test]
    fn test_decode_rejects_malformed_rows() {
        assert_eq!(decode_batch("co2\n1,2\n"), Err(CsvError::Header));

        let short = alloc::format!("{HEADER}\n1,2,3\n");
        assert_eq!(
            decode_batch(&short),
            Err(CsvError::ColumnCount { row: 0, found: 3 })
        );

        let bad = alloc::format!("{HEADER}\n1,2,x,4,5,6,7,8,9,10\n");
        assert_eq!(
            decode_batch(&bad),
            Err(CsvError::Value { row: 0, column: 2 })
        );
    }
}
