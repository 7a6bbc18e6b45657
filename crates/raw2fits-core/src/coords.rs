//! Sexagesimal and decimal representations of celestial coordinates.
//!
//! The same four-field form is used for right ascension (hours) and
//! declination (degrees); callers decide the unit of the leading field.
//! Decimal input is always in degrees, so right ascension has its own parser.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MS_PER_UNIT: i64 = 3_600_000;

/// A coordinate as leading unit, minutes, seconds and milliseconds.
///
/// The sign lives on `hour`. `negative` only matters when `hour` is zero,
/// e.g. a parsed declination of `-0:30:00`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coordinate {
    pub hour: i32,
    pub minute: u32,
    pub second: u32,
    pub millisecond: u32,
    pub negative: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoordinateError {
    #[error("empty coordinate")]
    Empty,
    #[error("invalid coordinate {0:?}: expected H:M:S, H:M:S.sss or D.DD")]
    Invalid(String),
}

impl Coordinate {
    pub fn new(hour: i32, minute: u32, second: u32, millisecond: u32) -> Self {
        Self {
            hour,
            minute,
            second,
            millisecond,
            negative: hour < 0,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.hour < 0 || self.negative
    }

    /// Signed decimal value of the coordinate.
    ///
    /// `|hour| + minute/60 + (second + millisecond/1000)/3600`, carrying the
    /// sign of `hour`.
    pub fn to_degrees(&self) -> f64 {
        let magnitude = f64::from(self.hour.unsigned_abs())
            + f64::from(self.minute) / 60.0
            + (f64::from(self.second) + f64::from(self.millisecond) / 1000.0) / 3600.0;
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Build a coordinate from a signed decimal value, rounded to the millisecond.
    pub fn from_degrees(value: f64) -> Self {
        let negative = value < 0.0;
        let total_ms = (value.abs() * MS_PER_UNIT as f64).round() as i64;

        let hour = (total_ms / MS_PER_UNIT) as i32;
        let rest = total_ms % MS_PER_UNIT;
        let minute = (rest / 60_000) as u32;
        let rest = rest % 60_000;
        let second = (rest / 1000) as u32;
        let millisecond = (rest % 1000) as u32;

        Self {
            hour: if negative { -hour } else { hour },
            minute,
            second,
            millisecond,
            negative: negative && total_ms > 0,
        }
    }

    /// Format as `H:M:S.sss`, with a leading `-` for negative values.
    pub fn to_sexagesimal_string(&self) -> String {
        let sign = if self.is_negative() { "-" } else { "" };
        format!(
            "{}{}:{:02}:{:02}.{:03}",
            sign,
            self.hour.unsigned_abs(),
            self.minute,
            self.second,
            self.millisecond
        )
    }

    /// Parse a configuration string: `H:M:S`, `H:M:S.sss` or a decimal value.
    pub fn parse(input: &str) -> Result<Self, CoordinateError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CoordinateError::Empty);
        }
        let invalid = || CoordinateError::Invalid(input.to_string());

        if !trimmed.contains(':') {
            let value: f64 = trimmed.parse().map_err(|_| invalid())?;
            return Ok(Self::from_degrees(value));
        }

        let parts: Vec<&str> = trimmed.split(':').map(str::trim).collect();
        if parts.len() > 3 {
            return Err(invalid());
        }

        let negative = parts[0].starts_with('-');
        let hour: i32 = parts[0].parse().map_err(|_| invalid())?;
        let minute: u32 = match parts.get(1) {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        let seconds: f64 = match parts.get(2) {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0.0,
        };
        if minute >= 60 || !(0.0..60.0).contains(&seconds) {
            return Err(invalid());
        }

        // Rounding can reach 60.000 s; carry it upward
        let (mut hour, mut minute) = (hour, minute);
        let mut total_ms = (seconds * 1000.0).round() as u32;
        if total_ms >= 60_000 {
            total_ms -= 60_000;
            minute += 1;
        }
        if minute == 60 {
            minute = 0;
            hour += if negative { -1 } else { 1 };
        }

        Ok(Self {
            hour,
            minute,
            second: total_ms / 1000,
            millisecond: total_ms % 1000,
            negative,
        })
    }

    /// Parse a right ascension: `H:M:S` in hours, or decimal degrees.
    ///
    /// `"10.684708"` is read as degrees and becomes `0:42:44.330`.
    pub fn parse_right_ascension(input: &str) -> Result<Self, CoordinateError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.contains(':') {
            return Self::parse(input);
        }
        let degrees: f64 = trimmed
            .parse()
            .map_err(|_| CoordinateError::Invalid(input.to_string()))?;
        Ok(Self::from_degrees(degrees / 15.0))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sexagesimal_string())
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Convert a free-form coordinate string to a signed decimal value.
///
/// Strings containing `:` are read as up to three sexagesimal components whose
/// trailing parts take the sign of the first; strings containing only `.` are
/// plain decimals. Anything else yields `0.0`.
pub fn parse_degrees(input: &str) -> f64 {
    let input = input.trim();
    if input.is_empty() {
        return 0.0;
    }

    if input.contains(':') {
        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() > 3 {
            return 0.0;
        }
        let mut values = [0.0f64; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = leading_float(part);
        }
        if values[0].is_sign_negative() {
            values[1] = -values[1];
            values[2] = -values[2];
        }
        return values[0] + values[1] / 60.0 + values[2] / 3600.0;
    }

    if input.contains('.') {
        return leading_float(input);
    }

    0.0
}

/// Parse the longest numeric prefix of `s`, or `0.0` when there is none.
fn leading_float(s: &str) -> f64 {
    let s = s.trim();
    let end = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    match s[..end].parse::<f64>() {
        Ok(v) => v,
        // "-" alone or "-." still tells us the sign
        Err(_) if s.starts_with('-') => -0.0,
        Err(_) => 0.0,
    }
}
