//! Calendar date used as the index key.

use std::fmt;
use std::str::FromStr;

use crate::error::{FormatError, Result};

pub const DATE_LEN: usize = 10;

/// A proleptic Gregorian calendar date. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    year: u16,
    month: u8,
    day: u8,
}

impl Date {
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self> {
        if year > 9999 || !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month)
        {
            return Err(FormatError::InvalidDate(format!(
                "{year:04}-{month:02}-{day:02}"
            )));
        }
        Ok(Self { year, month, day })
    }

    /// Parses the `YYYY-MM-DD` form.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || FormatError::InvalidDate(value.to_string());
        let bytes = value.as_bytes();
        if bytes.len() != DATE_LEN || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(invalid());
        }
        for (idx, byte) in bytes.iter().enumerate() {
            if idx == 4 || idx == 7 {
                continue;
            }
            if !byte.is_ascii_digit() {
                return Err(invalid());
            }
        }
        let year = value[0..4].parse::<u16>().map_err(|_| invalid())?;
        let month = value[5..7].parse::<u8>().map_err(|_| invalid())?;
        let day = value[8..10].parse::<u8>().map_err(|_| invalid())?;
        Self::new(year, month, day).map_err(|_| invalid())
    }

    pub fn from_bytes(bytes: &[u8; DATE_LEN]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| FormatError::InvalidDate(String::from_utf8_lossy(bytes).into_owned()))?;
        Self::parse(text)
    }

    pub fn to_bytes(&self) -> [u8; DATE_LEN] {
        let mut buf = [0u8; DATE_LEN];
        buf.copy_from_slice(self.to_string().as_bytes());
        buf
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for Date {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}
