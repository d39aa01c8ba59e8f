//! Bluetooth Date Time (7 bytes)

use core::fmt;
use serde::{Deserialize, Serialize};

use super::cursor::{Reader, Writer};
use crate::{GlsError, Result};

pub const DATE_TIME_SIZE: usize = 7;

/// Calendar time as carried in GLS records and RACP filters.
///
/// A zero year, month or day means "not known".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl DateTime {
    pub const fn new(year: u16, month: u8, day: u8, hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            year,
            month,
            day,
            hours,
            minutes,
            seconds,
        }
    }

    /// Check every field against its legal range
    pub fn is_valid(&self) -> bool {
        (self.year == 0 || (1582..=9999).contains(&self.year))
            && self.month <= 12
            && self.day <= 31
            && self.hours <= 23
            && self.minutes <= 59
            && self.seconds <= 59
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(GlsError::invalid_value(format!("date time out of range: {}", self)))
        }
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            year: r.u16()?,
            month: r.u8()?,
            day: r.u8()?,
            hours: r.u8()?,
            minutes: r.u8()?,
            seconds: r.u8()?,
        })
    }

    pub(crate) fn write(&self, w: &mut Writer) {
        w.u16(self.year)
            .u8(self.month)
            .u8(self.day)
            .u8(self.hours)
            .u8(self.minutes)
            .u8(self.seconds);
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::read(&mut Reader::new(bytes))
    }

    pub fn encode(&self) -> [u8; DATE_TIME_SIZE] {
        let y = self.year.to_le_bytes();
        [y[0], y[1], self.month, self.day, self.hours, self.minutes, self.seconds]
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hours, self.minutes, self.seconds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_year_little_endian() {
        let dt = DateTime::new(2013, 7, 4, 13, 30, 5);
        assert_eq!(dt.encode(), [0xDD, 0x07, 7, 4, 13, 30, 5]);
        assert_eq!(DateTime::decode(&dt.encode()).unwrap(), dt);
    }

    #[test]
    fn validation_bounds() {
        assert!(DateTime::default().is_valid());
        assert!(DateTime::new(1582, 12, 31, 23, 59, 59).is_valid());
        assert!(!DateTime::new(1581, 1, 1, 0, 0, 0).is_valid());
        assert!(!DateTime::new(2020, 13, 1, 0, 0, 0).is_valid());
        assert!(!DateTime::new(2020, 1, 1, 24, 0, 0).is_valid());
        assert!(DateTime::new(2020, 1, 1, 0, 60, 0).validate().is_err());
    }

    #[test]
    fn short_buffer_is_malformed() {
        assert_eq!(
            DateTime::decode(&[0xDD, 0x07, 7]).unwrap_err(),
            GlsError::malformed(4, 3)
        );
    }
}
