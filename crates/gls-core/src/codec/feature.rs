//! Glucose Feature bitmask

use core::fmt;
use serde::{Deserialize, Serialize};

use super::cursor::Reader;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GlucoseFeatures(u16);

impl GlucoseFeatures {
    pub const NONE: Self = Self(0x0000);
    pub const LOW_BATTERY_DETECTION: Self = Self(0x0001);
    pub const SENSOR_MALFUNCTION_DETECTION: Self = Self(0x0002);
    pub const SENSOR_SAMPLE_SIZE: Self = Self(0x0004);
    pub const STRIP_INSERTION_ERROR_DETECTION: Self = Self(0x0008);
    pub const STRIP_TYPE_ERROR_DETECTION: Self = Self(0x0010);
    pub const RESULT_HIGH_LOW_DETECTION: Self = Self(0x0020);
    pub const TEMPERATURE_HIGH_LOW_DETECTION: Self = Self(0x0040);
    pub const READ_INTERRUPT_DETECTION: Self = Self(0x0080);
    pub const GENERAL_DEVICE_FAULT: Self = Self(0x0100);
    pub const TIME_FAULT: Self = Self(0x0200);
    pub const MULTIPLE_BOND: Self = Self(0x0400);

    /// Every defined feature bit
    pub const ALL: Self = Self(0x07FF);

    const NAMES: [(Self, &'static str); 11] = [
        (Self::LOW_BATTERY_DETECTION, "low battery detection"),
        (Self::SENSOR_MALFUNCTION_DETECTION, "sensor malfunction detection"),
        (Self::SENSOR_SAMPLE_SIZE, "sensor sample size"),
        (Self::STRIP_INSERTION_ERROR_DETECTION, "strip insertion error detection"),
        (Self::STRIP_TYPE_ERROR_DETECTION, "strip type error detection"),
        (Self::RESULT_HIGH_LOW_DETECTION, "result high-low detection"),
        (Self::TEMPERATURE_HIGH_LOW_DETECTION, "temperature high-low detection"),
        (Self::READ_INTERRUPT_DETECTION, "read interrupt detection"),
        (Self::GENERAL_DEVICE_FAULT, "general device fault"),
        (Self::TIME_FAULT, "time fault"),
        (Self::MULTIPLE_BOND, "multiple bond"),
    ];

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self(Reader::new(bytes).u16()?))
    }

    pub fn encode(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// Names of the supported features, in bit order
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(bit, _)| self.contains(*bit))
            .map(|(_, name)| name)
    }
}

impl fmt::Display for GlucoseFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}
