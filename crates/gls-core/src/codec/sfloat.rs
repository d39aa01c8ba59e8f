//! IEEE-11073 16-bit SFLOAT

use core::fmt;
use serde::{Deserialize, Serialize};

/// 16-bit medical float: 4-bit signed exponent over a 12-bit signed mantissa.
///
/// Stored raw so special values survive a decode/encode cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SFloat(u16);

impl SFloat {
    pub const NAN: Self = Self(0x07FF);
    pub const NRES: Self = Self(0x0800);
    pub const POSITIVE_INFINITY: Self = Self(0x07FE);
    pub const NEGATIVE_INFINITY: Self = Self(0x0802);
    pub const RESERVED: Self = Self(0x0801);

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Build from mantissa and exponent; `None` if either is out of range
    pub fn from_parts(mantissa: i16, exponent: i8) -> Option<Self> {
        if !(-2045..=2045).contains(&mantissa) || !(-8..=7).contains(&exponent) {
            return None;
        }
        let m = (mantissa as u16) & 0x0FFF;
        let e = ((exponent as u16) & 0x000F) << 12;
        Some(Self(e | m))
    }

    pub fn mantissa(self) -> i16 {
        // sign-extend 12 bits
        (((self.0 & 0x0FFF) << 4) as i16) >> 4
    }

    pub fn exponent(self) -> i8 {
        ((self.0 as i16) >> 12) as i8
    }

    pub fn is_special(self) -> bool {
        matches!(
            self,
            Self::NAN | Self::NRES | Self::POSITIVE_INFINITY | Self::NEGATIVE_INFINITY | Self::RESERVED
        )
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Self::POSITIVE_INFINITY => f64::INFINITY,
            Self::NEGATIVE_INFINITY => f64::NEG_INFINITY,
            s if s.is_special() => f64::NAN,
            s => f64::from(s.mantissa()) * 10f64.powi(i32::from(s.exponent())),
        }
    }
}

impl fmt::Display for SFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NAN => write!(f, "NaN"),
            Self::NRES => write!(f, "NRes"),
            Self::POSITIVE_INFINITY => write!(f, "+INF"),
            Self::NEGATIVE_INFINITY => write!(f, "-INF"),
            Self::RESERVED => write!(f, "RFU"),
            s => write!(f, "{}e{}", s.mantissa(), s.exponent()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_round_trip() {
        let v = SFloat::from_parts(-125, -2).unwrap();
        assert_eq!(v.mantissa(), -125);
        assert_eq!(v.exponent(), -2);
        assert!((v.to_f64() + 1.25).abs() < 1e-9);
    }

    #[test]
    fn special_values() {
        assert!(SFloat::NAN.to_f64().is_nan());
        assert_eq!(SFloat::POSITIVE_INFINITY.to_f64(), f64::INFINITY);
        assert_eq!(SFloat::NEGATIVE_INFINITY.to_string(), "-INF");
        assert!(SFloat::from_raw(0x0801).is_special());
        assert!(SFloat::from_parts(2046, 0).is_none());
        assert!(SFloat::from_parts(0, 8).is_none());
    }

    #[test]
    fn glucose_concentration_example() {
        // 120 mg/dL in kg/L is 120e-5
        let v = SFloat::from_parts(120, -5).unwrap();
        assert_eq!(v.raw(), 0xB078);
    }
}
