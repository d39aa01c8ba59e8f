//! Glucose Measurement Context characteristic
//!
//! Wire layout: flags (1), sequence number (2), then in order and only when
//! flagged: extended flags (1), carbohydrate id and value (3), meal (1),
//! tester/health nibbles (1), exercise duration and intensity (3), medication
//! id and value (3), HbA1c (2).

use core::fmt;
use serde::{Deserialize, Serialize};

use super::cursor::{Reader, Writer};
use super::sfloat::SFloat;
use crate::Result;

/// Flags and sequence number
pub const CONTEXT_HEADER_SIZE: usize = 1 + 2;

// ----------------------------------------------------------------------------
// Flags
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContextFlags(u8);

impl ContextFlags {
    pub const NONE: Self = Self(0x00);
    pub const CARBOHYDRATE_PRESENT: Self = Self(0x01);
    pub const MEAL_PRESENT: Self = Self(0x02);
    pub const TESTER_HEALTH_PRESENT: Self = Self(0x04);
    pub const EXERCISE_PRESENT: Self = Self(0x08);
    pub const MEDICATION_PRESENT: Self = Self(0x10);
    pub const MEDICATION_IN_LITERS: Self = Self(0x20);
    pub const HBA1C_PRESENT: Self = Self(0x40);
    pub const EXTENDED_FLAGS_PRESENT: Self = Self(0x80);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

// ----------------------------------------------------------------------------
// Field Codes
// ----------------------------------------------------------------------------

/// Carbohydrate source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CarbohydrateId(pub u8);

impl CarbohydrateId {
    pub const BREAKFAST: Self = Self(1);
    pub const LUNCH: Self = Self(2);
    pub const DINNER: Self = Self(3);
    pub const SNACK: Self = Self(4);
    pub const DRINK: Self = Self(5);
    pub const SUPPER: Self = Self(6);
    pub const BRUNCH: Self = Self(7);
}

/// Relation of the measurement to a meal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Meal(pub u8);

impl Meal {
    pub const PREPRANDIAL: Self = Self(1);
    pub const POSTPRANDIAL: Self = Self(2);
    pub const FASTING: Self = Self(3);
    pub const CASUAL: Self = Self(4);
    pub const BEDTIME: Self = Self(5);
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PREPRANDIAL => write!(f, "preprandial"),
            Self::POSTPRANDIAL => write!(f, "postprandial"),
            Self::FASTING => write!(f, "fasting"),
            Self::CASUAL => write!(f, "casual"),
            Self::BEDTIME => write!(f, "bedtime"),
            Self(other) => write!(f, "meal 0x{:02X}", other),
        }
    }
}

/// Who performed the test and the subject's health, one nibble each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TesterHealth {
    /// Low nibble: 1 self, 2 health care professional, 3 lab test, 0xF n/a
    pub tester: u8,
    /// High nibble: 1 minor issues .. 5 no issues, 0xF n/a
    pub health: u8,
}

impl TesterHealth {
    pub const NOT_AVAILABLE: u8 = 0x0F;

    pub fn from_byte(value: u8) -> Self {
        Self {
            tester: value & 0x0F,
            health: value >> 4,
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.tester & 0x0F) | ((self.health & 0x0F) << 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Carbohydrate {
    pub id: CarbohydrateId,
    /// Grams expressed in kilograms
    pub kilograms: SFloat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exercise {
    /// Seconds, 0xFFFF for overrun
    pub duration: u16,
    /// Percent
    pub intensity: u8,
}

/// Medication kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MedicationId(pub u8);

impl MedicationId {
    pub const RAPID_ACTING_INSULIN: Self = Self(1);
    pub const SHORT_ACTING_INSULIN: Self = Self(2);
    pub const INTERMEDIATE_ACTING_INSULIN: Self = Self(3);
    pub const LONG_ACTING_INSULIN: Self = Self(4);
    pub const PRE_MIXED_INSULIN: Self = Self(5);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MedicationUnits {
    Kilograms,
    Liters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Medication {
    pub id: MedicationId,
    pub value: SFloat,
}

// ----------------------------------------------------------------------------
// Measurement Context
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementContext {
    pub sequence_number: u16,
    pub extended_flags: Option<u8>,
    pub carbohydrate: Option<Carbohydrate>,
    pub meal: Option<Meal>,
    pub tester_health: Option<TesterHealth>,
    pub exercise: Option<Exercise>,
    pub medication: Option<Medication>,
    pub medication_units: MedicationUnits,
    /// Percent
    pub hba1c: Option<SFloat>,
}

impl MeasurementContext {
    pub fn new(sequence_number: u16) -> Self {
        Self {
            sequence_number,
            extended_flags: None,
            carbohydrate: None,
            meal: None,
            tester_health: None,
            exercise: None,
            medication: None,
            medication_units: MedicationUnits::Kilograms,
            hba1c: None,
        }
    }

    pub fn flags(&self) -> ContextFlags {
        let mut flags = ContextFlags::NONE;
        let present = [
            (self.carbohydrate.is_some(), ContextFlags::CARBOHYDRATE_PRESENT),
            (self.meal.is_some(), ContextFlags::MEAL_PRESENT),
            (self.tester_health.is_some(), ContextFlags::TESTER_HEALTH_PRESENT),
            (self.exercise.is_some(), ContextFlags::EXERCISE_PRESENT),
            (self.medication.is_some(), ContextFlags::MEDICATION_PRESENT),
            (
                self.medication_units == MedicationUnits::Liters,
                ContextFlags::MEDICATION_IN_LITERS,
            ),
            (self.hba1c.is_some(), ContextFlags::HBA1C_PRESENT),
            (self.extended_flags.is_some(), ContextFlags::EXTENDED_FLAGS_PRESENT),
        ];
        for (is_set, bit) in present {
            if is_set {
                flags = flags.with(bit);
            }
        }
        flags
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(CONTEXT_HEADER_SIZE + 14);
        w.u8(self.flags().as_u8()).u16(self.sequence_number);

        if let Some(ext) = self.extended_flags {
            w.u8(ext);
        }
        if let Some(c) = self.carbohydrate {
            w.u8(c.id.0).u16(c.kilograms.raw());
        }
        if let Some(meal) = self.meal {
            w.u8(meal.0);
        }
        if let Some(th) = self.tester_health {
            w.u8(th.to_byte());
        }
        if let Some(e) = self.exercise {
            w.u16(e.duration).u8(e.intensity);
        }
        if let Some(m) = self.medication {
            w.u8(m.id.0).u16(m.value.raw());
        }
        if let Some(hba1c) = self.hba1c {
            w.u16(hba1c.raw());
        }
        w.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        r.require(CONTEXT_HEADER_SIZE)?;

        let flags = ContextFlags::new(r.u8()?);
        let mut context = Self::new(r.u16()?);

        if flags.contains(ContextFlags::EXTENDED_FLAGS_PRESENT) {
            context.extended_flags = Some(r.u8()?);
        }
        if flags.contains(ContextFlags::CARBOHYDRATE_PRESENT) {
            context.carbohydrate = Some(Carbohydrate {
                id: CarbohydrateId(r.u8()?),
                kilograms: SFloat::from_raw(r.u16()?),
            });
        }
        if flags.contains(ContextFlags::MEAL_PRESENT) {
            context.meal = Some(Meal(r.u8()?));
        }
        if flags.contains(ContextFlags::TESTER_HEALTH_PRESENT) {
            context.tester_health = Some(TesterHealth::from_byte(r.u8()?));
        }
        if flags.contains(ContextFlags::EXERCISE_PRESENT) {
            context.exercise = Some(Exercise {
                duration: r.u16()?,
                intensity: r.u8()?,
            });
        }
        if flags.contains(ContextFlags::MEDICATION_PRESENT) {
            context.medication = Some(Medication {
                id: MedicationId(r.u8()?),
                value: SFloat::from_raw(r.u16()?),
            });
        }
        if flags.contains(ContextFlags::MEDICATION_IN_LITERS) {
            context.medication_units = MedicationUnits::Liters;
        }
        if flags.contains(ContextFlags::HBA1C_PRESENT) {
            context.hba1c = Some(SFloat::from_raw(r.u16()?));
        }

        Ok(context)
    }
}

impl fmt::Display for MeasurementContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context #{}", self.sequence_number)?;
        if let Some(c) = self.carbohydrate {
            write!(f, ", carbohydrate {} {} kg", c.id.0, c.kilograms)?;
        }
        if let Some(meal) = self.meal {
            write!(f, ", {}", meal)?;
        }
        if let Some(th) = self.tester_health {
            write!(f, ", tester {} health {}", th.tester, th.health)?;
        }
        if let Some(e) = self.exercise {
            write!(f, ", exercise {}s at {}%", e.duration, e.intensity)?;
        }
        if let Some(m) = self.medication {
            let unit = match self.medication_units {
                MedicationUnits::Kilograms => "kg",
                MedicationUnits::Liters => "L",
            };
            write!(f, ", medication {} {} {}", m.id.0, m.value, unit)?;
        }
        if let Some(hba1c) = self.hba1c {
            write!(f, ", HbA1c {}%", hba1c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GlsError;

    #[test]
    fn test_extended_flags_precede_carbohydrate() {
        let mut ctx = MeasurementContext::new(0x0102);
        ctx.extended_flags = Some(0x00);
        ctx.carbohydrate = Some(Carbohydrate {
            id: CarbohydrateId::LUNCH,
            kilograms: SFloat::from_parts(45, -3).unwrap(),
        });
        let bytes = ctx.encode();
        assert_eq!(bytes[0], 0x81);
        assert_eq!(&bytes[1..3], &[0x02, 0x01]);
        assert_eq!(bytes[3], 0x00);
        assert_eq!(bytes[4], 2);
        assert_eq!(MeasurementContext::decode(&bytes).unwrap(), ctx);
    }

    #[test]
    fn test_all_fields_round_trip() {
        let ctx = MeasurementContext {
            sequence_number: 9,
            extended_flags: None,
            carbohydrate: None,
            meal: Some(Meal::FASTING),
            tester_health: Some(TesterHealth {
                tester: 0x01,
                health: 0x05,
            }),
            exercise: Some(Exercise {
                duration: 1800,
                intensity: 60,
            }),
            medication: Some(Medication {
                id: MedicationId::RAPID_ACTING_INSULIN,
                value: SFloat::from_parts(4, -6).unwrap(),
            }),
            medication_units: MedicationUnits::Liters,
            hba1c: Some(SFloat::from_parts(65, -1).unwrap()),
        };
        let bytes = ctx.encode();
        assert_eq!(bytes.len(), CONTEXT_HEADER_SIZE + 1 + 1 + 3 + 3 + 2);
        // tester low nibble, health high nibble
        assert_eq!(bytes[4], 0x51);
        assert_eq!(MeasurementContext::decode(&bytes).unwrap(), ctx);
    }

    #[test]
    fn test_short_context_is_malformed() {
        assert_eq!(
            MeasurementContext::decode(&[0x02, 0x01]).unwrap_err(),
            GlsError::malformed(CONTEXT_HEADER_SIZE, 2)
        );
        // meal flagged but missing
        assert!(MeasurementContext::decode(&[0x02, 0x01, 0x00]).is_err());
    }
}
