//! Glucose Measurement characteristic
//!
//! Wire layout: flags (1), sequence number (2), base time (7), then in order
//! and only when flagged: time offset (2), concentration with type and sample
//! location (3), sensor status annunciation (2).

use core::fmt;
use serde::{Deserialize, Serialize};

use super::cursor::{Reader, Writer};
use super::datetime::{DateTime, DATE_TIME_SIZE};
use super::sfloat::SFloat;
use crate::Result;

/// Flags, sequence number and base time
pub const MEASUREMENT_HEADER_SIZE: usize = 1 + 2 + DATE_TIME_SIZE;

/// Time offset value reported when the offset has overrun
pub const TIME_OFFSET_OVERRUN: i16 = 0x7FFF;
/// Time offset value reported when the offset has underrun
pub const TIME_OFFSET_UNDERRUN: i16 = i16::MIN;

// ----------------------------------------------------------------------------
// Flags
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MeasurementFlags(u8);

impl MeasurementFlags {
    pub const NONE: Self = Self(0x00);
    pub const TIME_OFFSET_PRESENT: Self = Self(0x01);
    pub const CONCENTRATION_PRESENT: Self = Self(0x02);
    pub const CONCENTRATION_MOL_PER_LITER: Self = Self(0x04);
    pub const SENSOR_STATUS_PRESENT: Self = Self(0x08);
    pub const CONTEXT_FOLLOWS: Self = Self(0x10);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub const fn has_time_offset(self) -> bool {
        (self.0 & Self::TIME_OFFSET_PRESENT.0) != 0
    }

    pub const fn has_concentration(self) -> bool {
        (self.0 & Self::CONCENTRATION_PRESENT.0) != 0
    }

    pub const fn is_mol_per_liter(self) -> bool {
        (self.0 & Self::CONCENTRATION_MOL_PER_LITER.0) != 0
    }

    pub const fn has_sensor_status(self) -> bool {
        (self.0 & Self::SENSOR_STATUS_PRESENT.0) != 0
    }

    pub const fn context_follows(self) -> bool {
        (self.0 & Self::CONTEXT_FOLLOWS.0) != 0
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

// ----------------------------------------------------------------------------
// Field Types
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConcentrationUnits {
    /// kg/L
    KilogramPerLiter,
    /// mol/L
    MolPerLiter,
}

impl fmt::Display for ConcentrationUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcentrationUnits::KilogramPerLiter => write!(f, "kg/L"),
            ConcentrationUnits::MolPerLiter => write!(f, "mol/L"),
        }
    }
}

/// Fluid type of the sample (low nibble of the packed byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    CapillaryWholeBlood,
    CapillaryPlasma,
    VenousWholeBlood,
    VenousPlasma,
    ArterialWholeBlood,
    ArterialPlasma,
    UndeterminedWholeBlood,
    UndeterminedPlasma,
    InterstitialFluid,
    ControlSolution,
    Reserved(u8),
}

impl SampleType {
    pub fn from_nibble(value: u8) -> Self {
        match value & 0x0F {
            0x01 => SampleType::CapillaryWholeBlood,
            0x02 => SampleType::CapillaryPlasma,
            0x03 => SampleType::VenousWholeBlood,
            0x04 => SampleType::VenousPlasma,
            0x05 => SampleType::ArterialWholeBlood,
            0x06 => SampleType::ArterialPlasma,
            0x07 => SampleType::UndeterminedWholeBlood,
            0x08 => SampleType::UndeterminedPlasma,
            0x09 => SampleType::InterstitialFluid,
            0x0A => SampleType::ControlSolution,
            other => SampleType::Reserved(other),
        }
    }

    pub fn as_nibble(self) -> u8 {
        match self {
            SampleType::CapillaryWholeBlood => 0x01,
            SampleType::CapillaryPlasma => 0x02,
            SampleType::VenousWholeBlood => 0x03,
            SampleType::VenousPlasma => 0x04,
            SampleType::ArterialWholeBlood => 0x05,
            SampleType::ArterialPlasma => 0x06,
            SampleType::UndeterminedWholeBlood => 0x07,
            SampleType::UndeterminedPlasma => 0x08,
            SampleType::InterstitialFluid => 0x09,
            SampleType::ControlSolution => 0x0A,
            SampleType::Reserved(v) => v & 0x0F,
        }
    }
}

/// Where the sample was taken (high nibble of the packed byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleLocation {
    Finger,
    AlternateSiteTest,
    Earlobe,
    ControlSolution,
    NotAvailable,
    Reserved(u8),
}

impl SampleLocation {
    pub fn from_nibble(value: u8) -> Self {
        match value & 0x0F {
            0x01 => SampleLocation::Finger,
            0x02 => SampleLocation::AlternateSiteTest,
            0x03 => SampleLocation::Earlobe,
            0x04 => SampleLocation::ControlSolution,
            0x0F => SampleLocation::NotAvailable,
            other => SampleLocation::Reserved(other),
        }
    }

    pub fn as_nibble(self) -> u8 {
        match self {
            SampleLocation::Finger => 0x01,
            SampleLocation::AlternateSiteTest => 0x02,
            SampleLocation::Earlobe => 0x03,
            SampleLocation::ControlSolution => 0x04,
            SampleLocation::NotAvailable => 0x0F,
            SampleLocation::Reserved(v) => v & 0x0F,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlucoseConcentration {
    pub value: SFloat,
    pub sample_type: SampleType,
    pub sample_location: SampleLocation,
}

/// Sensor status annunciation bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SensorStatus(u16);

impl SensorStatus {
    pub const BATTERY_LOW: Self = Self(0x0001);
    pub const SENSOR_MALFUNCTION: Self = Self(0x0002);
    pub const SAMPLE_SIZE_INSUFFICIENT: Self = Self(0x0004);
    pub const STRIP_INSERTION_ERROR: Self = Self(0x0008);
    pub const STRIP_TYPE_INCORRECT: Self = Self(0x0010);
    pub const RESULT_TOO_HIGH: Self = Self(0x0020);
    pub const RESULT_TOO_LOW: Self = Self(0x0040);
    pub const TEMPERATURE_TOO_HIGH: Self = Self(0x0080);
    pub const TEMPERATURE_TOO_LOW: Self = Self(0x0100);
    pub const READ_INTERRUPTED: Self = Self(0x0200);
    pub const GENERAL_DEVICE_FAULT: Self = Self(0x0400);
    pub const TIME_FAULT: Self = Self(0x0800);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

// ----------------------------------------------------------------------------
// Measurement
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlucoseMeasurement {
    pub sequence_number: u16,
    pub base_time: DateTime,
    /// Minutes relative to the base time
    pub time_offset: Option<i16>,
    pub concentration: Option<GlucoseConcentration>,
    pub units: ConcentrationUnits,
    pub sensor_status: Option<SensorStatus>,
    /// A Measurement Context with the same sequence number follows
    pub context_follows: bool,
}

impl GlucoseMeasurement {
    pub fn new(sequence_number: u16, base_time: DateTime) -> Self {
        Self {
            sequence_number,
            base_time,
            time_offset: None,
            concentration: None,
            units: ConcentrationUnits::KilogramPerLiter,
            sensor_status: None,
            context_follows: false,
        }
    }

    pub fn flags(&self) -> MeasurementFlags {
        let mut flags = MeasurementFlags::NONE;
        if self.time_offset.is_some() {
            flags = flags.with(MeasurementFlags::TIME_OFFSET_PRESENT);
        }
        if self.concentration.is_some() {
            flags = flags.with(MeasurementFlags::CONCENTRATION_PRESENT);
        }
        if self.units == ConcentrationUnits::MolPerLiter {
            flags = flags.with(MeasurementFlags::CONCENTRATION_MOL_PER_LITER);
        }
        if self.sensor_status.is_some() {
            flags = flags.with(MeasurementFlags::SENSOR_STATUS_PRESENT);
        }
        if self.context_follows {
            flags = flags.with(MeasurementFlags::CONTEXT_FOLLOWS);
        }
        flags
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(MEASUREMENT_HEADER_SIZE + 7);
        w.u8(self.flags().as_u8()).u16(self.sequence_number);
        self.base_time.write(&mut w);

        if let Some(offset) = self.time_offset {
            w.i16(offset);
        }
        if let Some(c) = &self.concentration {
            w.u16(c.value.raw())
                .u8(c.sample_type.as_nibble() | (c.sample_location.as_nibble() << 4));
        }
        if let Some(status) = self.sensor_status {
            w.u16(status.as_u16());
        }
        w.finish()
    }

    /// Decode a notification payload.
    ///
    /// Fails with `MalformedData` if the buffer is shorter than the mandatory
    /// header or than any flagged optional field.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        r.require(MEASUREMENT_HEADER_SIZE)?;

        let flags = MeasurementFlags::new(r.u8()?);
        let sequence_number = r.u16()?;
        let base_time = DateTime::read(&mut r)?;

        let time_offset = if flags.has_time_offset() {
            Some(r.i16()?)
        } else {
            None
        };

        let concentration = if flags.has_concentration() {
            let value = SFloat::from_raw(r.u16()?);
            let packed = r.u8()?;
            Some(GlucoseConcentration {
                value,
                sample_type: SampleType::from_nibble(packed),
                sample_location: SampleLocation::from_nibble(packed >> 4),
            })
        } else {
            None
        };

        let sensor_status = if flags.has_sensor_status() {
            Some(SensorStatus::new(r.u16()?))
        } else {
            None
        };

        Ok(Self {
            sequence_number,
            base_time,
            time_offset,
            concentration,
            units: if flags.is_mol_per_liter() {
                ConcentrationUnits::MolPerLiter
            } else {
                ConcentrationUnits::KilogramPerLiter
            },
            sensor_status,
            context_follows: flags.context_follows(),
        })
    }
}

impl fmt::Display for GlucoseMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} at {}", self.sequence_number, self.base_time)?;
        match self.time_offset {
            Some(TIME_OFFSET_OVERRUN) => write!(f, " offset overrun")?,
            Some(TIME_OFFSET_UNDERRUN) => write!(f, " offset underrun")?,
            Some(offset) => write!(f, " {:+}min", offset)?,
            None => {}
        }
        if let Some(c) = &self.concentration {
            write!(f, ", {} {}", c.value, self.units)?;
        }
        if let Some(status) = self.sensor_status {
            write!(f, ", status 0x{:04X}", status.as_u16())?;
        }
        if self.context_follows {
            write!(f, ", context follows")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GlsError;

    fn create_test_measurement() -> GlucoseMeasurement {
        GlucoseMeasurement {
            sequence_number: 7,
            base_time: DateTime::new(2014, 2, 10, 8, 15, 0),
            time_offset: Some(-30),
            concentration: Some(GlucoseConcentration {
                value: SFloat::from_parts(95, -5).unwrap(),
                sample_type: SampleType::CapillaryPlasma,
                sample_location: SampleLocation::Finger,
            }),
            units: ConcentrationUnits::KilogramPerLiter,
            sensor_status: Some(SensorStatus::BATTERY_LOW),
            context_follows: true,
        }
    }

    #[test]
    fn test_full_measurement_layout() {
        let bytes = create_test_measurement().encode();
        assert_eq!(bytes.len(), MEASUREMENT_HEADER_SIZE + 2 + 3 + 2);
        assert_eq!(bytes[0], 0x1B);
        assert_eq!(&bytes[1..3], &[0x07, 0x00]);
        // type in low nibble, location in high nibble
        assert_eq!(bytes[14], 0x12);
        assert_eq!(GlucoseMeasurement::decode(&bytes).unwrap(), create_test_measurement());
    }

    #[test]
    fn test_header_only_measurement() {
        let m = GlucoseMeasurement::new(1, DateTime::default());
        let bytes = m.encode();
        assert_eq!(bytes.len(), MEASUREMENT_HEADER_SIZE);
        assert_eq!(GlucoseMeasurement::decode(&bytes).unwrap(), m);
    }

    #[test]
    fn test_short_header_is_malformed() {
        let err = GlucoseMeasurement::decode(&[0x00, 0x01, 0x00, 0xDE]).unwrap_err();
        assert_eq!(err, GlsError::malformed(MEASUREMENT_HEADER_SIZE, 4));
    }

    #[test]
    fn test_truncated_optional_field_is_malformed() {
        let mut bytes = create_test_measurement().encode();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            GlucoseMeasurement::decode(&bytes),
            Err(GlsError::Profile(crate::ProfileError::MalformedData { .. }))
        ));
    }

    #[test]
    fn test_offset_overrun_display() {
        let mut m = GlucoseMeasurement::new(3, DateTime::default());
        m.time_offset = Some(TIME_OFFSET_OVERRUN);
        assert!(m.to_string().contains("overrun"));
    }
}
