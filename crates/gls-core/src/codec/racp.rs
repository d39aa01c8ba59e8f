//! Record Access Control Point command and response
//!
//! Commands are `opcode, operator, operand`. The operand is present only for
//! the comparison operators and starts with a filter type byte followed by
//! one value (`<=`, `>=`) or two values (range).

use core::fmt;
use serde::{Deserialize, Serialize};

use super::cursor::{Reader, Writer};
use super::datetime::DateTime;
use crate::{GlsError, ProfileError, Result};

// ----------------------------------------------------------------------------
// Opcodes and Operators
// ----------------------------------------------------------------------------

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RacpOpcode {
    ReportStoredRecords = 0x01,
    DeleteStoredRecords = 0x02,
    AbortOperation = 0x03,
    ReportNumberOfStoredRecords = 0x04,
    NumberOfStoredRecordsResponse = 0x05,
    ResponseCode = 0x06,
}

impl RacpOpcode {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(RacpOpcode::ReportStoredRecords),
            0x02 => Ok(RacpOpcode::DeleteStoredRecords),
            0x03 => Ok(RacpOpcode::AbortOperation),
            0x04 => Ok(RacpOpcode::ReportNumberOfStoredRecords),
            0x05 => Ok(RacpOpcode::NumberOfStoredRecordsResponse),
            0x06 => Ok(RacpOpcode::ResponseCode),
            other => Err(GlsError::invalid_value(format!(
                "unknown RACP opcode 0x{:02X}",
                other
            ))),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Opcodes a client may write to the control point
    pub fn is_request(self) -> bool {
        matches!(
            self,
            RacpOpcode::ReportStoredRecords
                | RacpOpcode::DeleteStoredRecords
                | RacpOpcode::AbortOperation
                | RacpOpcode::ReportNumberOfStoredRecords
        )
    }
}

impl fmt::Display for RacpOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RacpOpcode::ReportStoredRecords => "Report Stored Records",
            RacpOpcode::DeleteStoredRecords => "Delete Stored Records",
            RacpOpcode::AbortOperation => "Abort Operation",
            RacpOpcode::ReportNumberOfStoredRecords => "Report Number Of Stored Records",
            RacpOpcode::NumberOfStoredRecordsResponse => "Number Of Stored Records Response",
            RacpOpcode::ResponseCode => "Response Code",
        };
        write!(f, "{}", name)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RacpOperator {
    Null = 0x00,
    AllRecords = 0x01,
    LessThanOrEqualTo = 0x02,
    GreaterThanOrEqualTo = 0x03,
    WithinRangeOf = 0x04,
    FirstRecord = 0x05,
    LastRecord = 0x06,
}

impl RacpOperator {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(RacpOperator::Null),
            0x01 => Ok(RacpOperator::AllRecords),
            0x02 => Ok(RacpOperator::LessThanOrEqualTo),
            0x03 => Ok(RacpOperator::GreaterThanOrEqualTo),
            0x04 => Ok(RacpOperator::WithinRangeOf),
            0x05 => Ok(RacpOperator::FirstRecord),
            0x06 => Ok(RacpOperator::LastRecord),
            other => Err(GlsError::invalid_value(format!(
                "unknown RACP operator 0x{:02X}",
                other
            ))),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Number of filter values the operator carries
    pub fn operand_values(self) -> usize {
        match self {
            RacpOperator::LessThanOrEqualTo | RacpOperator::GreaterThanOrEqualTo => 1,
            RacpOperator::WithinRangeOf => 2,
            _ => 0,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    SequenceNumber = 0x01,
    UserFacingTime = 0x02,
}

impl FilterType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(FilterType::SequenceNumber),
            0x02 => Ok(FilterType::UserFacingTime),
            other => Err(GlsError::invalid_value(format!(
                "unknown RACP filter type 0x{:02X}",
                other
            ))),
        }
    }
}

// ----------------------------------------------------------------------------
// Operand
// ----------------------------------------------------------------------------

/// Filter values following the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RacpOperand {
    None,
    SequenceNumber(u16),
    UserFacingTime(DateTime),
    SequenceNumberRange { min: u16, max: u16 },
    UserFacingTimeRange { min: DateTime, max: DateTime },
}

impl RacpOperand {
    fn value_count(&self) -> usize {
        match self {
            RacpOperand::None => 0,
            RacpOperand::SequenceNumber(_) | RacpOperand::UserFacingTime(_) => 1,
            RacpOperand::SequenceNumberRange { .. } | RacpOperand::UserFacingTimeRange { .. } => 2,
        }
    }

    fn filter_type(&self) -> Option<FilterType> {
        match self {
            RacpOperand::None => None,
            RacpOperand::SequenceNumber(_) | RacpOperand::SequenceNumberRange { .. } => {
                Some(FilterType::SequenceNumber)
            }
            RacpOperand::UserFacingTime(_) | RacpOperand::UserFacingTimeRange { .. } => {
                Some(FilterType::UserFacingTime)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Command
// ----------------------------------------------------------------------------

/// A request written to the Record Access Control Point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RacpCommand {
    pub opcode: RacpOpcode,
    pub operator: RacpOperator,
    pub operand: RacpOperand,
}

impl RacpCommand {
    pub fn new(opcode: RacpOpcode, operator: RacpOperator, operand: RacpOperand) -> Self {
        Self {
            opcode,
            operator,
            operand,
        }
    }

    pub fn abort() -> Self {
        Self::new(RacpOpcode::AbortOperation, RacpOperator::Null, RacpOperand::None)
    }

    pub fn report_all() -> Self {
        Self::new(
            RacpOpcode::ReportStoredRecords,
            RacpOperator::AllRecords,
            RacpOperand::None,
        )
    }

    pub fn is_abort(&self) -> bool {
        self.opcode == RacpOpcode::AbortOperation
    }

    /// Check that the command is one a collector may send
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| GlsError::Profile(ProfileError::InvalidProcedure { reason });

        if !self.opcode.is_request() {
            return Err(invalid(format!("{} is not a request opcode", self.opcode)));
        }
        if self.is_abort() != (self.operator == RacpOperator::Null) {
            return Err(invalid(format!(
                "{} cannot use operator {:?}",
                self.opcode, self.operator
            )));
        }
        if self.operator.operand_values() != self.operand.value_count() {
            return Err(invalid(format!(
                "operator {:?} does not match operand {:?}",
                self.operator, self.operand
            )));
        }

        match self.operand {
            RacpOperand::SequenceNumberRange { min, max } if min > max => {
                Err(invalid(format!("sequence range {}..{} is inverted", min, max)))
            }
            RacpOperand::UserFacingTime(t) => t.validate(),
            RacpOperand::UserFacingTimeRange { min, max } => {
                min.validate()?;
                max.validate()?;
                if min > max {
                    return Err(invalid(format!("time range {}..{} is inverted", min, max)));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(2 + 1 + 14);
        w.u8(self.opcode.as_u8()).u8(self.operator.as_u8());

        if let Some(filter) = self.operand.filter_type() {
            w.u8(filter as u8);
        }
        match self.operand {
            RacpOperand::None => {}
            RacpOperand::SequenceNumber(seq) => {
                w.u16(seq);
            }
            RacpOperand::UserFacingTime(t) => t.write(&mut w),
            RacpOperand::SequenceNumberRange { min, max } => {
                w.u16(min).u16(max);
            }
            RacpOperand::UserFacingTimeRange { min, max } => {
                min.write(&mut w);
                max.write(&mut w);
            }
        }
        w.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        r.require(2)?;

        let opcode = RacpOpcode::from_u8(r.u8()?)?;
        let operator = RacpOperator::from_u8(r.u8()?)?;

        let operand = match operator.operand_values() {
            0 => RacpOperand::None,
            count => {
                let filter = FilterType::from_u8(r.u8()?)?;
                match (filter, count) {
                    (FilterType::SequenceNumber, 1) => RacpOperand::SequenceNumber(r.u16()?),
                    (FilterType::UserFacingTime, 1) => {
                        RacpOperand::UserFacingTime(DateTime::read(&mut r)?)
                    }
                    (FilterType::SequenceNumber, _) => RacpOperand::SequenceNumberRange {
                        min: r.u16()?,
                        max: r.u16()?,
                    },
                    (FilterType::UserFacingTime, _) => RacpOperand::UserFacingTimeRange {
                        min: DateTime::read(&mut r)?,
                        max: DateTime::read(&mut r)?,
                    },
                }
            }
        };

        if r.remaining() != 0 {
            return Err(GlsError::invalid_value(format!(
                "{} trailing bytes after RACP operand",
                r.remaining()
            )));
        }

        Ok(Self {
            opcode,
            operator,
            operand,
        })
    }
}

impl fmt::Display for RacpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {:?}", self.opcode, self.operator)?;
        match self.operand {
            RacpOperand::None => Ok(()),
            RacpOperand::SequenceNumber(seq) => write!(f, " seq {}", seq),
            RacpOperand::UserFacingTime(t) => write!(f, " time {}", t),
            RacpOperand::SequenceNumberRange { min, max } => write!(f, " seq {}..={}", min, max),
            RacpOperand::UserFacingTimeRange { min, max } => write!(f, " time {} .. {}", min, max),
        }
    }
}

// ----------------------------------------------------------------------------
// Response
// ----------------------------------------------------------------------------

/// Result code carried by a Response Code indication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RacpResponseCode {
    Success,
    OpcodeNotSupported,
    InvalidOperator,
    OperatorNotSupported,
    InvalidOperand,
    NoRecordsFound,
    AbortUnsuccessful,
    ProcedureNotCompleted,
    OperandNotSupported,
    Reserved(u8),
}

impl RacpResponseCode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => RacpResponseCode::Success,
            0x02 => RacpResponseCode::OpcodeNotSupported,
            0x03 => RacpResponseCode::InvalidOperator,
            0x04 => RacpResponseCode::OperatorNotSupported,
            0x05 => RacpResponseCode::InvalidOperand,
            0x06 => RacpResponseCode::NoRecordsFound,
            0x07 => RacpResponseCode::AbortUnsuccessful,
            0x08 => RacpResponseCode::ProcedureNotCompleted,
            0x09 => RacpResponseCode::OperandNotSupported,
            other => RacpResponseCode::Reserved(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            RacpResponseCode::Success => 0x01,
            RacpResponseCode::OpcodeNotSupported => 0x02,
            RacpResponseCode::InvalidOperator => 0x03,
            RacpResponseCode::OperatorNotSupported => 0x04,
            RacpResponseCode::InvalidOperand => 0x05,
            RacpResponseCode::NoRecordsFound => 0x06,
            RacpResponseCode::AbortUnsuccessful => 0x07,
            RacpResponseCode::ProcedureNotCompleted => 0x08,
            RacpResponseCode::OperandNotSupported => 0x09,
            RacpResponseCode::Reserved(v) => v,
        }
    }
}

/// An indication from the Record Access Control Point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RacpResponse {
    NumberOfStoredRecords(u16),
    ResponseCode {
        request_opcode: RacpOpcode,
        code: RacpResponseCode,
    },
}

impl RacpResponse {
    pub fn encode(&self) -> [u8; 4] {
        match *self {
            RacpResponse::NumberOfStoredRecords(count) => {
                let c = count.to_le_bytes();
                [
                    RacpOpcode::NumberOfStoredRecordsResponse.as_u8(),
                    RacpOperator::Null.as_u8(),
                    c[0],
                    c[1],
                ]
            }
            RacpResponse::ResponseCode {
                request_opcode,
                code,
            } => [
                RacpOpcode::ResponseCode.as_u8(),
                RacpOperator::Null.as_u8(),
                request_opcode.as_u8(),
                code.as_u8(),
            ],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        r.require(4)?;

        let opcode = RacpOpcode::from_u8(r.u8()?)?;
        let _operator = r.u8()?;

        match opcode {
            RacpOpcode::NumberOfStoredRecordsResponse => {
                Ok(RacpResponse::NumberOfStoredRecords(r.u16()?))
            }
            RacpOpcode::ResponseCode => Ok(RacpResponse::ResponseCode {
                request_opcode: RacpOpcode::from_u8(r.u8()?)?,
                code: RacpResponseCode::from_u8(r.u8()?),
            }),
            other => Err(GlsError::invalid_value(format!(
                "{} is not a RACP response opcode",
                other
            ))),
        }
    }
}

impl fmt::Display for RacpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RacpResponse::NumberOfStoredRecords(count) => {
                write!(f, "number of stored records: {}", count)
            }
            RacpResponse::ResponseCode {
                request_opcode,
                code,
            } => write!(f, "{}: {:?}", request_opcode, code),
        }
    }
}
