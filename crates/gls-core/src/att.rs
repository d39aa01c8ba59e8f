//! ATT Error Response classification
//!
//! Error codes received from the peer are looked up in the standard ATT
//! table first, then against the GLS application error codes, and finally
//! reported as unknown.

use core::fmt;
use serde::Serialize;

// ----------------------------------------------------------------------------
// GLS Application Error Codes
// ----------------------------------------------------------------------------

pub const GLS_ERROR_CODE_SUCCESS: u8 = 0x00;
pub const GLS_ERROR_CODE_PROCEDURE_ALREADY_IN_PROGRESS: u8 = 0x80;
pub const GLS_ERROR_CODE_CHARACTERISTIC_CONFIGURATION_IMPROPERLY_CONFIGURED: u8 = 0x81;

/// Standard ATT error codes, indexed by code
const ATT_ERROR_TABLE: &[(u8, &str)] = &[
    (0x01, "Invalid Handle"),
    (0x02, "Read Not Permitted"),
    (0x03, "Write Not Permitted"),
    (0x04, "Invalid PDU"),
    (0x05, "Insufficient Authentication"),
    (0x06, "Request Not Supported"),
    (0x07, "Invalid Offset"),
    (0x08, "Insufficient Authorization"),
    (0x09, "Prepare Queue Full"),
    (0x0A, "Attribute Not Found"),
    (0x0B, "Attribute Not Long"),
    (0x0C, "Insufficient Encryption Key Size"),
    (0x0D, "Invalid Attribute Value Length"),
    (0x0E, "Unlikely Error"),
    (0x0F, "Insufficient Encryption"),
    (0x10, "Unsupported Group Type"),
    (0x11, "Insufficient Resources"),
];

const INSUFFICIENT_AUTHENTICATION: u8 = 0x05;
const INSUFFICIENT_ENCRYPTION: u8 = 0x0F;

/// Category an ATT error code falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttErrorCategory {
    /// Standard ATT error from the fixed table
    Att(&'static str),
    /// GLS: a RACP procedure is already running on the server
    ProcedureAlreadyInProgress,
    /// GLS: the RACP CCCD is not configured for indications
    CharacteristicConfigurationImproperlyConfigured,
    Unknown,
}

impl AttErrorCategory {
    pub fn classify(code: u8) -> Self {
        if let Some((_, name)) = ATT_ERROR_TABLE.iter().find(|(c, _)| *c == code) {
            return AttErrorCategory::Att(name);
        }

        match code {
            GLS_ERROR_CODE_PROCEDURE_ALREADY_IN_PROGRESS => {
                AttErrorCategory::ProcedureAlreadyInProgress
            }
            GLS_ERROR_CODE_CHARACTERISTIC_CONFIGURATION_IMPROPERLY_CONFIGURED => {
                AttErrorCategory::CharacteristicConfigurationImproperlyConfigured
            }
            _ => AttErrorCategory::Unknown,
        }
    }
}

impl fmt::Display for AttErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttErrorCategory::Att(name) => write!(f, "{}", name),
            AttErrorCategory::ProcedureAlreadyInProgress => {
                write!(f, "Procedure Already In Progress")
            }
            AttErrorCategory::CharacteristicConfigurationImproperlyConfigured => {
                write!(f, "Client Characteristic Configuration Improperly Configured")
            }
            AttErrorCategory::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Classified ATT Error Response received from a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttErrorReport {
    pub code: u8,
    pub category: AttErrorCategory,
}

impl AttErrorReport {
    pub fn from_code(code: u8) -> Self {
        Self {
            code,
            category: AttErrorCategory::classify(code),
        }
    }

    /// Whether the peer requires a paired, encrypted link for this request
    pub fn needs_pairing(&self) -> bool {
        matches!(self.code, INSUFFICIENT_AUTHENTICATION | INSUFFICIENT_ENCRYPTION)
    }
}

impl fmt::Display for AttErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.category, self.code)?;
        if self.needs_pairing() {
            write!(f, ", pairing must be completed first")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_standard_codes_before_profile_codes() {
        assert_eq!(
            AttErrorCategory::classify(0x0A),
            AttErrorCategory::Att("Attribute Not Found")
        );
        assert_eq!(
            AttErrorCategory::classify(0x80),
            AttErrorCategory::ProcedureAlreadyInProgress
        );
        assert_eq!(
            AttErrorCategory::classify(0x81),
            AttErrorCategory::CharacteristicConfigurationImproperlyConfigured
        );
        assert_eq!(AttErrorCategory::classify(0x42), AttErrorCategory::Unknown);
        assert_eq!(AttErrorCategory::classify(0x00), AttErrorCategory::Unknown);
    }

    #[test]
    fn authentication_failures_carry_pairing_hint() {
        let report = AttErrorReport::from_code(0x05);
        assert!(report.needs_pairing());
        assert!(report.to_string().contains("pairing"));
        assert!(!AttErrorReport::from_code(0x01).needs_pairing());
    }

    #[test]
    fn reports_serialize_with_their_category() {
        let report = AttErrorReport::from_code(0x0F);
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["code"], 0x0F);
        assert_eq!(json["category"]["Att"], "Insufficient Encryption");

        let json = serde_json::to_value(AttErrorReport::from_code(0x80)).unwrap();
        assert_eq!(json["category"], "ProcedureAlreadyInProgress");
    }
}
