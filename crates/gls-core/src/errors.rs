//! Error types for the GLS profile core
//!
//! Three layers of failure are kept apart: transport errors reported by the
//! external GATT layer as negative codes, protocol errors received from the
//! peer as ATT Error Responses, and profile-logic errors raised by this crate.

use crate::att::AttErrorReport;
use crate::types::{BdAddr, Handle};

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failure returned synchronously by a GATT layer request primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("GATT layer not initialized")]
    NotInitialized,
    #[error("insufficient resources")]
    InsufficientResources,
    #[error("invalid attribute handle")]
    InvalidHandle,
    #[error("invalid connection id")]
    InvalidConnectionId,
    #[error("invalid transaction id")]
    InvalidTransactionId,
    #[error("a request is already outstanding on this connection")]
    RequestOutstanding,
    #[error("transport error code {code}")]
    Other { code: i32 },
}

impl TransportError {
    /// Negative numeric code reported to the operator
    pub fn code(&self) -> i32 {
        match self {
            TransportError::InvalidParameter => -1,
            TransportError::NotInitialized => -2,
            TransportError::InsufficientResources => -3,
            TransportError::InvalidHandle => -4,
            TransportError::InvalidConnectionId => -5,
            TransportError::InvalidTransactionId => -6,
            TransportError::RequestOutstanding => -7,
            TransportError::Other { code } => *code,
        }
    }

    /// Map a raw negative code back to a typed error
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => TransportError::InvalidParameter,
            -2 => TransportError::NotInitialized,
            -3 => TransportError::InsufficientResources,
            -4 => TransportError::InvalidHandle,
            -5 => TransportError::InvalidConnectionId,
            -6 => TransportError::InvalidTransactionId,
            -7 => TransportError::RequestOutstanding,
            other => TransportError::Other { code: other },
        }
    }
}

// ----------------------------------------------------------------------------
// Registry Errors
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no device record for {addr}")]
    DeviceNotFound { addr: BdAddr },
    #[error("device record for {addr} already exists")]
    DeviceAlreadyExists { addr: BdAddr },
    #[error("device {addr} is not connected")]
    NotConnected { addr: BdAddr },
    #[error("invalid Bluetooth address: {input}")]
    InvalidAddress { input: String },
}

// ----------------------------------------------------------------------------
// Profile Errors
// ----------------------------------------------------------------------------

/// Errors raised by the profile logic itself
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("RACP procedure already in progress for {addr}")]
    ProcedureAlreadyInProgress { addr: BdAddr },
    #[error("client characteristic configuration improperly configured for {addr}")]
    CharacteristicConfigurationImproperlyConfigured { addr: BdAddr },
    #[error("malformed data: expected at least {expected} bytes, got {actual}")]
    MalformedData { expected: usize, actual: usize },
    #[error("invalid field value: {reason}")]
    InvalidValue { reason: String },
    #[error("service discovery already outstanding for {addr}")]
    DiscoveryOutstanding { addr: BdAddr },
    #[error("no RACP procedure outstanding for {addr}")]
    NoRacpOutstanding { addr: BdAddr },
    #[error("RACP abort already outstanding for {addr}")]
    AbortOutstanding { addr: BdAddr },
    #[error("client {addr} is not subscribed")]
    ClientNotSubscribed { addr: BdAddr },
    #[error("attribute not discovered on {addr}: {attribute}")]
    AttributeNotDiscovered { addr: BdAddr, attribute: &'static str },
    #[error("invalid RACP procedure: {reason}")]
    InvalidProcedure { reason: String },
}

// ----------------------------------------------------------------------------
// Unified Error
// ----------------------------------------------------------------------------

/// Core error type for the GLS profile
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GlsError {
    #[error("Transport error: {0} (code {})", .0.code())]
    Transport(#[from] TransportError),

    #[error("Protocol error on handle 0x{handle:04X}: {report}")]
    Protocol { handle: Handle, report: AttErrorReport },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl GlsError {
    pub fn invalid_parameter<T: Into<String>>(reason: T) -> Self {
        GlsError::InvalidParameter {
            reason: reason.into(),
        }
    }

    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        GlsError::Configuration {
            reason: reason.into(),
        }
    }

    pub fn malformed(expected: usize, actual: usize) -> Self {
        GlsError::Profile(ProfileError::MalformedData { expected, actual })
    }

    pub fn invalid_value<T: Into<String>>(reason: T) -> Self {
        GlsError::Profile(ProfileError::InvalidValue {
            reason: reason.into(),
        })
    }

    pub fn device_not_found(addr: BdAddr) -> Self {
        GlsError::Registry(RegistryError::DeviceNotFound { addr })
    }

    pub fn not_connected(addr: BdAddr) -> Self {
        GlsError::Registry(RegistryError::NotConnected { addr })
    }

    pub fn not_discovered(addr: BdAddr, attribute: &'static str) -> Self {
        GlsError::Profile(ProfileError::AttributeNotDiscovered { addr, attribute })
    }

    /// Numeric code shown next to the failing operation in the shell
    pub fn code(&self) -> i32 {
        match self {
            GlsError::Transport(e) => e.code(),
            GlsError::Protocol { report, .. } => -(report.code as i32) - 0x100,
            GlsError::Registry(_) => -1100,
            GlsError::Profile(ProfileError::MalformedData { .. }) => -1006,
            GlsError::Profile(ProfileError::ClientNotSubscribed { .. }) => -1008,
            GlsError::Profile(_) => -1200,
            GlsError::InvalidParameter { .. } => -1000,
            GlsError::Configuration { .. } => -1300,
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, GlsError>;
pub type GlsResult<T> = Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_codes_round_trip() {
        for code in -7..=-1 {
            assert_eq!(TransportError::from_code(code).code(), code);
        }
        assert_eq!(
            TransportError::from_code(-42),
            TransportError::Other { code: -42 }
        );
    }

    #[test]
    fn malformed_code_matches_profile_convention() {
        assert_eq!(GlsError::malformed(10, 3).code(), -1006);
        let msg = GlsError::malformed(10, 3).to_string();
        assert!(msg.contains("expected at least 10"));
    }
}
