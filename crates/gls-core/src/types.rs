//! Core types for the GLS profile
//!
//! Newtypes for Bluetooth addresses, GATT identifiers and client
//! configuration values, plus the typed correlation token carried by every
//! outstanding request.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::uuids;
use crate::{GlsError, RegistryError};

// ----------------------------------------------------------------------------
// Bluetooth Device Address
// ----------------------------------------------------------------------------

/// 48-bit Bluetooth device address, stored most significant byte first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    /// Create an address from its six bytes (most significant first)
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// All-zero address, never valid for a remote device
    pub const ZERO: Self = Self([0; 6]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for BdAddr {
    type Err = GlsError;

    /// Accepts `AA:BB:CC:DD:EE:FF`, `AA-BB-..` or twelve bare hex digits,
    /// with an optional `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let clean: String = trimmed
            .strip_prefix("0x")
            .unwrap_or(trimmed)
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();

        let bytes = hex::decode(&clean).map_err(|_| RegistryError::InvalidAddress {
            input: s.to_string(),
        })?;

        let bytes: [u8; 6] = bytes.try_into().map_err(|_| RegistryError::InvalidAddress {
            input: s.to_string(),
        })?;

        Ok(Self(bytes))
    }
}

/// Bluetooth LE address type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AddressType {
    #[default]
    Public,
    Random,
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public => write!(f, "public"),
            AddressType::Random => write!(f, "random"),
        }
    }
}

// ----------------------------------------------------------------------------
// GATT Identifiers
// ----------------------------------------------------------------------------

/// Attribute handle within a GATT database
pub type Handle = u16;

/// Connection identifier assigned by the GATT layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction identifier returned by a GATT request.
///
/// Only meaningful for cancelling the request; responses are correlated by
/// [`CorrelationToken`], never by transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub u32);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 16-bit Bluetooth SIG assigned UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uuid16(pub u16);

impl fmt::Display for Uuid16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Client Characteristic Configuration
// ----------------------------------------------------------------------------

/// Value of a Client Characteristic Configuration Descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ClientConfiguration(u16);

impl ClientConfiguration {
    /// Notifications and indications disabled
    pub const NONE: Self = Self(0x0000);

    /// Notifications enabled
    pub const NOTIFY: Self = Self(0x0001);

    /// Indications enabled
    pub const INDICATE: Self = Self(0x0002);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn notify_enabled(self) -> bool {
        (self.0 & Self::NOTIFY.0) != 0
    }

    pub const fn indicate_enabled(self) -> bool {
        (self.0 & Self::INDICATE.0) != 0
    }

    /// Little-endian descriptor value as written over the air
    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for ClientConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.notify_enabled(), self.indicate_enabled()) {
            (false, false) => write!(f, "disabled"),
            (true, false) => write!(f, "notify"),
            (false, true) => write!(f, "indicate"),
            (true, true) => write!(f, "notify+indicate"),
        }
    }
}

// ----------------------------------------------------------------------------
// Correlation
// ----------------------------------------------------------------------------

/// Service family targeted by a discovery request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryKind {
    /// Glucose Service
    Gls,
    /// Device Information Service
    Dis,
    /// Generic Access Profile Service
    Gaps,
}

impl DiscoveryKind {
    /// Primary service UUID used as the discovery filter
    pub fn service_uuid(self) -> Uuid16 {
        match self {
            DiscoveryKind::Gls => uuids::GLUCOSE_SERVICE,
            DiscoveryKind::Dis => uuids::DEVICE_INFORMATION_SERVICE,
            DiscoveryKind::Gaps => uuids::GENERIC_ACCESS_SERVICE,
        }
    }
}

impl fmt::Display for DiscoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryKind::Gls => write!(f, "GLS"),
            DiscoveryKind::Dis => write!(f, "DIS"),
            DiscoveryKind::Gaps => write!(f, "GAPS"),
        }
    }
}

impl FromStr for DiscoveryKind {
    type Err = GlsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GLS" => Ok(DiscoveryKind::Gls),
            "DIS" => Ok(DiscoveryKind::Dis),
            "GAP" | "GAPS" => Ok(DiscoveryKind::Gaps),
            _ => Err(GlsError::invalid_parameter(format!(
                "unknown discovery kind: {}",
                s
            ))),
        }
    }
}

/// Opaque value echoed back by the GATT layer with each response.
///
/// Typed so a discovery tag can never be mistaken for an attribute handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrelationToken {
    /// Outstanding service discovery of the given kind
    Discovery(DiscoveryKind),
    /// Outstanding read or write against the given attribute handle
    Attribute(Handle),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bd_addr_parses_colon_and_bare_forms() {
        let a: BdAddr = "00:1B:DC:05:B5:B3".parse().unwrap();
        let b: BdAddr = "001bdc05b5b3".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "00:1B:DC:05:B5:B3");
    }

    #[test]
    fn bd_addr_rejects_wrong_length() {
        assert!("00:1B:DC".parse::<BdAddr>().is_err());
        assert!("zz1bdc05b5b3".parse::<BdAddr>().is_err());
    }

    #[test]
    fn client_configuration_bits() {
        let both = ClientConfiguration::new(0x0003);
        assert!(both.notify_enabled());
        assert!(both.indicate_enabled());
        assert!(!ClientConfiguration::NOTIFY.indicate_enabled());
        assert_eq!(ClientConfiguration::INDICATE.to_le_bytes(), [0x02, 0x00]);
    }

    #[test]
    fn discovery_kind_maps_to_service_uuid() {
        assert_eq!(DiscoveryKind::Gls.service_uuid(), Uuid16(0x1808));
        assert_eq!("gaps".parse::<DiscoveryKind>().unwrap(), DiscoveryKind::Gaps);
        assert!("hrs".parse::<DiscoveryKind>().is_err());
    }
}
