//! Per-device state held by the registry

use serde::{Deserialize, Serialize};

use crate::codec::RacpOpcode;
use crate::types::{AddressType, BdAddr, ClientConfiguration, ConnectionId, Handle};

// ----------------------------------------------------------------------------
// Device Flags
// ----------------------------------------------------------------------------

/// Independent status bits of a device record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceFlags(u8);

impl DeviceFlags {
    pub const NONE: Self = Self(0x00);

    /// Long term key exchanged during pairing is valid
    pub const LTK_VALID: Self = Self(0x01);

    /// Link is currently encrypted
    pub const LINK_ENCRYPTED: Self = Self(0x02);

    pub const DISCOVERY_OUTSTANDING: Self = Self(0x04);
    pub const DISCOVERY_COMPLETE: Self = Self(0x08);

    /// The peer has a RACP procedure running on the local server
    pub const RACP_OUTSTANDING: Self = Self(0x10);

    /// An Abort Operation written to the peer has not been answered yet
    pub const ABORT_OUTSTANDING: Self = Self(0x20);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

// ----------------------------------------------------------------------------
// Discovered Handles
// ----------------------------------------------------------------------------

/// Glucose Service handles discovered on a remote server.
///
/// Zero means "not discovered".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlsClientHandles {
    pub measurement: Handle,
    pub measurement_cccd: Handle,
    pub measurement_context: Handle,
    pub measurement_context_cccd: Handle,
    pub feature: Handle,
    pub racp: Handle,
    pub racp_cccd: Handle,
}

impl GlsClientHandles {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisHandles {
    pub manufacturer_name: Handle,
    pub model_number: Handle,
    pub serial_number: Handle,
    pub hardware_revision: Handle,
    pub firmware_revision: Handle,
    pub software_revision: Handle,
    pub system_id: Handle,
    pub ieee_certification: Handle,
    pub pnp_id: Handle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GapsHandles {
    pub device_name: Handle,
    pub appearance: Handle,
}

// ----------------------------------------------------------------------------
// Server Configuration
// ----------------------------------------------------------------------------

/// Client Characteristic Configuration values a remote client wrote to the
/// local Glucose Service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlsServerConfig {
    pub measurement: ClientConfiguration,
    pub measurement_context: ClientConfiguration,
    pub racp: ClientConfiguration,
}

/// GLS characteristic that carries a Client Characteristic Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigurableCharacteristic {
    Measurement,
    MeasurementContext,
    Racp,
}

impl ConfigurableCharacteristic {
    pub fn name(self) -> &'static str {
        match self {
            ConfigurableCharacteristic::Measurement => "glucose measurement",
            ConfigurableCharacteristic::MeasurementContext => "measurement context",
            ConfigurableCharacteristic::Racp => "record access control point",
        }
    }
}

impl GlsServerConfig {
    pub fn get(&self, characteristic: ConfigurableCharacteristic) -> ClientConfiguration {
        match characteristic {
            ConfigurableCharacteristic::Measurement => self.measurement,
            ConfigurableCharacteristic::MeasurementContext => self.measurement_context,
            ConfigurableCharacteristic::Racp => self.racp,
        }
    }

    pub fn set(&mut self, characteristic: ConfigurableCharacteristic, value: ClientConfiguration) {
        match characteristic {
            ConfigurableCharacteristic::Measurement => self.measurement = value,
            ConfigurableCharacteristic::MeasurementContext => self.measurement_context = value,
            ConfigurableCharacteristic::Racp => self.racp = value,
        }
    }
}

// ----------------------------------------------------------------------------
// Device Record
// ----------------------------------------------------------------------------

/// Everything the profile knows about one remote peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub addr: BdAddr,
    pub addr_type: AddressType,
    /// Present while the link is up
    pub connection: Option<ConnectionId>,
    pub flags: DeviceFlags,
    pub gls: GlsClientHandles,
    pub dis: DisHandles,
    pub gaps: GapsHandles,
    pub server_config: GlsServerConfig,
    /// Request opcode of the RACP procedure this side started as collector
    pub pending_procedure: Option<RacpOpcode>,
}

impl DeviceRecord {
    pub fn new(addr: BdAddr, addr_type: AddressType) -> Self {
        Self {
            addr,
            addr_type,
            connection: None,
            flags: DeviceFlags::NONE,
            gls: GlsClientHandles::default(),
            dis: DisHandles::default(),
            gaps: GapsHandles::default(),
            server_config: GlsServerConfig::default(),
            pending_procedure: None,
        }
    }

    pub fn has(&self, flag: DeviceFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn racp_outstanding(&self) -> bool {
        self.has(DeviceFlags::RACP_OUTSTANDING)
    }

    pub fn discovery_outstanding(&self) -> bool {
        self.has(DeviceFlags::DISCOVERY_OUTSTANDING)
    }

    /// Remote CCCD handle for a configurable GLS characteristic
    pub fn cccd_handle(&self, characteristic: ConfigurableCharacteristic) -> Handle {
        match characteristic {
            ConfigurableCharacteristic::Measurement => self.gls.measurement_cccd,
            ConfigurableCharacteristic::MeasurementContext => self.gls.measurement_context_cccd,
            ConfigurableCharacteristic::Racp => self.gls.racp_cccd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent() {
        let mut flags = DeviceFlags::NONE;
        flags.insert(DeviceFlags::LINK_ENCRYPTED);
        flags.insert(DeviceFlags::RACP_OUTSTANDING);
        flags.remove(DeviceFlags::LINK_ENCRYPTED);
        assert!(flags.contains(DeviceFlags::RACP_OUTSTANDING));
        assert!(!flags.contains(DeviceFlags::LINK_ENCRYPTED));
        assert_eq!(flags.as_u8(), 0x10);
    }

    #[test]
    fn new_record_is_zeroed() {
        let record = DeviceRecord::new(BdAddr::new([1, 2, 3, 4, 5, 6]), AddressType::Random);
        assert!(record.gls.is_empty());
        assert!(!record.is_connected());
        assert_eq!(record.flags, DeviceFlags::NONE);
        assert_eq!(record.cccd_handle(ConfigurableCharacteristic::Racp), 0);
    }

    #[test]
    fn server_config_per_characteristic() {
        let mut config = GlsServerConfig::default();
        config.set(ConfigurableCharacteristic::Racp, ClientConfiguration::INDICATE);
        assert!(config.get(ConfigurableCharacteristic::Racp).indicate_enabled());
        assert!(!config
            .get(ConfigurableCharacteristic::Measurement)
            .notify_enabled());
    }
}
