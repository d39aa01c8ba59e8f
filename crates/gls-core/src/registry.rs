//! Device Registry
//!
//! Owns one [`DeviceRecord`] per remote address. `create` and `delete` are the
//! only operations that add or remove records, so each record stays reachable
//! by exactly one address.

use core::fmt;
use core::str::FromStr;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::device::{DeviceFlags, DeviceRecord};
use crate::types::{AddressType, BdAddr, ConnectionId};
use crate::GlsError;

// ----------------------------------------------------------------------------
// Retention Policy
// ----------------------------------------------------------------------------

/// Decides whether a record survives its link going down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionPolicy {
    /// Keep only devices whose link was encrypted at disconnect
    #[default]
    KeepEncrypted,
    /// Keep devices that are bonded (valid LTK) or were encrypted
    KeepBonded,
    KeepAll,
    DropAll,
}

impl RetentionPolicy {
    pub fn retains(self, flags: DeviceFlags) -> bool {
        match self {
            RetentionPolicy::KeepEncrypted => flags.contains(DeviceFlags::LINK_ENCRYPTED),
            RetentionPolicy::KeepBonded => {
                flags.contains(DeviceFlags::LINK_ENCRYPTED) || flags.contains(DeviceFlags::LTK_VALID)
            }
            RetentionPolicy::KeepAll => true,
            RetentionPolicy::DropAll => false,
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetentionPolicy::KeepEncrypted => "keep-encrypted",
            RetentionPolicy::KeepBonded => "keep-bonded",
            RetentionPolicy::KeepAll => "keep-all",
            RetentionPolicy::DropAll => "drop-all",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RetentionPolicy {
    type Err = GlsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "keep-encrypted" => Ok(RetentionPolicy::KeepEncrypted),
            "keep-bonded" => Ok(RetentionPolicy::KeepBonded),
            "keep-all" => Ok(RetentionPolicy::KeepAll),
            "drop-all" => Ok(RetentionPolicy::DropAll),
            _ => Err(GlsError::invalid_parameter(format!(
                "unknown retention policy: {}",
                s
            ))),
        }
    }
}

/// What `on_disconnected` did with the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Retained,
    Deleted(DeviceRecord),
    UnknownDevice,
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<BdAddr, DeviceRecord>,
    /// 0 for unbounded
    capacity_limit: usize,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(capacity_limit: usize) -> Self {
        Self {
            devices: HashMap::new(),
            capacity_limit,
        }
    }

    pub fn find(&self, addr: &BdAddr) -> Option<&DeviceRecord> {
        self.devices.get(addr)
    }

    pub fn find_mut(&mut self, addr: &BdAddr) -> Option<&mut DeviceRecord> {
        self.devices.get_mut(addr)
    }

    pub fn find_by_connection(&self, connection: ConnectionId) -> Option<&DeviceRecord> {
        self.devices
            .values()
            .find(|record| record.connection == Some(connection))
    }

    /// Insert a zeroed record.
    ///
    /// Returns `false` without side effects if the address is already known
    /// or the registry is full.
    pub fn create(&mut self, addr: BdAddr, addr_type: AddressType) -> bool {
        if self.devices.contains_key(&addr) {
            return false;
        }
        if self.capacity_limit != 0 && self.devices.len() >= self.capacity_limit {
            debug!(%addr, limit = self.capacity_limit, "Registry full, not creating record");
            return false;
        }
        self.devices.insert(addr, DeviceRecord::new(addr, addr_type));
        true
    }

    pub fn delete(&mut self, addr: &BdAddr) -> Option<DeviceRecord> {
        self.devices.remove(addr)
    }

    /// Record a new link, creating the record for an unseen address.
    ///
    /// Returns `false` if the record could not be created.
    pub fn on_connected(
        &mut self,
        addr: BdAddr,
        addr_type: AddressType,
        connection: ConnectionId,
    ) -> bool {
        if self.create(addr, addr_type) {
            debug!(%addr, %connection, "Created device record");
        }
        match self.devices.get_mut(&addr) {
            Some(record) => {
                record.connection = Some(connection);
                record.addr_type = addr_type;
                true
            }
            None => false,
        }
    }

    /// Apply the retention policy to a device whose link went down
    pub fn on_disconnected(&mut self, addr: &BdAddr, policy: RetentionPolicy) -> DisconnectOutcome {
        let Some(record) = self.devices.get_mut(addr) else {
            return DisconnectOutcome::UnknownDevice;
        };

        if policy.retains(record.flags) {
            record.connection = None;
            record.pending_procedure = None;
            record.flags.remove(
                DeviceFlags::LINK_ENCRYPTED
                    .union(DeviceFlags::DISCOVERY_OUTSTANDING)
                    .union(DeviceFlags::RACP_OUTSTANDING)
                    .union(DeviceFlags::ABORT_OUTSTANDING),
            );
            debug!(%addr, %policy, "Retaining device record");
            DisconnectOutcome::Retained
        } else {
            debug!(%addr, %policy, "Deleting device record");
            match self.devices.remove(addr) {
                Some(record) => DisconnectOutcome::Deleted(record),
                None => DisconnectOutcome::UnknownDevice,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Known addresses, sorted for stable display
    pub fn addresses(&self) -> Vec<BdAddr> {
        let mut addrs: Vec<BdAddr> = self.devices.keys().copied().collect();
        addrs.sort();
        addrs
    }

    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> BdAddr {
        BdAddr::new([0x00, 0x1B, 0xDC, 0x00, 0x00, last])
    }

    #[test]
    fn test_create_is_unique() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.create(addr(1), AddressType::Public));
        assert!(!registry.create(addr(1), AddressType::Random));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find(&addr(1)).unwrap().addr_type, AddressType::Public);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.delete(&addr(9)).is_none());
        registry.create(addr(9), AddressType::Public);
        assert!(registry.delete(&addr(9)).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_capacity_limit() {
        let mut registry = DeviceRegistry::with_capacity_limit(1);
        assert!(registry.create(addr(1), AddressType::Public));
        assert!(!registry.create(addr(2), AddressType::Public));
        assert!(!registry.on_connected(addr(2), AddressType::Public, ConnectionId(2)));
        assert!(registry.on_connected(addr(1), AddressType::Public, ConnectionId(1)));
    }

    #[test]
    fn test_find_by_connection() {
        let mut registry = DeviceRegistry::new();
        registry.on_connected(addr(1), AddressType::Public, ConnectionId(7));
        registry.on_connected(addr(2), AddressType::Public, ConnectionId(8));
        assert_eq!(registry.find_by_connection(ConnectionId(8)).unwrap().addr, addr(2));
        assert!(registry.find_by_connection(ConnectionId(9)).is_none());
        assert_eq!(registry.addresses(), vec![addr(1), addr(2)]);
    }

    #[test]
    fn test_default_policy_drops_unencrypted() {
        let mut registry = DeviceRegistry::new();
        registry.on_connected(addr(1), AddressType::Public, ConnectionId(1));
        let outcome = registry.on_disconnected(&addr(1), RetentionPolicy::KeepEncrypted);
        assert!(matches!(outcome, DisconnectOutcome::Deleted(_)));
        assert!(registry.find(&addr(1)).is_none());
    }

    #[test]
    fn test_retained_record_is_reset() {
        let mut registry = DeviceRegistry::new();
        registry.on_connected(addr(1), AddressType::Public, ConnectionId(1));
        {
            let record = registry.find_mut(&addr(1)).unwrap();
            record.flags.insert(DeviceFlags::LINK_ENCRYPTED);
            record.flags.insert(DeviceFlags::RACP_OUTSTANDING);
            record.flags.insert(DeviceFlags::DISCOVERY_COMPLETE);
            record.gls.racp = 0x0030;
        }
        let outcome = registry.on_disconnected(&addr(1), RetentionPolicy::KeepEncrypted);
        assert_eq!(outcome, DisconnectOutcome::Retained);

        let record = registry.find(&addr(1)).unwrap();
        assert!(record.connection.is_none());
        assert!(!record.racp_outstanding());
        assert!(!record.has(DeviceFlags::LINK_ENCRYPTED));
        assert!(record.has(DeviceFlags::DISCOVERY_COMPLETE));
        assert_eq!(record.gls.racp, 0x0030);
    }

    #[test]
    fn test_policies() {
        let bonded = DeviceFlags::LTK_VALID;
        assert!(!RetentionPolicy::KeepEncrypted.retains(bonded));
        assert!(RetentionPolicy::KeepBonded.retains(bonded));
        assert!(RetentionPolicy::KeepAll.retains(DeviceFlags::NONE));
        assert!(!RetentionPolicy::DropAll.retains(DeviceFlags::LINK_ENCRYPTED));
        assert_eq!(
            "keep_bonded".parse::<RetentionPolicy>().unwrap(),
            RetentionPolicy::KeepBonded
        );
    }

    #[test]
    fn test_disconnect_unknown() {
        let mut registry = DeviceRegistry::new();
        assert_eq!(
            registry.on_disconnected(&addr(3), RetentionPolicy::KeepAll),
            DisconnectOutcome::UnknownDevice
        );
    }
}
