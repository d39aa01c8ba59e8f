//! GATT layer boundary
//!
//! The profile never talks ATT itself. Requests go out through
//! [`GattLayer`], and everything the transport reports comes back as a
//! [`GattEvent`] whose payload is an owned copy.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::codec::RacpCommand;
use crate::device::ConfigurableCharacteristic;
use crate::errors::TransportError;
use crate::types::{
    AddressType, BdAddr, ClientConfiguration, ConnectionId, CorrelationToken, Handle,
    TransactionId, Uuid16,
};

// ----------------------------------------------------------------------------
// Request Interface
// ----------------------------------------------------------------------------

/// Request primitives of the external GATT layer.
///
/// Every method returns immediately. Results arrive later as events tagged
/// with the [`CorrelationToken`] given here; the returned transaction id is
/// only good for [`GattLayer::cancel`].
pub trait GattLayer {
    fn start_service_discovery(
        &mut self,
        connection: ConnectionId,
        services: &[Uuid16],
        token: CorrelationToken,
    ) -> Result<TransactionId, TransportError>;

    fn stop_service_discovery(
        &mut self,
        connection: ConnectionId,
    ) -> Result<TransactionId, TransportError>;

    fn read_value(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        token: CorrelationToken,
    ) -> Result<TransactionId, TransportError>;

    fn write_value(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
        token: CorrelationToken,
    ) -> Result<TransactionId, TransportError>;

    fn write_without_response(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
    ) -> Result<TransactionId, TransportError>;

    /// Send a handle value indication from the local server
    fn indicate(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
    ) -> Result<TransactionId, TransportError>;

    /// Send a handle value notification from the local server
    fn notify(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
    ) -> Result<TransactionId, TransportError>;

    /// Confirm an indication received from a remote server
    fn confirm(
        &mut self,
        connection: ConnectionId,
        transaction: TransactionId,
    ) -> Result<TransactionId, TransportError>;

    /// Answer a RACP write with an ATT error code (0x00 accepts it)
    fn racp_response(
        &mut self,
        transaction: TransactionId,
        error_code: u8,
    ) -> Result<TransactionId, TransportError>;

    fn read_client_configuration_response(
        &mut self,
        transaction: TransactionId,
        value: ClientConfiguration,
    ) -> Result<TransactionId, TransportError>;

    fn cancel(&mut self, transaction: TransactionId) -> Result<TransactionId, TransportError>;
}

// ----------------------------------------------------------------------------
// Discovery Payloads
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDescriptor {
    pub handle: Handle,
    pub uuid: Uuid16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredCharacteristic {
    /// Value handle
    pub handle: Handle,
    pub uuid: Uuid16,
    pub properties: u8,
    pub descriptors: SmallVec<[DiscoveredDescriptor; 2]>,
}

impl DiscoveredCharacteristic {
    pub fn new(handle: Handle, uuid: Uuid16, properties: u8) -> Self {
        Self {
            handle,
            uuid,
            properties,
            descriptors: SmallVec::new(),
        }
    }

    pub fn with_descriptor(mut self, handle: Handle, uuid: Uuid16) -> Self {
        self.descriptors.push(DiscoveredDescriptor { handle, uuid });
        self
    }

    pub fn has_property(&self, property: u8) -> bool {
        self.properties & property != 0
    }

    pub fn descriptor(&self, uuid: Uuid16) -> Option<Handle> {
        self.descriptors
            .iter()
            .find(|d| d.uuid == uuid)
            .map(|d| d.handle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub uuid: Uuid16,
    pub start_handle: Handle,
    pub end_handle: Handle,
    pub included_services: SmallVec<[Uuid16; 2]>,
    pub characteristics: Vec<DiscoveredCharacteristic>,
}

impl DiscoveredService {
    pub fn new(uuid: Uuid16, start_handle: Handle, end_handle: Handle) -> Self {
        Self {
            uuid,
            start_handle,
            end_handle,
            included_services: SmallVec::new(),
            characteristics: Vec::new(),
        }
    }

    pub fn with_characteristic(mut self, characteristic: DiscoveredCharacteristic) -> Self {
        self.characteristics.push(characteristic);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryStatus {
    Success,
    ResponseError,
    ResponseTimeout,
    UnknownError,
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

/// Link-level events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected {
        addr: BdAddr,
        addr_type: AddressType,
        connection: ConnectionId,
    },
    Disconnected {
        addr: BdAddr,
    },
    EncryptionChanged {
        addr: BdAddr,
        encrypted: bool,
    },
    /// Pairing finished and the LTK validity changed
    KeyUpdate {
        addr: BdAddr,
        ltk_valid: bool,
    },
}

/// Events from the local Glucose Service instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    ReadClientConfiguration {
        connection: ConnectionId,
        addr: BdAddr,
        transaction: TransactionId,
        characteristic: ConfigurableCharacteristic,
    },
    ClientConfigurationUpdate {
        connection: ConnectionId,
        addr: BdAddr,
        characteristic: ConfigurableCharacteristic,
        value: ClientConfiguration,
    },
    RacpCommand {
        connection: ConnectionId,
        addr: BdAddr,
        transaction: TransactionId,
        command: RacpCommand,
    },
    Confirmation {
        connection: ConnectionId,
        addr: BdAddr,
        status: u8,
    },
}

/// Responses to locally issued client requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    ErrorResponse {
        connection: ConnectionId,
        addr: BdAddr,
        token: CorrelationToken,
        handle: Handle,
        code: u8,
    },
    /// The transport gave up waiting for the peer
    ProtocolTimeout {
        connection: ConnectionId,
        addr: BdAddr,
        token: CorrelationToken,
    },
    ReadResponse {
        connection: ConnectionId,
        addr: BdAddr,
        token: CorrelationToken,
        value: Vec<u8>,
    },
    WriteResponse {
        connection: ConnectionId,
        addr: BdAddr,
        token: CorrelationToken,
    },
    HandleValue {
        connection: ConnectionId,
        addr: BdAddr,
        transaction: TransactionId,
        handle: Handle,
        indication: bool,
        value: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Indication {
        connection: ConnectionId,
        addr: BdAddr,
        token: CorrelationToken,
        service: DiscoveredService,
    },
    Complete {
        connection: ConnectionId,
        addr: BdAddr,
        token: CorrelationToken,
        status: DiscoveryStatus,
    },
}

/// Everything the GATT layer can deliver to the profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattEvent {
    Connection(ConnectionEvent),
    Server(ServerEvent),
    Client(ClientEvent),
    Discovery(DiscoveryEvent),
}

impl GattEvent {
    /// Peer the event concerns
    pub fn addr(&self) -> BdAddr {
        match self {
            GattEvent::Connection(
                ConnectionEvent::Connected { addr, .. }
                | ConnectionEvent::Disconnected { addr }
                | ConnectionEvent::EncryptionChanged { addr, .. }
                | ConnectionEvent::KeyUpdate { addr, .. },
            ) => *addr,
            GattEvent::Server(
                ServerEvent::ReadClientConfiguration { addr, .. }
                | ServerEvent::ClientConfigurationUpdate { addr, .. }
                | ServerEvent::RacpCommand { addr, .. }
                | ServerEvent::Confirmation { addr, .. },
            ) => *addr,
            GattEvent::Client(
                ClientEvent::ErrorResponse { addr, .. }
                | ClientEvent::ProtocolTimeout { addr, .. }
                | ClientEvent::ReadResponse { addr, .. }
                | ClientEvent::WriteResponse { addr, .. }
                | ClientEvent::HandleValue { addr, .. },
            ) => *addr,
            GattEvent::Discovery(
                DiscoveryEvent::Indication { addr, .. } | DiscoveryEvent::Complete { addr, .. },
            ) => *addr,
        }
    }
}

impl From<ConnectionEvent> for GattEvent {
    fn from(event: ConnectionEvent) -> Self {
        GattEvent::Connection(event)
    }
}

impl From<ServerEvent> for GattEvent {
    fn from(event: ServerEvent) -> Self {
        GattEvent::Server(event)
    }
}

impl From<ClientEvent> for GattEvent {
    fn from(event: ClientEvent) -> Self {
        GattEvent::Client(event)
    }
}

impl From<DiscoveryEvent> for GattEvent {
    fn from(event: DiscoveryEvent) -> Self {
        GattEvent::Discovery(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuids;

    #[test]
    fn characteristic_descriptor_lookup() {
        let c = DiscoveredCharacteristic::new(0x0012, uuids::GLUCOSE_MEASUREMENT, 0x10)
            .with_descriptor(0x0013, uuids::CLIENT_CHARACTERISTIC_CONFIGURATION);
        assert_eq!(c.descriptor(uuids::CLIENT_CHARACTERISTIC_CONFIGURATION), Some(0x0013));
        assert_eq!(c.descriptor(Uuid16(0x2901)), None);
        assert!(c.has_property(uuids::properties::NOTIFY));
        assert!(!c.has_property(uuids::properties::INDICATE));
    }

    #[test]
    fn event_addr_extraction() {
        let addr = BdAddr::new([1, 2, 3, 4, 5, 6]);
        let event: GattEvent = ConnectionEvent::Disconnected { addr }.into();
        assert_eq!(event.addr(), addr);
    }
}
