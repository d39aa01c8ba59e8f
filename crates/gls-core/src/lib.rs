//! GLS Profile Core
//!
//! Device bookkeeping, GATT discovery correlation, the Record Access Control
//! Point state machine and the wire codecs of the Bluetooth Glucose Service.
//! Everything here is synchronous: components take the [`DeviceRegistry`] and
//! a [`GattLayer`] explicitly, so a single owner (see `gls-runtime`) drives
//! all state changes.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod att;
pub mod client;
pub mod codec;
pub mod collector;
pub mod config;
pub mod device;
pub mod discovery;
pub mod errors;
pub mod gatt;
pub mod recording;
pub mod registry;
pub mod server;
pub mod types;
pub mod uuids;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use att::{AttErrorCategory, AttErrorReport};
pub use client::ClientOutcome;
pub use collector::ProcedureOutcome;
pub use config::{ChannelConfig, GlsConfig};
pub use device::{ConfigurableCharacteristic, DeviceFlags, DeviceRecord};
pub use discovery::{DiscoveryUpdate, DiscoveryWarning};
pub use gatt::{
    ClientEvent, ConnectionEvent, DiscoveredCharacteristic, DiscoveredService, DiscoveryEvent,
    DiscoveryStatus, GattEvent, GattLayer, ServerEvent,
};
pub use recording::{GattRequest, RecordingGatt};
pub use registry::{DeviceRegistry, DisconnectOutcome, RetentionPolicy};
pub use server::{GlsServer, LocalHandles, RacpDecision, ServerOutcome};
pub use types::{
    AddressType, BdAddr, ClientConfiguration, ConnectionId, CorrelationToken, DiscoveryKind,
    Handle, TransactionId, Uuid16,
};

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

pub use errors::{GlsError, GlsResult, ProfileError, RegistryError, Result, TransportError};
