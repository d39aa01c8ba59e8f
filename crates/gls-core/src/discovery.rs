//! Service Discovery Correlator
//!
//! Drives one outstanding discovery per device and turns the stream of
//! discovery indications into populated handles on the device record.

use core::fmt;

use tracing::{debug, warn};

use crate::device::{DeviceFlags, DisHandles, GapsHandles, GlsClientHandles};
use crate::errors::ProfileError;
use crate::gatt::{DiscoveredCharacteristic, DiscoveredService, DiscoveryEvent, DiscoveryStatus, GattLayer};
use crate::registry::DeviceRegistry;
use crate::types::{BdAddr, CorrelationToken, DiscoveryKind, Handle, TransactionId, Uuid16};
use crate::uuids::{self, properties};
use crate::{GlsError, Result};

// ----------------------------------------------------------------------------
// Warnings and Updates
// ----------------------------------------------------------------------------

/// Advisory finding about a discovered characteristic; never fails discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryWarning {
    MissingProperty {
        characteristic: Uuid16,
        property: &'static str,
    },
    MissingCccd {
        characteristic: Uuid16,
    },
}

impl fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryWarning::MissingProperty {
                characteristic,
                property,
            } => write!(f, "{} does not support {}", characteristic, property),
            DiscoveryWarning::MissingCccd { characteristic } => {
                write!(f, "{} has no client configuration descriptor", characteristic)
            }
        }
    }
}

/// Result of feeding one discovery event to the correlator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryUpdate {
    Populated {
        addr: BdAddr,
        kind: DiscoveryKind,
        warnings: Vec<DiscoveryWarning>,
    },
    Completed {
        addr: BdAddr,
        status: DiscoveryStatus,
    },
    /// Event did not match an outstanding discovery
    Ignored,
}

// ----------------------------------------------------------------------------
// Start
// ----------------------------------------------------------------------------

/// Issue a service discovery for `kind` against a connected device.
///
/// Fails without touching the record if a discovery is already outstanding.
/// A transport failure leaves the outstanding flag clear.
pub fn start<G: GattLayer + ?Sized>(
    registry: &mut DeviceRegistry,
    gatt: &mut G,
    addr: &BdAddr,
    kind: DiscoveryKind,
) -> Result<TransactionId> {
    let record = registry
        .find_mut(addr)
        .ok_or_else(|| GlsError::device_not_found(*addr))?;

    if record.discovery_outstanding() {
        return Err(ProfileError::DiscoveryOutstanding { addr: *addr }.into());
    }
    let connection = record.connection.ok_or_else(|| GlsError::not_connected(*addr))?;

    let transaction = gatt.start_service_discovery(
        connection,
        &[kind.service_uuid()],
        CorrelationToken::Discovery(kind),
    )?;

    record.flags.insert(DeviceFlags::DISCOVERY_OUTSTANDING);
    debug!(%addr, %kind, %transaction, "Service discovery started");
    Ok(transaction)
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

pub fn on_event(registry: &mut DeviceRegistry, event: &DiscoveryEvent) -> DiscoveryUpdate {
    match event {
        DiscoveryEvent::Indication {
            addr,
            token,
            service,
            ..
        } => {
            let CorrelationToken::Discovery(kind) = token else {
                warn!(%addr, ?token, "Discovery indication with non-discovery token");
                return DiscoveryUpdate::Ignored;
            };
            match on_indication(registry, addr, *kind, service) {
                Ok(warnings) => DiscoveryUpdate::Populated {
                    addr: *addr,
                    kind: *kind,
                    warnings,
                },
                Err(e) => {
                    warn!(%addr, error = %e, "Ignoring discovery indication");
                    DiscoveryUpdate::Ignored
                }
            }
        }
        DiscoveryEvent::Complete { addr, status, .. } => match on_complete(registry, addr, *status) {
            Ok(()) => DiscoveryUpdate::Completed {
                addr: *addr,
                status: *status,
            },
            Err(e) => {
                warn!(%addr, error = %e, "Ignoring discovery completion");
                DiscoveryUpdate::Ignored
            }
        },
    }
}

/// Populate the handles for `kind` from one discovered service
pub fn on_indication(
    registry: &mut DeviceRegistry,
    addr: &BdAddr,
    kind: DiscoveryKind,
    service: &DiscoveredService,
) -> Result<Vec<DiscoveryWarning>> {
    let record = registry
        .find_mut(addr)
        .ok_or_else(|| GlsError::device_not_found(*addr))?;

    if !record.discovery_outstanding() {
        return Err(GlsError::invalid_parameter(format!(
            "no discovery outstanding for {}",
            addr
        )));
    }

    let mut warnings = Vec::new();
    match kind {
        DiscoveryKind::Gls => populate_gls(&mut record.gls, service, &mut warnings),
        DiscoveryKind::Dis => populate_dis(&mut record.dis, service),
        DiscoveryKind::Gaps => populate_gaps(&mut record.gaps, service),
    }

    for warning in &warnings {
        warn!(%addr, %warning, "Discovery warning");
    }
    debug!(%addr, %kind, service = %service.uuid, "Populated handles");
    Ok(warnings)
}

/// Clear the outstanding flag, marking discovery complete on success
pub fn on_complete(registry: &mut DeviceRegistry, addr: &BdAddr, status: DiscoveryStatus) -> Result<()> {
    let record = registry
        .find_mut(addr)
        .ok_or_else(|| GlsError::device_not_found(*addr))?;

    if !record.discovery_outstanding() {
        return Err(GlsError::invalid_parameter(format!(
            "no discovery outstanding for {}",
            addr
        )));
    }

    record.flags.remove(DeviceFlags::DISCOVERY_OUTSTANDING);
    if status == DiscoveryStatus::Success {
        record.flags.insert(DeviceFlags::DISCOVERY_COMPLETE);
    }
    debug!(%addr, ?status, "Service discovery complete");
    Ok(())
}

// ----------------------------------------------------------------------------
// Handle Population
// ----------------------------------------------------------------------------

fn require_property(
    characteristic: &DiscoveredCharacteristic,
    property: u8,
    name: &'static str,
    warnings: &mut Vec<DiscoveryWarning>,
) {
    if !characteristic.has_property(property) {
        warnings.push(DiscoveryWarning::MissingProperty {
            characteristic: characteristic.uuid,
            property: name,
        });
    }
}

fn cccd_of(characteristic: &DiscoveredCharacteristic, warnings: &mut Vec<DiscoveryWarning>) -> Handle {
    match characteristic.descriptor(uuids::CLIENT_CHARACTERISTIC_CONFIGURATION) {
        Some(handle) => handle,
        None => {
            warnings.push(DiscoveryWarning::MissingCccd {
                characteristic: characteristic.uuid,
            });
            0
        }
    }
}

fn populate_gls(
    handles: &mut GlsClientHandles,
    service: &DiscoveredService,
    warnings: &mut Vec<DiscoveryWarning>,
) {
    for c in &service.characteristics {
        match c.uuid {
            uuids::GLUCOSE_MEASUREMENT => {
                require_property(c, properties::NOTIFY, "Notify", warnings);
                handles.measurement = c.handle;
                handles.measurement_cccd = cccd_of(c, warnings);
            }
            uuids::GLUCOSE_MEASUREMENT_CONTEXT => {
                require_property(c, properties::NOTIFY, "Notify", warnings);
                handles.measurement_context = c.handle;
                handles.measurement_context_cccd = cccd_of(c, warnings);
            }
            uuids::GLUCOSE_FEATURE => {
                require_property(c, properties::READ, "Read", warnings);
                handles.feature = c.handle;
            }
            uuids::RECORD_ACCESS_CONTROL_POINT => {
                require_property(c, properties::WRITE, "Write", warnings);
                require_property(c, properties::INDICATE, "Indicate", warnings);
                handles.racp = c.handle;
                handles.racp_cccd = cccd_of(c, warnings);
            }
            _ => {}
        }
    }
}

fn populate_dis(handles: &mut DisHandles, service: &DiscoveredService) {
    for c in &service.characteristics {
        let slot = match c.uuid {
            uuids::MANUFACTURER_NAME_STRING => &mut handles.manufacturer_name,
            uuids::MODEL_NUMBER_STRING => &mut handles.model_number,
            uuids::SERIAL_NUMBER_STRING => &mut handles.serial_number,
            uuids::HARDWARE_REVISION_STRING => &mut handles.hardware_revision,
            uuids::FIRMWARE_REVISION_STRING => &mut handles.firmware_revision,
            uuids::SOFTWARE_REVISION_STRING => &mut handles.software_revision,
            uuids::SYSTEM_ID => &mut handles.system_id,
            uuids::IEEE_REGULATORY_CERTIFICATION => &mut handles.ieee_certification,
            uuids::PNP_ID => &mut handles.pnp_id,
            _ => continue,
        };
        *slot = c.handle;
    }
}

fn populate_gaps(handles: &mut GapsHandles, service: &DiscoveredService) {
    for c in &service.characteristics {
        match c.uuid {
            uuids::DEVICE_NAME => handles.device_name = c.handle,
            uuids::APPEARANCE => handles.appearance = c.handle,
            _ => {}
        }
    }
}
