//! GLS Client Transaction Tracker
//!
//! Issues reads and writes against discovered handles and interprets what
//! comes back. Requests are tagged with `CorrelationToken::Attribute(handle)`
//! and responses are decoded by comparing that handle with the record's
//! known GLS handles.

use tracing::{debug, error, warn};

use crate::att::AttErrorReport;
use crate::codec::{GlucoseFeatures, GlucoseMeasurement, MeasurementContext, RacpResponse};
use crate::device::{ConfigurableCharacteristic, DeviceRecord};
use crate::gatt::{ClientEvent, GattLayer};
use crate::registry::DeviceRegistry;
use crate::types::{BdAddr, ClientConfiguration, ConnectionId, CorrelationToken, Handle, TransactionId};
use crate::{GlsError, Result};

// ----------------------------------------------------------------------------
// Outcomes
// ----------------------------------------------------------------------------

/// Interpretation of one client event
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOutcome {
    AttError {
        addr: BdAddr,
        handle: Handle,
        report: AttErrorReport,
    },
    Timeout {
        addr: BdAddr,
        token: CorrelationToken,
    },
    Features {
        addr: BdAddr,
        features: GlucoseFeatures,
    },
    RacpResponse {
        addr: BdAddr,
        response: RacpResponse,
    },
    Measurement {
        addr: BdAddr,
        measurement: GlucoseMeasurement,
    },
    Context {
        addr: BdAddr,
        context: MeasurementContext,
    },
    Written {
        addr: BdAddr,
        handle: Handle,
    },
    /// Value from a handle this profile does not decode
    Raw {
        addr: BdAddr,
        handle: Handle,
        value: Vec<u8>,
    },
    /// Value from a known handle that failed to decode
    Malformed {
        addr: BdAddr,
        handle: Handle,
        error: GlsError,
        value: Vec<u8>,
    },
    Ignored,
}

// ----------------------------------------------------------------------------
// Requests
// ----------------------------------------------------------------------------

pub fn read<G: GattLayer + ?Sized>(
    gatt: &mut G,
    connection: ConnectionId,
    handle: Handle,
) -> Result<TransactionId> {
    if handle == 0 {
        return Err(GlsError::invalid_parameter("attribute handle 0"));
    }
    let transaction = gatt.read_value(connection, handle, CorrelationToken::Attribute(handle))?;
    debug!(%connection, handle, %transaction, "Read issued");
    Ok(transaction)
}

pub fn write<G: GattLayer + ?Sized>(
    gatt: &mut G,
    connection: ConnectionId,
    handle: Handle,
    payload: &[u8],
) -> Result<TransactionId> {
    if handle == 0 {
        return Err(GlsError::invalid_parameter("attribute handle 0"));
    }
    let transaction =
        gatt.write_value(connection, handle, payload, CorrelationToken::Attribute(handle))?;
    debug!(%connection, handle, len = payload.len(), %transaction, "Write issued");
    Ok(transaction)
}

/// Connection of a known device, or the matching error
pub(crate) fn connected_record<'a>(
    registry: &'a DeviceRegistry,
    addr: &BdAddr,
) -> Result<(&'a DeviceRecord, ConnectionId)> {
    let record = registry
        .find(addr)
        .ok_or_else(|| GlsError::device_not_found(*addr))?;
    let connection = record.connection.ok_or_else(|| GlsError::not_connected(*addr))?;
    Ok((record, connection))
}

/// Write the remote CCCD of a GLS characteristic
pub fn configure_cccd<G: GattLayer + ?Sized>(
    gatt: &mut G,
    registry: &DeviceRegistry,
    addr: &BdAddr,
    characteristic: ConfigurableCharacteristic,
    value: ClientConfiguration,
) -> Result<TransactionId> {
    let (record, connection) = connected_record(registry, addr)?;
    let handle = record.cccd_handle(characteristic);
    if handle == 0 {
        return Err(GlsError::not_discovered(*addr, characteristic.name()));
    }
    write(gatt, connection, handle, &value.to_le_bytes())
}

/// Read the remote Glucose Feature characteristic
pub fn read_features<G: GattLayer + ?Sized>(
    gatt: &mut G,
    registry: &DeviceRegistry,
    addr: &BdAddr,
) -> Result<TransactionId> {
    let (record, connection) = connected_record(registry, addr)?;
    if record.gls.feature == 0 {
        return Err(GlsError::not_discovered(*addr, "glucose feature"));
    }
    read(gatt, connection, record.gls.feature)
}

// ----------------------------------------------------------------------------
// Responses
// ----------------------------------------------------------------------------

/// Interpret a client event.
///
/// Indications are confirmed through `gatt` when `auto_confirm` is set.
pub fn on_event<G: GattLayer + ?Sized>(
    registry: &DeviceRegistry,
    gatt: &mut G,
    event: &ClientEvent,
    auto_confirm: bool,
) -> ClientOutcome {
    match event {
        ClientEvent::ErrorResponse {
            addr, handle, code, ..
        } => {
            let report = AttErrorReport::from_code(*code);
            if report.needs_pairing() {
                warn!(%addr, handle, %report, "Request rejected until pairing completes");
            } else {
                warn!(%addr, handle, %report, "Error response");
            }
            ClientOutcome::AttError {
                addr: *addr,
                handle: *handle,
                report,
            }
        }
        ClientEvent::ProtocolTimeout { addr, token, .. } => {
            error!(%addr, ?token, "Protocol timeout");
            ClientOutcome::Timeout {
                addr: *addr,
                token: *token,
            }
        }
        ClientEvent::ReadResponse {
            addr, token, value, ..
        } => {
            let Some(record) = registry.find(addr) else {
                warn!(%addr, "Read response for unknown device");
                return ClientOutcome::Ignored;
            };
            let CorrelationToken::Attribute(handle) = *token else {
                warn!(%addr, ?token, "Read response with non-attribute token");
                return ClientOutcome::Ignored;
            };
            decode_read(record, handle, value)
        }
        ClientEvent::WriteResponse { addr, token, .. } => {
            let CorrelationToken::Attribute(handle) = *token else {
                warn!(%addr, ?token, "Write response with non-attribute token");
                return ClientOutcome::Ignored;
            };
            ClientOutcome::Written {
                addr: *addr,
                handle,
            }
        }
        ClientEvent::HandleValue {
            connection,
            addr,
            transaction,
            handle,
            indication,
            value,
        } => {
            if *indication && auto_confirm {
                if let Err(e) = gatt.confirm(*connection, *transaction) {
                    error!(%addr, error = %e, "Failed to confirm indication");
                }
            }
            let Some(record) = registry.find(addr) else {
                warn!(%addr, "Handle value for unknown device");
                return ClientOutcome::Ignored;
            };
            decode_handle_value(record, *handle, value)
        }
    }
}

fn malformed(addr: BdAddr, handle: Handle, error: GlsError, value: &[u8]) -> ClientOutcome {
    warn!(%addr, handle, %error, "Undecodable value, showing raw bytes");
    ClientOutcome::Malformed {
        addr,
        handle,
        error,
        value: value.to_vec(),
    }
}

fn decode_read(record: &DeviceRecord, handle: Handle, value: &[u8]) -> ClientOutcome {
    let addr = record.addr;
    if handle == record.gls.feature {
        match GlucoseFeatures::decode(value) {
            Ok(features) => ClientOutcome::Features { addr, features },
            Err(e) => malformed(addr, handle, e, value),
        }
    } else if handle == record.gls.racp {
        match RacpResponse::decode(value) {
            Ok(response) => ClientOutcome::RacpResponse { addr, response },
            Err(e) => malformed(addr, handle, e, value),
        }
    } else {
        ClientOutcome::Raw {
            addr,
            handle,
            value: value.to_vec(),
        }
    }
}

fn decode_handle_value(record: &DeviceRecord, handle: Handle, value: &[u8]) -> ClientOutcome {
    let addr = record.addr;
    let gls = &record.gls;
    let decoded = if handle == 0 {
        None
    } else if handle == gls.measurement {
        Some(GlucoseMeasurement::decode(value).map(|measurement| ClientOutcome::Measurement {
            addr,
            measurement,
        }))
    } else if handle == gls.measurement_context {
        Some(MeasurementContext::decode(value).map(|context| ClientOutcome::Context { addr, context }))
    } else if handle == gls.racp {
        Some(RacpResponse::decode(value).map(|response| ClientOutcome::RacpResponse { addr, response }))
    } else {
        None
    };

    match decoded {
        Some(Ok(outcome)) => outcome,
        Some(Err(e)) => malformed(addr, handle, e, value),
        None => ClientOutcome::Raw {
            addr,
            handle,
            value: value.to_vec(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DateTime, RacpOpcode, RacpResponseCode};
    use crate::recording::{GattRequest, RecordingGatt};
    use crate::types::AddressType;

    fn create_test_registry(addr: BdAddr) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.on_connected(addr, AddressType::Public, ConnectionId(4));
        let record = registry.find_mut(&addr).unwrap();
        record.gls.measurement = 0x12;
        record.gls.measurement_context = 0x15;
        record.gls.feature = 0x17;
        record.gls.racp = 0x19;
        record.gls.racp_cccd = 0x1A;
        registry
    }

    #[test]
    fn test_requests_use_handle_token() {
        let mut gatt = RecordingGatt::new();
        read(&mut gatt, ConnectionId(4), 0x17).unwrap();
        assert_eq!(
            gatt.last_request(),
            Some(&GattRequest::Read {
                connection: ConnectionId(4),
                handle: 0x17,
                token: CorrelationToken::Attribute(0x17),
            })
        );
        assert!(read(&mut gatt, ConnectionId(4), 0).is_err());
    }

    #[test]
    fn test_configure_cccd() {
        let addr = BdAddr::new([7; 6]);
        let registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();

        configure_cccd(&mut gatt, &registry, &addr, ConfigurableCharacteristic::Racp, ClientConfiguration::INDICATE).unwrap();
        assert_eq!(
            gatt.last_request(),
            Some(&GattRequest::Write {
                connection: ConnectionId(4),
                handle: 0x1A,
                value: vec![0x02, 0x00],
                token: CorrelationToken::Attribute(0x1A),
            })
        );

        let err = configure_cccd(&mut gatt, &registry, &addr, ConfigurableCharacteristic::Measurement, ClientConfiguration::NOTIFY).unwrap_err();
        assert!(matches!(err, GlsError::Profile(crate::ProfileError::AttributeNotDiscovered { .. })));
    }

    #[test]
    fn test_read_response_dispatch() {
        let addr = BdAddr::new([7; 6]);
        let registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();

        let feature = ClientEvent::ReadResponse {
            connection: ConnectionId(4),
            addr,
            token: CorrelationToken::Attribute(0x17),
            value: vec![0x03, 0x00],
        };
        assert_eq!(
            on_event(&registry, &mut gatt, &feature, true),
            ClientOutcome::Features {
                addr,
                features: GlucoseFeatures::new(0x0003)
            }
        );

        let other = ClientEvent::ReadResponse {
            connection: ConnectionId(4),
            addr,
            token: CorrelationToken::Attribute(0x40),
            value: b"Acme".to_vec(),
        };
        assert!(matches!(
            on_event(&registry, &mut gatt, &other, true),
            ClientOutcome::Raw { handle: 0x40, .. }
        ));

        let short = ClientEvent::ReadResponse {
            connection: ConnectionId(4),
            addr,
            token: CorrelationToken::Attribute(0x17),
            value: vec![0x03],
        };
        assert!(matches!(
            on_event(&registry, &mut gatt, &short, true),
            ClientOutcome::Malformed { handle: 0x17, .. }
        ));
    }

    #[test]
    fn test_indication_is_confirmed_and_decoded() {
        let addr = BdAddr::new([7; 6]);
        let registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();

        let response = RacpResponse::ResponseCode {
            request_opcode: RacpOpcode::ReportStoredRecords,
            code: RacpResponseCode::Success,
        };
        let event = ClientEvent::HandleValue {
            connection: ConnectionId(4),
            addr,
            transaction: TransactionId(33),
            handle: 0x19,
            indication: true,
            value: response.encode().to_vec(),
        };
        assert_eq!(
            on_event(&registry, &mut gatt, &event, true),
            ClientOutcome::RacpResponse { addr, response }
        );
        assert_eq!(
            gatt.requests(),
            &[GattRequest::Confirm {
                connection: ConnectionId(4),
                transaction: TransactionId(33),
            }]
        );
    }

    #[test]
    fn test_measurement_notification() {
        let addr = BdAddr::new([7; 6]);
        let registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();
        let measurement = GlucoseMeasurement::new(42, DateTime::new(2016, 5, 6, 7, 8, 9));

        let event = ClientEvent::HandleValue {
            connection: ConnectionId(4),
            addr,
            transaction: TransactionId(0),
            handle: 0x12,
            indication: false,
            value: measurement.encode(),
        };
        assert_eq!(
            on_event(&registry, &mut gatt, &event, true),
            ClientOutcome::Measurement { addr, measurement }
        );
        assert!(gatt.requests().is_empty());
    }

    #[test]
    fn test_error_response_classification() {
        let addr = BdAddr::new([7; 6]);
        let registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();
        let event = ClientEvent::ErrorResponse {
            connection: ConnectionId(4),
            addr,
            token: CorrelationToken::Attribute(0x19),
            handle: 0x19,
            code: 0x81,
        };
        match on_event(&registry, &mut gatt, &event, true) {
            ClientOutcome::AttError { report, .. } => assert_eq!(
                report.category,
                crate::att::AttErrorCategory::CharacteristicConfigurationImproperlyConfigured
            ),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
