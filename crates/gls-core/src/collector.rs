//! Collector procedure tracker
//!
//! Client-side counterpart of the RACP server: writes one procedure at a time
//! to a remote Glucose Service and matches the indications that finish it.

use tracing::{debug, warn};

use crate::client::{self, connected_record};
use crate::codec::{RacpCommand, RacpOpcode, RacpResponse, RacpResponseCode};
use crate::device::DeviceFlags;
use crate::errors::ProfileError;
use crate::gatt::GattLayer;
use crate::registry::DeviceRegistry;
use crate::types::{BdAddr, TransactionId};
use crate::{GlsError, Result};

/// What a RACP indication meant for the running procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureOutcome {
    /// The procedure finished; the device is idle again
    Completed {
        addr: BdAddr,
        request: RacpOpcode,
        response: RacpResponse,
    },
    /// The server refused the abort; the procedure keeps running
    AbortFailed {
        addr: BdAddr,
        code: RacpResponseCode,
    },
    Ignored,
}

/// Validate and write a RACP procedure to a remote server.
///
/// An Abort command is routed to [`abort`].
pub fn start_procedure<G: GattLayer + ?Sized>(
    registry: &mut DeviceRegistry,
    gatt: &mut G,
    addr: &BdAddr,
    command: RacpCommand,
) -> Result<TransactionId> {
    command.validate()?;
    if command.is_abort() {
        return abort(registry, gatt, addr);
    }

    let (record, connection) = connected_record(registry, addr)?;
    if record.gls.racp == 0 {
        return Err(GlsError::not_discovered(*addr, "record access control point"));
    }
    if record.pending_procedure.is_some() {
        return Err(ProfileError::ProcedureAlreadyInProgress { addr: *addr }.into());
    }

    let transaction = client::write(gatt, connection, record.gls.racp, &command.encode())?;

    if let Some(record) = registry.find_mut(addr) {
        record.pending_procedure = Some(command.opcode);
    }
    debug!(%addr, %command, "RACP procedure started");
    Ok(transaction)
}

/// Abort the running procedure.
///
/// Requires a procedure in progress and no abort already in flight.
pub fn abort<G: GattLayer + ?Sized>(
    registry: &mut DeviceRegistry,
    gatt: &mut G,
    addr: &BdAddr,
) -> Result<TransactionId> {
    let (record, connection) = connected_record(registry, addr)?;
    if record.pending_procedure.is_none() {
        return Err(ProfileError::NoRacpOutstanding { addr: *addr }.into());
    }
    if record.has(DeviceFlags::ABORT_OUTSTANDING) {
        return Err(ProfileError::AbortOutstanding { addr: *addr }.into());
    }

    let transaction = client::write(gatt, connection, record.gls.racp, &RacpCommand::abort().encode())?;

    if let Some(record) = registry.find_mut(addr) {
        record.flags.insert(DeviceFlags::ABORT_OUTSTANDING);
    }
    debug!(%addr, "RACP abort written");
    Ok(transaction)
}

/// Match a RACP indication against the procedure it answers
pub fn on_racp_indication(
    registry: &mut DeviceRegistry,
    addr: &BdAddr,
    response: RacpResponse,
) -> ProcedureOutcome {
    let Some(record) = registry.find_mut(addr) else {
        warn!(%addr, "RACP indication for unknown device");
        return ProcedureOutcome::Ignored;
    };
    let Some(expected) = record.pending_procedure else {
        warn!(%addr, %response, "RACP indication with no procedure outstanding");
        return ProcedureOutcome::Ignored;
    };

    let answered = match response {
        RacpResponse::NumberOfStoredRecords(_) => {
            expected == RacpOpcode::ReportNumberOfStoredRecords
        }
        RacpResponse::ResponseCode { request_opcode, code } => {
            if request_opcode == RacpOpcode::AbortOperation && code != RacpResponseCode::Success {
                record.flags.remove(DeviceFlags::ABORT_OUTSTANDING);
                warn!(%addr, ?code, "RACP abort refused");
                return ProcedureOutcome::AbortFailed { addr: *addr, code };
            }
            request_opcode == expected || request_opcode == RacpOpcode::AbortOperation
        }
    };

    if !answered {
        warn!(%addr, %response, expected = %expected, "Unexpected RACP indication");
        return ProcedureOutcome::Ignored;
    }

    record.pending_procedure = None;
    record.flags.remove(DeviceFlags::ABORT_OUTSTANDING);
    debug!(%addr, %response, "RACP procedure complete");
    ProcedureOutcome::Completed {
        addr: *addr,
        request: expected,
        response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{RacpOperand, RacpOperator};
    use crate::recording::{GattRequest, RecordingGatt};
    use crate::types::{AddressType, ConnectionId, CorrelationToken};

    const RACP: u16 = 0x0019;

    fn create_test_registry(addr: BdAddr) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.on_connected(addr, AddressType::Public, ConnectionId(2));
        registry.find_mut(&addr).unwrap().gls.racp = RACP;
        registry
    }

    fn code(request_opcode: RacpOpcode, code: RacpResponseCode) -> RacpResponse {
        RacpResponse::ResponseCode {
            request_opcode,
            code,
        }
    }

    #[test]
    fn test_start_writes_encoded_command() {
        let addr = BdAddr::new([8; 6]);
        let mut registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();

        start_procedure(&mut registry, &mut gatt, &addr, RacpCommand::report_all()).unwrap();
        assert_eq!(
            gatt.last_request(),
            Some(&GattRequest::Write {
                connection: ConnectionId(2),
                handle: RACP,
                value: vec![0x01, 0x01],
                token: CorrelationToken::Attribute(RACP),
            })
        );
        assert_eq!(
            registry.find(&addr).unwrap().pending_procedure,
            Some(RacpOpcode::ReportStoredRecords)
        );

        let err = start_procedure(&mut registry, &mut gatt, &addr, RacpCommand::report_all()).unwrap_err();
        assert_eq!(err, ProfileError::ProcedureAlreadyInProgress { addr }.into());
    }

    #[test]
    fn test_invalid_command_is_not_written() {
        let addr = BdAddr::new([8; 6]);
        let mut registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();
        let inverted = RacpCommand::new(
            RacpOpcode::DeleteStoredRecords,
            RacpOperator::WithinRangeOf,
            RacpOperand::SequenceNumberRange { min: 9, max: 1 },
        );
        assert!(start_procedure(&mut registry, &mut gatt, &addr, inverted).is_err());
        assert!(gatt.requests().is_empty());
    }

    #[test]
    fn test_transport_failure_leaves_device_idle() {
        let addr = BdAddr::new([8; 6]);
        let mut registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();
        gatt.fail_next(crate::TransportError::RequestOutstanding);
        assert!(start_procedure(&mut registry, &mut gatt, &addr, RacpCommand::report_all()).is_err());
        assert!(registry.find(&addr).unwrap().pending_procedure.is_none());
    }

    #[test]
    fn test_abort_requires_outstanding_procedure() {
        let addr = BdAddr::new([8; 6]);
        let mut registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();

        assert!(abort(&mut registry, &mut gatt, &addr).is_err());
        start_procedure(&mut registry, &mut gatt, &addr, RacpCommand::report_all()).unwrap();
        abort(&mut registry, &mut gatt, &addr).unwrap();
        assert!(registry.find(&addr).unwrap().has(DeviceFlags::ABORT_OUTSTANDING));
        assert_eq!(
            abort(&mut registry, &mut gatt, &addr).unwrap_err(),
            ProfileError::AbortOutstanding { addr }.into()
        );
    }

    #[test]
    fn test_failed_abort_keeps_procedure() {
        let addr = BdAddr::new([8; 6]);
        let mut registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();
        start_procedure(&mut registry, &mut gatt, &addr, RacpCommand::report_all()).unwrap();
        abort(&mut registry, &mut gatt, &addr).unwrap();

        let outcome = on_racp_indication(
            &mut registry,
            &addr,
            code(RacpOpcode::AbortOperation, RacpResponseCode::AbortUnsuccessful),
        );
        assert!(matches!(outcome, ProcedureOutcome::AbortFailed { .. }));
        let record = registry.find(&addr).unwrap();
        assert_eq!(record.pending_procedure, Some(RacpOpcode::ReportStoredRecords));
        assert!(!record.has(DeviceFlags::ABORT_OUTSTANDING));
    }

    #[test]
    fn test_matching_response_completes() {
        let addr = BdAddr::new([8; 6]);
        let mut registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();
        let count = RacpCommand::new(
            RacpOpcode::ReportNumberOfStoredRecords,
            RacpOperator::AllRecords,
            RacpOperand::None,
        );
        start_procedure(&mut registry, &mut gatt, &addr, count).unwrap();

        // a response for another opcode is ignored
        let stray = code(RacpOpcode::DeleteStoredRecords, RacpResponseCode::Success);
        assert_eq!(on_racp_indication(&mut registry, &addr, stray), ProcedureOutcome::Ignored);

        let outcome = on_racp_indication(&mut registry, &addr, RacpResponse::NumberOfStoredRecords(12));
        assert_eq!(
            outcome,
            ProcedureOutcome::Completed {
                addr,
                request: RacpOpcode::ReportNumberOfStoredRecords,
                response: RacpResponse::NumberOfStoredRecords(12),
            }
        );
        assert!(registry.find(&addr).unwrap().pending_procedure.is_none());
    }

    #[test]
    fn test_successful_abort_completes() {
        let addr = BdAddr::new([8; 6]);
        let mut registry = create_test_registry(addr);
        let mut gatt = RecordingGatt::new();
        start_procedure(&mut registry, &mut gatt, &addr, RacpCommand::report_all()).unwrap();
        abort(&mut registry, &mut gatt, &addr).unwrap();

        let outcome = on_racp_indication(
            &mut registry,
            &addr,
            code(RacpOpcode::AbortOperation, RacpResponseCode::Success),
        );
        assert!(matches!(outcome, ProcedureOutcome::Completed { .. }));
        let record = registry.find(&addr).unwrap();
        assert!(record.pending_procedure.is_none());
        assert!(!record.has(DeviceFlags::ABORT_OUTSTANDING));
    }
}
