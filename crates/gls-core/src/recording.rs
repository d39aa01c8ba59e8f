//! In-memory GATT layer that records every request
//!
//! Backs the sample shell and the tests. Requests are appended to a log and
//! answered with sequential transaction ids; a failure can be armed for the
//! next request to exercise transport error paths.

use serde::Serialize;

use crate::errors::TransportError;
use crate::gatt::GattLayer;
use crate::types::{ClientConfiguration, ConnectionId, CorrelationToken, Handle, TransactionId, Uuid16};

/// One request issued through [`RecordingGatt`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GattRequest {
    StartDiscovery {
        connection: ConnectionId,
        services: Vec<Uuid16>,
        token: CorrelationToken,
    },
    StopDiscovery {
        connection: ConnectionId,
    },
    Read {
        connection: ConnectionId,
        handle: Handle,
        token: CorrelationToken,
    },
    Write {
        connection: ConnectionId,
        handle: Handle,
        value: Vec<u8>,
        token: CorrelationToken,
    },
    WriteWithoutResponse {
        connection: ConnectionId,
        handle: Handle,
        value: Vec<u8>,
    },
    Indicate {
        connection: ConnectionId,
        handle: Handle,
        value: Vec<u8>,
    },
    Notify {
        connection: ConnectionId,
        handle: Handle,
        value: Vec<u8>,
    },
    Confirm {
        connection: ConnectionId,
        transaction: TransactionId,
    },
    RacpResponse {
        transaction: TransactionId,
        error_code: u8,
    },
    ReadClientConfigurationResponse {
        transaction: TransactionId,
        value: ClientConfiguration,
    },
    Cancel {
        transaction: TransactionId,
    },
}

#[derive(Debug, Default)]
pub struct RecordingGatt {
    requests: Vec<GattRequest>,
    last_transaction: u32,
    fail_next: Option<TransportError>,
}

impl RecordingGatt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[GattRequest] {
        &self.requests
    }

    pub fn last_request(&self) -> Option<&GattRequest> {
        self.requests.last()
    }

    /// Drain the request log
    pub fn take_requests(&mut self) -> Vec<GattRequest> {
        core::mem::take(&mut self.requests)
    }

    /// Fail the next request with `error` instead of recording it
    pub fn fail_next(&mut self, error: TransportError) {
        self.fail_next = Some(error);
    }

    fn record(&mut self, request: GattRequest) -> Result<TransactionId, TransportError> {
        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }
        self.requests.push(request);
        self.last_transaction = self.last_transaction.wrapping_add(1).max(1);
        Ok(TransactionId(self.last_transaction))
    }
}

impl GattLayer for RecordingGatt {
    fn start_service_discovery(
        &mut self,
        connection: ConnectionId,
        services: &[Uuid16],
        token: CorrelationToken,
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::StartDiscovery {
            connection,
            services: services.to_vec(),
            token,
        })
    }

    fn stop_service_discovery(
        &mut self,
        connection: ConnectionId,
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::StopDiscovery { connection })
    }

    fn read_value(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        token: CorrelationToken,
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::Read {
            connection,
            handle,
            token,
        })
    }

    fn write_value(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
        token: CorrelationToken,
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::Write {
            connection,
            handle,
            value: value.to_vec(),
            token,
        })
    }

    fn write_without_response(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::WriteWithoutResponse {
            connection,
            handle,
            value: value.to_vec(),
        })
    }

    fn indicate(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::Indicate {
            connection,
            handle,
            value: value.to_vec(),
        })
    }

    fn notify(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::Notify {
            connection,
            handle,
            value: value.to_vec(),
        })
    }

    fn confirm(
        &mut self,
        connection: ConnectionId,
        transaction: TransactionId,
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::Confirm {
            connection,
            transaction,
        })
    }

    fn racp_response(
        &mut self,
        transaction: TransactionId,
        error_code: u8,
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::RacpResponse {
            transaction,
            error_code,
        })
    }

    fn read_client_configuration_response(
        &mut self,
        transaction: TransactionId,
        value: ClientConfiguration,
    ) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::ReadClientConfigurationResponse { transaction, value })
    }

    fn cancel(&mut self, transaction: TransactionId) -> Result<TransactionId, TransportError> {
        self.record(GattRequest::Cancel { transaction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_are_sequential() {
        let mut gatt = RecordingGatt::new();
        let a = gatt.cancel(TransactionId(9)).unwrap();
        let b = gatt.stop_service_discovery(ConnectionId(1)).unwrap();
        assert_eq!((a, b), (TransactionId(1), TransactionId(2)));
        assert_eq!(gatt.requests().len(), 2);
    }

    #[test]
    fn armed_failure_is_not_recorded() {
        let mut gatt = RecordingGatt::new();
        gatt.fail_next(TransportError::InsufficientResources);
        assert_eq!(
            gatt.notify(ConnectionId(1), 0x10, &[1]),
            Err(TransportError::InsufficientResources)
        );
        assert!(gatt.requests().is_empty());
        assert!(gatt.notify(ConnectionId(1), 0x10, &[1]).is_ok());
    }
}
