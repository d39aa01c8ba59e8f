//! GATT layer for the shell
//!
//! Wraps [`RecordingGatt`] and echoes each request as a JSON line instead of
//! keeping a log.

use std::io::Write;

use tracing::warn;

use gls_core::{
    ClientConfiguration, ConnectionId, CorrelationToken, GattLayer, GattRequest, Handle,
    RecordingGatt, TransactionId, TransportError, Uuid16,
};

pub struct ConsoleGatt<W: Write> {
    inner: RecordingGatt,
    echo: bool,
    out: W,
}

impl ConsoleGatt<std::io::Stdout> {
    pub fn stdout(echo: bool) -> Self {
        Self::new(std::io::stdout(), echo)
    }
}

impl<W: Write> ConsoleGatt<W> {
    pub fn new(out: W, echo: bool) -> Self {
        Self {
            inner: RecordingGatt::new(),
            echo,
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn flush(
        &mut self,
        result: Result<TransactionId, TransportError>,
    ) -> Result<TransactionId, TransportError> {
        for request in self.inner.take_requests() {
            if self.echo {
                self.echo_request(&request, &result);
            }
        }
        result
    }

    fn echo_request(&mut self, request: &GattRequest, result: &Result<TransactionId, TransportError>) {
        let transaction = result.as_ref().map(|t| t.0).unwrap_or_default();
        match serde_json::to_string(request) {
            Ok(json) => {
                if let Err(e) = writeln!(self.out, "  -> [{}] {}", transaction, json) {
                    warn!("Failed to echo GATT request: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize GATT request: {}", e),
        }
    }
}

impl<W: Write> GattLayer for ConsoleGatt<W> {
    fn start_service_discovery(
        &mut self,
        connection: ConnectionId,
        services: &[Uuid16],
        token: CorrelationToken,
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.start_service_discovery(connection, services, token);
        self.flush(result)
    }

    fn stop_service_discovery(
        &mut self,
        connection: ConnectionId,
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.stop_service_discovery(connection);
        self.flush(result)
    }

    fn read_value(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        token: CorrelationToken,
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.read_value(connection, handle, token);
        self.flush(result)
    }

    fn write_value(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
        token: CorrelationToken,
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.write_value(connection, handle, value, token);
        self.flush(result)
    }

    fn write_without_response(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.write_without_response(connection, handle, value);
        self.flush(result)
    }

    fn indicate(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.indicate(connection, handle, value);
        self.flush(result)
    }

    fn notify(
        &mut self,
        connection: ConnectionId,
        handle: Handle,
        value: &[u8],
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.notify(connection, handle, value);
        self.flush(result)
    }

    fn confirm(
        &mut self,
        connection: ConnectionId,
        transaction: TransactionId,
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.confirm(connection, transaction);
        self.flush(result)
    }

    fn racp_response(
        &mut self,
        transaction: TransactionId,
        error_code: u8,
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.racp_response(transaction, error_code);
        self.flush(result)
    }

    fn read_client_configuration_response(
        &mut self,
        transaction: TransactionId,
        value: ClientConfiguration,
    ) -> Result<TransactionId, TransportError> {
        let result = self.inner.read_client_configuration_response(transaction, value);
        self.flush(result)
    }

    fn cancel(&mut self, transaction: TransactionId) -> Result<TransactionId, TransportError> {
        let result = self.inner.cancel(transaction);
        self.flush(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_are_echoed_as_json() {
        let mut gatt = ConsoleGatt::new(Vec::new(), true);
        let transaction = gatt.notify(ConnectionId(1), 0x0012, &[0x00]).unwrap();
        assert_eq!(transaction, TransactionId(1));

        let output = String::from_utf8(gatt.into_inner()).unwrap();
        assert!(output.starts_with("  -> [1] {\"Notify\""));
    }

    #[test]
    fn test_silent_when_echo_disabled() {
        let mut gatt = ConsoleGatt::new(Vec::new(), false);
        gatt.cancel(TransactionId(4)).unwrap();
        assert!(gatt.into_inner().is_empty());
    }
}
