//! Glucose Service server role and RACP state machine
//!
//! Per device the control point is either idle or has one operation
//! outstanding (`RACP_OUTSTANDING`). Commands are answered at the ATT level
//! with 0x00, `PROCEDURE_ALREADY_IN_PROGRESS` or
//! `CHARACTERISTIC_CONFIGURATION_IMPROPERLY_CONFIGURED`; the application
//! returns the device to idle by indicating a result.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::att::{
    GLS_ERROR_CODE_CHARACTERISTIC_CONFIGURATION_IMPROPERLY_CONFIGURED,
    GLS_ERROR_CODE_PROCEDURE_ALREADY_IN_PROGRESS, GLS_ERROR_CODE_SUCCESS,
};
use crate::codec::{
    GlucoseFeatures, GlucoseMeasurement, MeasurementContext, RacpCommand, RacpOpcode,
    RacpResponse, RacpResponseCode,
};
use crate::device::{ConfigurableCharacteristic, DeviceFlags, DeviceRecord};
use crate::errors::ProfileError;
use crate::gatt::{GattLayer, ServerEvent};
use crate::registry::DeviceRegistry;
use crate::types::{BdAddr, ClientConfiguration, ConnectionId, Handle, TransactionId};
use crate::{GlsError, Result};

// ----------------------------------------------------------------------------
// Local Service Layout
// ----------------------------------------------------------------------------

/// Value handles of the local Glucose Service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalHandles {
    pub measurement: Handle,
    pub measurement_context: Handle,
    pub feature: Handle,
    pub racp: Handle,
}

impl Default for LocalHandles {
    fn default() -> Self {
        Self {
            measurement: 0x0012,
            measurement_context: 0x0015,
            feature: 0x0018,
            racp: 0x001A,
        }
    }
}

// ----------------------------------------------------------------------------
// Outcomes
// ----------------------------------------------------------------------------

/// How a RACP write was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RacpDecision {
    pub addr: BdAddr,
    pub command: RacpCommand,
    /// ATT error code sent back, 0x00 on acceptance
    pub code: u8,
}

impl RacpDecision {
    pub fn accepted(&self) -> bool {
        self.code == GLS_ERROR_CODE_SUCCESS
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerOutcome {
    Racp(RacpDecision),
    ConfigurationRead {
        addr: BdAddr,
        characteristic: ConfigurableCharacteristic,
        value: ClientConfiguration,
    },
    ConfigurationUpdated {
        addr: BdAddr,
        characteristic: ConfigurableCharacteristic,
        value: ClientConfiguration,
    },
    Confirmed {
        addr: BdAddr,
        status: u8,
    },
}

// ----------------------------------------------------------------------------
// Server
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GlsServer {
    handles: LocalHandles,
    features: GlucoseFeatures,
}

impl GlsServer {
    pub fn new(handles: LocalHandles, features: GlucoseFeatures) -> Self {
        Self { handles, features }
    }

    pub fn handles(&self) -> &LocalHandles {
        &self.handles
    }

    pub fn features(&self) -> GlucoseFeatures {
        self.features
    }

    pub fn set_features(&mut self, features: GlucoseFeatures) {
        debug!(%features, "Glucose features updated");
        self.features = features;
    }

    pub fn on_event<G: GattLayer + ?Sized>(
        &self,
        registry: &mut DeviceRegistry,
        gatt: &mut G,
        event: &ServerEvent,
    ) -> Result<ServerOutcome> {
        match event {
            ServerEvent::RacpCommand {
                addr,
                transaction,
                command,
                ..
            } => self
                .on_racp_command(registry, gatt, addr, *transaction, *command)
                .map(ServerOutcome::Racp),
            ServerEvent::ReadClientConfiguration {
                addr,
                transaction,
                characteristic,
                ..
            } => {
                let value = self.on_read_client_configuration(
                    registry,
                    gatt,
                    addr,
                    *transaction,
                    *characteristic,
                )?;
                Ok(ServerOutcome::ConfigurationRead {
                    addr: *addr,
                    characteristic: *characteristic,
                    value,
                })
            }
            ServerEvent::ClientConfigurationUpdate {
                addr,
                characteristic,
                value,
                ..
            } => {
                self.on_client_configuration_update(registry, addr, *characteristic, *value)?;
                Ok(ServerOutcome::ConfigurationUpdated {
                    addr: *addr,
                    characteristic: *characteristic,
                    value: *value,
                })
            }
            ServerEvent::Confirmation { addr, status, .. } => {
                info!(%addr, status, "Indication confirmed");
                Ok(ServerOutcome::Confirmed {
                    addr: *addr,
                    status: *status,
                })
            }
        }
    }

    // ------------------------------------------------------------------------
    // RACP
    // ------------------------------------------------------------------------

    /// Answer a RACP write and advance the state machine.
    ///
    /// While a procedure is outstanding only the outstanding state decides
    /// the answer: Abort gets 0x00 and anything else gets 0x80. The RACP
    /// subscription is checked in idle only. A device without a record is
    /// otherwise ignored, but its ATT write still needs an answer, so it
    /// gets 0x81.
    pub fn on_racp_command<G: GattLayer + ?Sized>(
        &self,
        registry: &mut DeviceRegistry,
        gatt: &mut G,
        addr: &BdAddr,
        transaction: TransactionId,
        command: RacpCommand,
    ) -> Result<RacpDecision> {
        let record = registry.find_mut(addr);

        let code = match record.as_deref() {
            None => {
                warn!(%addr, "RACP command from unknown device");
                GLS_ERROR_CODE_CHARACTERISTIC_CONFIGURATION_IMPROPERLY_CONFIGURED
            }
            Some(r) if r.racp_outstanding() => {
                if command.is_abort() {
                    GLS_ERROR_CODE_SUCCESS
                } else {
                    GLS_ERROR_CODE_PROCEDURE_ALREADY_IN_PROGRESS
                }
            }
            Some(r) if !r.server_config.racp.indicate_enabled() => {
                GLS_ERROR_CODE_CHARACTERISTIC_CONFIGURATION_IMPROPERLY_CONFIGURED
            }
            Some(_) => GLS_ERROR_CODE_SUCCESS,
        };

        gatt.racp_response(transaction, code)?;

        if let Some(record) = record {
            if code == GLS_ERROR_CODE_SUCCESS && !command.is_abort() {
                record.flags.insert(DeviceFlags::RACP_OUTSTANDING);
            }
        }

        debug!(%addr, %command, code, "RACP command answered");
        Ok(RacpDecision {
            addr: *addr,
            command,
            code,
        })
    }

    /// Indicate a Response Code and return the device to idle
    pub fn indicate_result<G: GattLayer + ?Sized>(
        &self,
        registry: &mut DeviceRegistry,
        gatt: &mut G,
        addr: &BdAddr,
        request_opcode: RacpOpcode,
        code: RacpResponseCode,
    ) -> Result<TransactionId> {
        self.indicate_racp(
            registry,
            gatt,
            addr,
            RacpResponse::ResponseCode {
                request_opcode,
                code,
            },
        )
    }

    /// Indicate the Number Of Stored Records and return the device to idle
    pub fn indicate_stored_record_count<G: GattLayer + ?Sized>(
        &self,
        registry: &mut DeviceRegistry,
        gatt: &mut G,
        addr: &BdAddr,
        count: u16,
    ) -> Result<TransactionId> {
        self.indicate_racp(registry, gatt, addr, RacpResponse::NumberOfStoredRecords(count))
    }

    fn indicate_racp<G: GattLayer + ?Sized>(
        &self,
        registry: &mut DeviceRegistry,
        gatt: &mut G,
        addr: &BdAddr,
        response: RacpResponse,
    ) -> Result<TransactionId> {
        let record = registry
            .find_mut(addr)
            .ok_or_else(|| GlsError::device_not_found(*addr))?;

        if !record.racp_outstanding() {
            return Err(ProfileError::NoRacpOutstanding { addr: *addr }.into());
        }
        if !record.server_config.racp.indicate_enabled() {
            return Err(ProfileError::ClientNotSubscribed { addr: *addr }.into());
        }
        let connection = connection_of(record)?;

        let transaction = gatt.indicate(connection, self.handles.racp, &response.encode())?;
        record.flags.remove(DeviceFlags::RACP_OUTSTANDING);
        debug!(%addr, %response, "RACP result indicated");
        Ok(transaction)
    }

    // ------------------------------------------------------------------------
    // Client Configuration
    // ------------------------------------------------------------------------

    /// Answer a CCCD read with the stored per-client value
    pub fn on_read_client_configuration<G: GattLayer + ?Sized>(
        &self,
        registry: &DeviceRegistry,
        gatt: &mut G,
        addr: &BdAddr,
        transaction: TransactionId,
        characteristic: ConfigurableCharacteristic,
    ) -> Result<ClientConfiguration> {
        let value = registry
            .find(addr)
            .map(|record| record.server_config.get(characteristic))
            .unwrap_or(ClientConfiguration::NONE);
        gatt.read_client_configuration_response(transaction, value)?;
        Ok(value)
    }

    pub fn on_client_configuration_update(
        &self,
        registry: &mut DeviceRegistry,
        addr: &BdAddr,
        characteristic: ConfigurableCharacteristic,
        value: ClientConfiguration,
    ) -> Result<()> {
        let record = registry
            .find_mut(addr)
            .ok_or_else(|| GlsError::device_not_found(*addr))?;
        record.server_config.set(characteristic, value);
        debug!(%addr, characteristic = characteristic.name(), %value, "Client configuration updated");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    pub fn notify_measurement<G: GattLayer + ?Sized>(
        &self,
        registry: &DeviceRegistry,
        gatt: &mut G,
        addr: &BdAddr,
        measurement: &GlucoseMeasurement,
    ) -> Result<TransactionId> {
        let connection =
            subscribed_connection(registry, addr, ConfigurableCharacteristic::Measurement)?;
        Ok(gatt.notify(connection, self.handles.measurement, &measurement.encode())?)
    }

    pub fn notify_context<G: GattLayer + ?Sized>(
        &self,
        registry: &DeviceRegistry,
        gatt: &mut G,
        addr: &BdAddr,
        context: &MeasurementContext,
    ) -> Result<TransactionId> {
        let connection =
            subscribed_connection(registry, addr, ConfigurableCharacteristic::MeasurementContext)?;
        Ok(gatt.notify(connection, self.handles.measurement_context, &context.encode())?)
    }
}

impl Default for GlsServer {
    fn default() -> Self {
        Self::new(LocalHandles::default(), GlucoseFeatures::NONE)
    }
}

fn connection_of(record: &DeviceRecord) -> Result<ConnectionId> {
    record
        .connection
        .ok_or_else(|| GlsError::not_connected(record.addr))
}

fn subscribed_connection(
    registry: &DeviceRegistry,
    addr: &BdAddr,
    characteristic: ConfigurableCharacteristic,
) -> Result<ConnectionId> {
    let record = registry
        .find(addr)
        .ok_or_else(|| GlsError::device_not_found(*addr))?;
    if !record.server_config.get(characteristic).notify_enabled() {
        return Err(ProfileError::ClientNotSubscribed { addr: *addr }.into());
    }
    connection_of(record)
}
