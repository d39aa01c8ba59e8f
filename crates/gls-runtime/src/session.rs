//! GLS Session
//!
//! `GlsSession` owns the device registry, the local server and the GATT
//! layer. Every operator command and every transport event goes through
//! `handle_command` / `handle_event`, which run to completion and return the
//! application events they produced.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use gls_core::codec::{
    GlucoseFeatures, GlucoseMeasurement, MeasurementContext, RacpCommand, RacpOpcode,
    RacpResponseCode,
};
use gls_core::{
    client, collector, discovery, BdAddr, ClientConfiguration, ClientEvent, ClientOutcome,
    ConfigurableCharacteristic, ConnectionEvent, ConnectionId, DeviceFlags, DeviceRecord,
    DeviceRegistry, DisconnectOutcome, DiscoveryKind, DiscoveryUpdate, GattEvent, GattLayer,
    GlsConfig, GlsError, GlsServer, ProcedureOutcome, Result, ServerOutcome, TransactionId,
};

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// Operator requests into the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Discover {
        addr: BdAddr,
        kind: DiscoveryKind,
    },
    StopDiscovery {
        addr: BdAddr,
    },
    ConfigureCccd {
        addr: BdAddr,
        characteristic: ConfigurableCharacteristic,
        value: ClientConfiguration,
    },
    ReadFeatures {
        addr: BdAddr,
    },
    StartProcedure {
        addr: BdAddr,
        command: RacpCommand,
    },
    AbortProcedure {
        addr: BdAddr,
    },
    IndicateResult {
        addr: BdAddr,
        request_opcode: RacpOpcode,
        code: RacpResponseCode,
    },
    IndicateRecordCount {
        addr: BdAddr,
        count: u16,
    },
    NotifyMeasurement {
        addr: BdAddr,
        measurement: GlucoseMeasurement,
    },
    NotifyContext {
        addr: BdAddr,
        context: MeasurementContext,
    },
    SetFeatures(GlucoseFeatures),
    Cancel {
        transaction: TransactionId,
    },
    DeleteDevice {
        addr: BdAddr,
    },
    ListDevices,
    /// Apply a transport event in command order; used by simulated peers
    InjectEvent(GattEvent),
    Shutdown,
}

impl Command {
    /// Operation name reported with failures
    pub fn name(&self) -> &'static str {
        match self {
            Command::Discover { .. } => "discover",
            Command::StopDiscovery { .. } => "stop_discovery",
            Command::ConfigureCccd { .. } => "configure_cccd",
            Command::ReadFeatures { .. } => "read_features",
            Command::StartProcedure { .. } => "start_procedure",
            Command::AbortProcedure { .. } => "abort_procedure",
            Command::IndicateResult { .. } => "indicate_result",
            Command::IndicateRecordCount { .. } => "indicate_stored_record_count",
            Command::NotifyMeasurement { .. } => "notify_measurement",
            Command::NotifyContext { .. } => "notify_context",
            Command::SetFeatures(_) => "set_features",
            Command::Cancel { .. } => "cancel",
            Command::DeleteDevice { .. } => "delete_device",
            Command::ListDevices => "list_devices",
            Command::InjectEvent(_) => "inject_event",
            Command::Shutdown => "shutdown",
        }
    }
}

// ----------------------------------------------------------------------------
// Application Events
// ----------------------------------------------------------------------------

/// Everything the session reports back to the application
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Connected {
        addr: BdAddr,
        connection: ConnectionId,
    },
    Disconnected {
        addr: BdAddr,
        retained: bool,
    },
    EncryptionChanged {
        addr: BdAddr,
        encrypted: bool,
    },
    Discovery(DiscoveryUpdate),
    Client(ClientOutcome),
    Procedure(ProcedureOutcome),
    Server(ServerOutcome),
    /// A command was handed to the GATT layer
    RequestIssued {
        operation: &'static str,
        transaction: TransactionId,
    },
    CommandFailed {
        operation: &'static str,
        error: GlsError,
    },
    FeaturesChanged(GlucoseFeatures),
    DeviceDeleted {
        addr: BdAddr,
        existed: bool,
    },
    DeviceList(Vec<DeviceRecord>),
    Stopped,
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub commands_processed: u64,
    pub commands_failed: u64,
    pub events_processed: u64,
    pub events_ignored: u64,
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

pub struct GlsSession<G: GattLayer> {
    config: GlsConfig,
    registry: DeviceRegistry,
    server: GlsServer,
    gatt: G,
    stats: SessionStats,
}

impl<G: GattLayer> GlsSession<G> {
    pub fn new(config: GlsConfig, gatt: G) -> Result<Self> {
        config.validate()?;
        let registry = DeviceRegistry::with_capacity_limit(config.max_devices);
        let server = GlsServer::new(config.local_handles, config.features());
        Ok(Self {
            config,
            registry,
            server,
            gatt,
            stats: SessionStats::default(),
        })
    }

    pub fn config(&self) -> &GlsConfig {
        &self.config
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn server(&self) -> &GlsServer {
        &self.server
    }

    pub fn gatt(&self) -> &G {
        &self.gatt
    }

    pub fn gatt_mut(&mut self) -> &mut G {
        &mut self.gatt
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Run one operator command. Failures become `CommandFailed` events.
    pub fn handle_command(&mut self, command: Command) -> Vec<AppEvent> {
        self.stats.commands_processed += 1;
        let operation = command.name();

        match self.execute(command) {
            Ok(events) => events,
            Err(e) => {
                self.stats.commands_failed += 1;
                error!(operation, code = e.code(), error = %e, "Command failed");
                vec![AppEvent::CommandFailed {
                    operation,
                    error: e,
                }]
            }
        }
    }

    fn execute(&mut self, command: Command) -> Result<Vec<AppEvent>> {
        let operation = command.name();
        let issued = |transaction| {
            vec![AppEvent::RequestIssued {
                operation,
                transaction,
            }]
        };

        match command {
            Command::Discover { addr, kind } => {
                discovery::start(&mut self.registry, &mut self.gatt, &addr, kind).map(issued)
            }
            Command::StopDiscovery { addr } => self.stop_discovery(&addr).map(issued),
            Command::ConfigureCccd {
                addr,
                characteristic,
                value,
            } => client::configure_cccd(&mut self.gatt, &self.registry, &addr, characteristic, value)
                .map(issued),
            Command::ReadFeatures { addr } => {
                client::read_features(&mut self.gatt, &self.registry, &addr).map(issued)
            }
            Command::StartProcedure { addr, command } => {
                collector::start_procedure(&mut self.registry, &mut self.gatt, &addr, command)
                    .map(issued)
            }
            Command::AbortProcedure { addr } => {
                collector::abort(&mut self.registry, &mut self.gatt, &addr).map(issued)
            }
            Command::IndicateResult {
                addr,
                request_opcode,
                code,
            } => self
                .server
                .indicate_result(&mut self.registry, &mut self.gatt, &addr, request_opcode, code)
                .map(issued),
            Command::IndicateRecordCount { addr, count } => self
                .server
                .indicate_stored_record_count(&mut self.registry, &mut self.gatt, &addr, count)
                .map(issued),
            Command::NotifyMeasurement { addr, measurement } => self
                .server
                .notify_measurement(&self.registry, &mut self.gatt, &addr, &measurement)
                .map(issued),
            Command::NotifyContext { addr, context } => self
                .server
                .notify_context(&self.registry, &mut self.gatt, &addr, &context)
                .map(issued),
            Command::SetFeatures(features) => {
                self.server.set_features(features);
                Ok(vec![AppEvent::FeaturesChanged(features)])
            }
            Command::Cancel { transaction } => {
                self.gatt.cancel(transaction)?;
                Ok(issued(transaction))
            }
            Command::DeleteDevice { addr } => {
                let existed = self.registry.delete(&addr).is_some();
                Ok(vec![AppEvent::DeviceDeleted { addr, existed }])
            }
            Command::ListDevices => {
                let devices = self
                    .registry
                    .addresses()
                    .iter()
                    .filter_map(|addr| self.registry.find(addr).cloned())
                    .collect();
                Ok(vec![AppEvent::DeviceList(devices)])
            }
            Command::InjectEvent(event) => Ok(self.handle_event(event)),
            Command::Shutdown => Ok(vec![AppEvent::Stopped]),
        }
    }

    fn stop_discovery(&mut self, addr: &BdAddr) -> Result<TransactionId> {
        let record = self
            .registry
            .find_mut(addr)
            .ok_or_else(|| GlsError::device_not_found(*addr))?;
        let connection = record.connection.ok_or_else(|| GlsError::not_connected(*addr))?;
        let transaction = self.gatt.stop_service_discovery(connection)?;
        record.flags.remove(DeviceFlags::DISCOVERY_OUTSTANDING);
        Ok(transaction)
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Apply one transport event
    pub fn handle_event(&mut self, event: GattEvent) -> Vec<AppEvent> {
        self.stats.events_processed += 1;
        let addr = event.addr();

        let events = match event {
            GattEvent::Connection(event) => self.on_connection_event(event),
            GattEvent::Discovery(event) => {
                match discovery::on_event(&mut self.registry, &event) {
                    DiscoveryUpdate::Ignored => Vec::new(),
                    update => vec![AppEvent::Discovery(update)],
                }
            }
            GattEvent::Client(event) => self.on_client_event(&event),
            GattEvent::Server(event) => {
                match self.server.on_event(&mut self.registry, &mut self.gatt, &event) {
                    Ok(outcome) => vec![AppEvent::Server(outcome)],
                    Err(e) => {
                        warn!(%addr, error = %e, "Server event not handled");
                        Vec::new()
                    }
                }
            }
        };

        if events.is_empty() {
            self.stats.events_ignored += 1;
        }
        events
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) -> Vec<AppEvent> {
        match event {
            ConnectionEvent::Connected {
                addr,
                addr_type,
                connection,
            } => {
                if !self.registry.on_connected(addr, addr_type, connection) {
                    warn!(%addr, "No room for device record, ignoring connection");
                    return Vec::new();
                }
                info!(%addr, %connection, "Device connected");
                vec![AppEvent::Connected { addr, connection }]
            }
            ConnectionEvent::Disconnected { addr } => {
                let retained =
                    match self.registry.on_disconnected(&addr, self.config.retention_policy) {
                        DisconnectOutcome::Retained => true,
                        DisconnectOutcome::Deleted(_) => false,
                        DisconnectOutcome::UnknownDevice => {
                            warn!(%addr, "Disconnect for unknown device");
                            return Vec::new();
                        }
                    };
                info!(%addr, retained, "Device disconnected");
                vec![AppEvent::Disconnected { addr, retained }]
            }
            ConnectionEvent::EncryptionChanged { addr, encrypted } => {
                let Some(record) = self.registry.find_mut(&addr) else {
                    warn!(%addr, "Encryption change for unknown device");
                    return Vec::new();
                };
                if encrypted {
                    record.flags.insert(DeviceFlags::LINK_ENCRYPTED);
                } else {
                    record.flags.remove(DeviceFlags::LINK_ENCRYPTED);
                }
                debug!(%addr, encrypted, "Encryption changed");
                vec![AppEvent::EncryptionChanged { addr, encrypted }]
            }
            ConnectionEvent::KeyUpdate { addr, ltk_valid } => {
                let Some(record) = self.registry.find_mut(&addr) else {
                    warn!(%addr, "Key update for unknown device");
                    return Vec::new();
                };
                if ltk_valid {
                    record.flags.insert(DeviceFlags::LTK_VALID);
                } else {
                    record.flags.remove(DeviceFlags::LTK_VALID);
                }
                debug!(%addr, ltk_valid, "Key updated");
                Vec::new()
            }
        }
    }

    fn on_client_event(&mut self, event: &ClientEvent) -> Vec<AppEvent> {
        let outcome = client::on_event(
            &self.registry,
            &mut self.gatt,
            event,
            self.config.auto_confirm_indications,
        );

        match outcome {
            ClientOutcome::Ignored => Vec::new(),
            ClientOutcome::RacpResponse { addr, response } => {
                let procedure = collector::on_racp_indication(&mut self.registry, &addr, response);
                let mut events = vec![AppEvent::Client(ClientOutcome::RacpResponse {
                    addr,
                    response,
                })];
                if procedure != ProcedureOutcome::Ignored {
                    events.push(AppEvent::Procedure(procedure));
                }
                events
            }
            outcome => vec![AppEvent::Client(outcome)],
        }
    }
}
