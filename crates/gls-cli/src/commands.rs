//! Shell command table
//!
//! Every shell command turns into either a session [`Command`] or a batch of
//! [`GattEvent`]s injected as if a peer had produced them. The `PEER*`
//! commands stand in for a radio: they play the remote side of a link.

use std::collections::HashMap;

use gls_core::codec::{
    DateTime, GlucoseConcentration, GlucoseFeatures, GlucoseMeasurement, Meal,
    MeasurementContext, RacpCommand, RacpOpcode, RacpResponseCode, SFloat, SampleLocation,
    SampleType,
};
use gls_core::uuids::{self, properties};
use gls_core::{
    AddressType, BdAddr, ClientConfiguration, ClientEvent, ConfigurableCharacteristic,
    ConnectionEvent, ConnectionId, CorrelationToken, DiscoveredCharacteristic, DiscoveredService,
    DiscoveryEvent, DiscoveryKind, DiscoveryStatus, GlsError, Handle, ServerEvent, TransactionId,
};
use gls_runtime::{Command, GattEvent};

use crate::error::{CliError, Result};
use crate::shell::{CommandLine, Parameter};

// ----------------------------------------------------------------------------
// Actions
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Session(Command),
    Peer(Vec<GattEvent>),
    Help,
    Quit,
}

// ----------------------------------------------------------------------------
// Simulated Peers
// ----------------------------------------------------------------------------

/// Link bookkeeping for the simulated remote side
#[derive(Debug, Default)]
pub struct PeerLinks {
    connections: HashMap<BdAddr, ConnectionId>,
    last_connection: u32,
    last_transaction: u32,
}

impl PeerLinks {
    pub fn new() -> Self {
        Self::default()
    }

    fn connect(&mut self, addr: BdAddr) -> ConnectionId {
        self.last_connection += 1;
        let connection = ConnectionId(self.last_connection);
        self.connections.insert(addr, connection);
        connection
    }

    fn disconnect(&mut self, addr: &BdAddr) -> Result<()> {
        self.connections
            .remove(addr)
            .map(|_| ())
            .ok_or_else(|| GlsError::not_connected(*addr).into())
    }

    fn connection(&self, addr: &BdAddr) -> Result<ConnectionId> {
        self.connections
            .get(addr)
            .copied()
            .ok_or_else(|| GlsError::not_connected(*addr).into())
    }

    /// Transaction ids for peer-originated requests, kept clear of the
    /// ids the local GATT layer hands out
    fn next_transaction(&mut self) -> TransactionId {
        self.last_transaction += 1;
        TransactionId(0x8000_0000 | self.last_transaction)
    }
}

// ----------------------------------------------------------------------------
// Parameter Access
// ----------------------------------------------------------------------------

struct Args<'a> {
    params: &'a [Parameter],
    usage: &'static str,
}

impl<'a> Args<'a> {
    fn usage(&self) -> CliError {
        CliError::usage(self.usage)
    }

    fn text(&self, index: usize) -> Result<&'a str> {
        self.params
            .get(index)
            .map(|p| p.text.as_str())
            .ok_or_else(|| self.usage())
    }

    fn has(&self, index: usize) -> bool {
        index < self.params.len()
    }

    fn addr(&self, index: usize) -> Result<BdAddr> {
        self.text(index)?.parse().map_err(|_| self.usage())
    }

    fn number<T: TryFrom<u32>>(&self, index: usize) -> Result<T> {
        self.params
            .get(index)
            .and_then(|p| p.value)
            .and_then(|v| T::try_from(v).ok())
            .ok_or_else(|| self.usage())
    }

    fn optional_number<T: TryFrom<u32>>(&self, index: usize) -> Result<Option<T>> {
        if self.has(index) {
            self.number(index).map(Some)
        } else {
            Ok(None)
        }
    }

    fn signed(&self, index: usize) -> Result<i32> {
        self.text(index)?.parse().map_err(|_| self.usage())
    }

    fn flag(&self, index: usize) -> Result<bool> {
        match self.number::<u32>(index)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(self.usage()),
        }
    }

    fn bytes(&self, index: usize) -> Result<Vec<u8>> {
        Ok(hex::decode(self.text(index)?)?)
    }

    fn characteristic(&self, index: usize) -> Result<ConfigurableCharacteristic> {
        match self.text(index)?.to_ascii_lowercase().as_str() {
            "measurement" | "gm" => Ok(ConfigurableCharacteristic::Measurement),
            "context" | "gmc" => Ok(ConfigurableCharacteristic::MeasurementContext),
            "racp" => Ok(ConfigurableCharacteristic::Racp),
            _ => Err(self.usage()),
        }
    }

    fn date_time(&self, first: usize) -> Result<DateTime> {
        let date_time = DateTime::new(
            self.number(first)?,
            self.number(first + 1)?,
            self.number(first + 2)?,
            self.number(first + 3)?,
            self.number(first + 4)?,
            self.number(first + 5)?,
        );
        date_time.validate()?;
        Ok(date_time)
    }
}

// ----------------------------------------------------------------------------
// Command Table
// ----------------------------------------------------------------------------

type Builder = fn(&mut PeerLinks, &Args<'_>) -> Result<Action>;

pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
    build: Builder,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "HELP",
        usage: "HELP",
        summary: "list commands",
        build: |_, _| Ok(Action::Help),
    },
    CommandSpec {
        name: "QUIT",
        usage: "QUIT",
        summary: "stop the session and exit",
        build: |_, _| Ok(Action::Quit),
    },
    CommandSpec {
        name: "DEVICES",
        usage: "DEVICES",
        summary: "print the device registry",
        build: |_, _| Ok(Action::Session(Command::ListDevices)),
    },
    CommandSpec {
        name: "DELETE",
        usage: "DELETE <addr>",
        summary: "forget a device",
        build: |_, a| Ok(Action::Session(Command::DeleteDevice { addr: a.addr(0)? })),
    },
    CommandSpec {
        name: "DISCOVER",
        usage: "DISCOVER <addr> <gls|dis|gaps>",
        summary: "discover a remote service",
        build: |_, a| {
            let kind: DiscoveryKind = a.text(1)?.parse()?;
            Ok(Action::Session(Command::Discover {
                addr: a.addr(0)?,
                kind,
            }))
        },
    },
    CommandSpec {
        name: "STOPDISCOVERY",
        usage: "STOPDISCOVERY <addr>",
        summary: "cancel an outstanding discovery",
        build: |_, a| Ok(Action::Session(Command::StopDiscovery { addr: a.addr(0)? })),
    },
    CommandSpec {
        name: "CONFIGURE",
        usage: "CONFIGURE <addr> <measurement|context|racp> <cccd value>",
        summary: "write a remote client configuration descriptor",
        build: |_, a| {
            Ok(Action::Session(Command::ConfigureCccd {
                addr: a.addr(0)?,
                characteristic: a.characteristic(1)?,
                value: ClientConfiguration::new(a.number(2)?),
            }))
        },
    },
    CommandSpec {
        name: "READFEATURES",
        usage: "READFEATURES <addr>",
        summary: "read the remote Glucose Feature",
        build: |_, a| Ok(Action::Session(Command::ReadFeatures { addr: a.addr(0)? })),
    },
    CommandSpec {
        name: "RACP",
        usage: "RACP <addr> <command hex>",
        summary: "write a RACP procedure to the remote server",
        build: |_, a| {
            let command = RacpCommand::decode(&a.bytes(1)?)?;
            Ok(Action::Session(Command::StartProcedure {
                addr: a.addr(0)?,
                command,
            }))
        },
    },
    CommandSpec {
        name: "REPORTALL",
        usage: "REPORTALL <addr>",
        summary: "ask the remote server for every stored record",
        build: |_, a| {
            Ok(Action::Session(Command::StartProcedure {
                addr: a.addr(0)?,
                command: RacpCommand::report_all(),
            }))
        },
    },
    CommandSpec {
        name: "ABORT",
        usage: "ABORT <addr>",
        summary: "abort the outstanding remote procedure",
        build: |_, a| Ok(Action::Session(Command::AbortProcedure { addr: a.addr(0)? })),
    },
    CommandSpec {
        name: "INDICATERESULT",
        usage: "INDICATERESULT <addr> <request opcode> <response code>",
        summary: "finish a local procedure with a Response Code",
        build: |_, a| {
            Ok(Action::Session(Command::IndicateResult {
                addr: a.addr(0)?,
                request_opcode: RacpOpcode::from_u8(a.number(1)?)?,
                code: RacpResponseCode::from_u8(a.number(2)?),
            }))
        },
    },
    CommandSpec {
        name: "INDICATECOUNT",
        usage: "INDICATECOUNT <addr> <count>",
        summary: "finish a local procedure with a record count",
        build: |_, a| {
            Ok(Action::Session(Command::IndicateRecordCount {
                addr: a.addr(0)?,
                count: a.number(1)?,
            }))
        },
    },
    CommandSpec {
        name: "NOTIFYMEASUREMENT",
        usage: "NOTIFYMEASUREMENT <addr> <seq> <year> <month> <day> <hours> <minutes> <seconds> [<mantissa> <exponent>]",
        summary: "send a Glucose Measurement",
        build: |_, a| {
            let mut measurement = GlucoseMeasurement::new(a.number(1)?, a.date_time(2)?);
            if a.has(8) {
                let mantissa = i16::try_from(a.signed(8)?).map_err(|_| a.usage())?;
                let exponent = i8::try_from(a.signed(9)?).map_err(|_| a.usage())?;
                let value = SFloat::from_parts(mantissa, exponent).ok_or_else(|| a.usage())?;
                measurement.concentration = Some(GlucoseConcentration {
                    value,
                    sample_type: SampleType::CapillaryWholeBlood,
                    sample_location: SampleLocation::from_nibble(0x01),
                });
            }
            Ok(Action::Session(Command::NotifyMeasurement {
                addr: a.addr(0)?,
                measurement,
            }))
        },
    },
    CommandSpec {
        name: "NOTIFYCONTEXT",
        usage: "NOTIFYCONTEXT <addr> <seq> [meal]",
        summary: "send a Glucose Measurement Context",
        build: |_, a| {
            let mut context = MeasurementContext::new(a.number(1)?);
            context.meal = a.optional_number(2)?.map(Meal);
            Ok(Action::Session(Command::NotifyContext {
                addr: a.addr(0)?,
                context,
            }))
        },
    },
    CommandSpec {
        name: "SETFEATURES",
        usage: "SETFEATURES <mask>",
        summary: "change the local Glucose Feature value",
        build: |_, a| {
            Ok(Action::Session(Command::SetFeatures(GlucoseFeatures::new(
                a.number(0)?,
            ))))
        },
    },
    CommandSpec {
        name: "CANCEL",
        usage: "CANCEL <transaction>",
        summary: "cancel a pending GATT transaction",
        build: |_, a| {
            Ok(Action::Session(Command::Cancel {
                transaction: TransactionId(a.number(0)?),
            }))
        },
    },
    CommandSpec {
        name: "PEERCONNECT",
        usage: "PEERCONNECT <addr> [random]",
        summary: "a peer connects",
        build: |peers, a| {
            let addr = a.addr(0)?;
            let addr_type = match a.has(1) && a.text(1)?.eq_ignore_ascii_case("random") {
                true => AddressType::Random,
                false => AddressType::Public,
            };
            let connection = peers.connect(addr);
            Ok(Action::Peer(vec![GattEvent::Connection(
                ConnectionEvent::Connected {
                    addr,
                    addr_type,
                    connection,
                },
            )]))
        },
    },
    CommandSpec {
        name: "PEERDISCONNECT",
        usage: "PEERDISCONNECT <addr>",
        summary: "a peer drops its link",
        build: |peers, a| {
            let addr = a.addr(0)?;
            peers.disconnect(&addr)?;
            Ok(Action::Peer(vec![GattEvent::Connection(
                ConnectionEvent::Disconnected { addr },
            )]))
        },
    },
    CommandSpec {
        name: "PEERENCRYPT",
        usage: "PEERENCRYPT <addr> <0|1>",
        summary: "link encryption changes",
        build: |peers, a| {
            let addr = a.addr(0)?;
            peers.connection(&addr)?;
            Ok(Action::Peer(vec![GattEvent::Connection(
                ConnectionEvent::EncryptionChanged {
                    addr,
                    encrypted: a.flag(1)?,
                },
            )]))
        },
    },
    CommandSpec {
        name: "PEERBOND",
        usage: "PEERBOND <addr> <0|1>",
        summary: "pairing stores or drops the long term key",
        build: |_, a| {
            Ok(Action::Peer(vec![GattEvent::Connection(
                ConnectionEvent::KeyUpdate {
                    addr: a.addr(0)?,
                    ltk_valid: a.flag(1)?,
                },
            )]))
        },
    },
    CommandSpec {
        name: "PEERSUBSCRIBE",
        usage: "PEERSUBSCRIBE <addr> <measurement|context|racp> <cccd value>",
        summary: "a peer writes a local client configuration descriptor",
        build: |peers, a| {
            let addr = a.addr(0)?;
            Ok(Action::Peer(vec![GattEvent::Server(
                ServerEvent::ClientConfigurationUpdate {
                    connection: peers.connection(&addr)?,
                    addr,
                    characteristic: a.characteristic(1)?,
                    value: ClientConfiguration::new(a.number(2)?),
                },
            )]))
        },
    },
    CommandSpec {
        name: "PEERREADCONFIG",
        usage: "PEERREADCONFIG <addr> <measurement|context|racp>",
        summary: "a peer reads a local client configuration descriptor",
        build: |peers, a| {
            let addr = a.addr(0)?;
            Ok(Action::Peer(vec![GattEvent::Server(
                ServerEvent::ReadClientConfiguration {
                    connection: peers.connection(&addr)?,
                    addr,
                    transaction: peers.next_transaction(),
                    characteristic: a.characteristic(1)?,
                },
            )]))
        },
    },
    CommandSpec {
        name: "PEERRACP",
        usage: "PEERRACP <addr> <command hex>",
        summary: "a peer writes the local RACP",
        build: |peers, a| {
            let addr = a.addr(0)?;
            let command = RacpCommand::decode(&a.bytes(1)?)?;
            Ok(Action::Peer(vec![GattEvent::Server(ServerEvent::RacpCommand {
                connection: peers.connection(&addr)?,
                addr,
                transaction: peers.next_transaction(),
                command,
            })]))
        },
    },
    CommandSpec {
        name: "PEERCONFIRM",
        usage: "PEERCONFIRM <addr> [status]",
        summary: "a peer confirms a local indication",
        build: |peers, a| {
            let addr = a.addr(0)?;
            Ok(Action::Peer(vec![GattEvent::Server(ServerEvent::Confirmation {
                connection: peers.connection(&addr)?,
                addr,
                status: a.optional_number(1)?.unwrap_or(0),
            })]))
        },
    },
    CommandSpec {
        name: "PEERSERVICE",
        usage: "PEERSERVICE <addr>",
        summary: "answer a GLS discovery with a standard service layout",
        build: |peers, a| {
            let addr = a.addr(0)?;
            let connection = peers.connection(&addr)?;
            let token = CorrelationToken::Discovery(DiscoveryKind::Gls);
            Ok(Action::Peer(vec![
                GattEvent::Discovery(DiscoveryEvent::Indication {
                    connection,
                    addr,
                    token,
                    service: standard_gls_service(),
                }),
                GattEvent::Discovery(DiscoveryEvent::Complete {
                    connection,
                    addr,
                    token,
                    status: DiscoveryStatus::Success,
                }),
            ]))
        },
    },
    CommandSpec {
        name: "PEERVALUE",
        usage: "PEERVALUE <addr> <handle> <value hex> [indicate 0|1]",
        summary: "a peer notifies or indicates a value",
        build: |peers, a| {
            let addr = a.addr(0)?;
            let indication = match a.has(3) {
                true => a.flag(3)?,
                false => false,
            };
            Ok(Action::Peer(vec![GattEvent::Client(ClientEvent::HandleValue {
                connection: peers.connection(&addr)?,
                addr,
                transaction: peers.next_transaction(),
                handle: a.number(1)?,
                indication,
                value: a.bytes(2)?,
            })]))
        },
    },
    CommandSpec {
        name: "PEERREAD",
        usage: "PEERREAD <addr> <handle> <value hex>",
        summary: "a peer answers a read",
        build: |peers, a| {
            let addr = a.addr(0)?;
            let handle: Handle = a.number(1)?;
            Ok(Action::Peer(vec![GattEvent::Client(ClientEvent::ReadResponse {
                connection: peers.connection(&addr)?,
                addr,
                token: CorrelationToken::Attribute(handle),
                value: a.bytes(2)?,
            })]))
        },
    },
    CommandSpec {
        name: "PEERWRITE",
        usage: "PEERWRITE <addr> <handle>",
        summary: "a peer acknowledges a write",
        build: |peers, a| {
            let addr = a.addr(0)?;
            Ok(Action::Peer(vec![GattEvent::Client(ClientEvent::WriteResponse {
                connection: peers.connection(&addr)?,
                addr,
                token: CorrelationToken::Attribute(a.number(1)?),
            })]))
        },
    },
    CommandSpec {
        name: "PEERERROR",
        usage: "PEERERROR <addr> <handle> <att error code>",
        summary: "a peer rejects a request",
        build: |peers, a| {
            let addr = a.addr(0)?;
            let handle: Handle = a.number(1)?;
            Ok(Action::Peer(vec![GattEvent::Client(ClientEvent::ErrorResponse {
                connection: peers.connection(&addr)?,
                addr,
                token: CorrelationToken::Attribute(handle),
                handle,
                code: a.number(2)?,
            })]))
        },
    },
    CommandSpec {
        name: "PEERTIMEOUT",
        usage: "PEERTIMEOUT <addr> <handle>",
        summary: "a request to the peer times out",
        build: |peers, a| {
            let addr = a.addr(0)?;
            Ok(Action::Peer(vec![GattEvent::Client(ClientEvent::ProtocolTimeout {
                connection: peers.connection(&addr)?,
                addr,
                token: CorrelationToken::Attribute(a.number(1)?),
            })]))
        },
    },
];

/// Resolve a tokenized line against the command table
pub fn parse(line: &CommandLine, peers: &mut PeerLinks) -> Result<Action> {
    let spec = COMMANDS
        .iter()
        .find(|spec| spec.name == line.name)
        .ok_or_else(|| CliError::UnknownCommand(line.name.clone()))?;

    let args = Args {
        params: &line.params,
        usage: spec.usage,
    };
    (spec.build)(peers, &args)
}

pub fn help_text() -> String {
    let mut text = String::from("Commands:\n");
    for spec in COMMANDS {
        text.push_str(&format!("  {:<70} {}\n", spec.usage, spec.summary));
    }
    text
}

/// GLS layout served by `PEERSERVICE`
pub fn standard_gls_service() -> DiscoveredService {
    DiscoveredService::new(uuids::GLUCOSE_SERVICE, 0x0010, 0x001B)
        .with_characteristic(
            DiscoveredCharacteristic::new(0x0012, uuids::GLUCOSE_MEASUREMENT, properties::NOTIFY)
                .with_descriptor(0x0013, uuids::CLIENT_CHARACTERISTIC_CONFIGURATION),
        )
        .with_characteristic(
            DiscoveredCharacteristic::new(
                0x0015,
                uuids::GLUCOSE_MEASUREMENT_CONTEXT,
                properties::NOTIFY,
            )
            .with_descriptor(0x0016, uuids::CLIENT_CHARACTERISTIC_CONFIGURATION),
        )
        .with_characteristic(DiscoveredCharacteristic::new(
            0x0018,
            uuids::GLUCOSE_FEATURE,
            properties::READ,
        ))
        .with_characteristic(
            DiscoveredCharacteristic::new(
                0x001A,
                uuids::RECORD_ACCESS_CONTROL_POINT,
                properties::WRITE | properties::INDICATE,
            )
            .with_descriptor(0x001B, uuids::CLIENT_CHARACTERISTIC_CONFIGURATION),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::tokenize;

    const ADDR: &str = "00:1B:DC:07:31:88";

    fn run(peers: &mut PeerLinks, line: &str) -> Result<Action> {
        parse(&tokenize(line).unwrap().unwrap(), peers)
    }

    fn addr() -> BdAddr {
        ADDR.parse().unwrap()
    }

    #[test]
    fn test_unknown_command() {
        let err = run(&mut PeerLinks::new(), "FROBNICATE").unwrap_err();
        assert!(matches!(err, CliError::UnknownCommand(name) if name == "FROBNICATE"));
    }

    #[test]
    fn test_missing_parameter_reports_usage() {
        let err = run(&mut PeerLinks::new(), "discover").unwrap_err();
        assert!(matches!(err, CliError::Usage(usage) if usage.starts_with("DISCOVER")));
    }

    #[test]
    fn test_discover_command() {
        let action = run(&mut PeerLinks::new(), &format!("discover {} dis", ADDR)).unwrap();
        assert_eq!(
            action,
            Action::Session(Command::Discover {
                addr: addr(),
                kind: DiscoveryKind::Dis
            })
        );
    }

    #[test]
    fn test_racp_command_from_hex() {
        let action = run(&mut PeerLinks::new(), &format!("RACP {} 0101", ADDR)).unwrap();
        assert_eq!(
            action,
            Action::Session(Command::StartProcedure {
                addr: addr(),
                command: RacpCommand::report_all(),
            })
        );

        let err = run(&mut PeerLinks::new(), &format!("RACP {} zz", ADDR)).unwrap_err();
        assert!(matches!(err, CliError::HexDecoding(_)));
    }

    #[test]
    fn test_peer_events_need_a_link() {
        let mut peers = PeerLinks::new();
        let err = run(&mut peers, &format!("PEERRACP {} 0101", ADDR)).unwrap_err();
        assert!(matches!(err, CliError::Profile(_)));

        run(&mut peers, &format!("PEERCONNECT {}", ADDR)).unwrap();
        let Action::Peer(events) = run(&mut peers, &format!("PEERRACP {} 0101", ADDR)).unwrap()
        else {
            panic!("expected peer events");
        };
        assert!(matches!(
            &events[0],
            GattEvent::Server(ServerEvent::RacpCommand { connection: ConnectionId(1), .. })
        ));
    }

    #[test]
    fn test_measurement_with_concentration() {
        let line = format!("NOTIFYMEASUREMENT {} 7 2024 3 1 8 30 0 -55 -4", ADDR);
        let Action::Session(Command::NotifyMeasurement { measurement, .. }) =
            run(&mut PeerLinks::new(), &line).unwrap()
        else {
            panic!("expected measurement");
        };
        assert_eq!(measurement.sequence_number, 7);
        assert_eq!(measurement.base_time, DateTime::new(2024, 3, 1, 8, 30, 0));
        let concentration = measurement.concentration.unwrap();
        assert_eq!(concentration.value.mantissa(), -55);
        assert_eq!(concentration.value.exponent(), -4);
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let line = format!("NOTIFYMEASUREMENT {} 7 2024 13 1 8 30 0", ADDR);
        assert!(matches!(
            run(&mut PeerLinks::new(), &line),
            Err(CliError::Profile(_))
        ));
    }

    #[test]
    fn test_peer_service_layout() {
        let mut peers = PeerLinks::new();
        run(&mut peers, &format!("PEERCONNECT {} random", ADDR)).unwrap();
        let Action::Peer(events) = run(&mut peers, &format!("PEERSERVICE {}", ADDR)).unwrap()
        else {
            panic!("expected peer events");
        };
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            GattEvent::Discovery(DiscoveryEvent::Complete {
                status: DiscoveryStatus::Success,
                ..
            })
        ));
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_text();
        for spec in COMMANDS {
            assert!(help.contains(spec.usage));
        }
    }
}
