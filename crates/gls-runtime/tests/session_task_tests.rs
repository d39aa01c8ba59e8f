//! Integration tests for the session actor loop

use std::time::Duration;

use gls_core::codec::{RacpCommand, RacpOpcode, RacpResponseCode};
use gls_core::{
    AddressType, BdAddr, ClientConfiguration, ConfigurableCharacteristic, ConnectionEvent,
    ConnectionId, DiscoveryKind, GattRequest, ServerEvent, ServerOutcome, TransactionId,
};
use gls_runtime::{spawn_session, AppEvent, Command, GattEvent, GlsConfig, RecordingGatt};
use tokio::time::timeout;

const ADDR: BdAddr = BdAddr::new([0x00, 0x1B, 0xDC, 0x07, 0x31, 0x88]);

async fn next_event(receiver: &mut gls_runtime::AppEventReceiver) -> AppEvent {
    timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("app event within timeout")
        .expect("app event channel open")
}

fn connected() -> GattEvent {
    GattEvent::Connection(ConnectionEvent::Connected {
        addr: ADDR,
        addr_type: AddressType::Public,
        connection: ConnectionId(1),
    })
}

#[tokio::test]
async fn test_commands_and_events_are_serialized() {
    let mut handle = spawn_session(GlsConfig::testing(), RecordingGatt::new()).unwrap();

    handle.events.send(connected()).await.unwrap();
    assert_eq!(
        next_event(&mut handle.app_events).await,
        AppEvent::Connected {
            addr: ADDR,
            connection: ConnectionId(1)
        }
    );

    handle
        .commands
        .send(Command::Discover {
            addr: ADDR,
            kind: DiscoveryKind::Gls,
        })
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut handle.app_events).await,
        AppEvent::RequestIssued {
            operation: "discover",
            ..
        }
    ));

    // second discovery fails but the loop keeps running
    handle
        .commands
        .send(Command::Discover {
            addr: ADDR,
            kind: DiscoveryKind::Dis,
        })
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut handle.app_events).await,
        AppEvent::CommandFailed {
            operation: "discover",
            ..
        }
    ));

    handle.commands.send(Command::ListDevices).await.unwrap();
    let AppEvent::DeviceList(devices) = next_event(&mut handle.app_events).await else {
        panic!("expected device list");
    };
    assert!(devices[0].discovery_outstanding());

    let session = tokio_test::assert_ok!(handle.shutdown().await);
    assert_eq!(session.gatt().requests().len(), 1);
    assert_eq!(session.stats().commands_failed, 1);
}

#[tokio::test]
async fn test_racp_server_round_trip() {
    let mut handle = spawn_session(GlsConfig::testing(), RecordingGatt::new()).unwrap();

    let inputs = vec![
        connected(),
        GattEvent::Server(ServerEvent::ClientConfigurationUpdate {
            connection: ConnectionId(1),
            addr: ADDR,
            characteristic: ConfigurableCharacteristic::Racp,
            value: ClientConfiguration::INDICATE,
        }),
        GattEvent::Server(ServerEvent::RacpCommand {
            connection: ConnectionId(1),
            addr: ADDR,
            transaction: TransactionId(20),
            command: RacpCommand::report_all(),
        }),
        GattEvent::Server(ServerEvent::RacpCommand {
            connection: ConnectionId(1),
            addr: ADDR,
            transaction: TransactionId(21),
            command: RacpCommand::report_all(),
        }),
    ];
    for input in inputs {
        handle.events.send(input).await.unwrap();
    }

    next_event(&mut handle.app_events).await;
    next_event(&mut handle.app_events).await;
    let AppEvent::Server(ServerOutcome::Racp(first)) = next_event(&mut handle.app_events).await else {
        panic!("expected RACP decision");
    };
    let AppEvent::Server(ServerOutcome::Racp(second)) = next_event(&mut handle.app_events).await else {
        panic!("expected RACP decision");
    };
    assert!(first.accepted());
    assert_eq!(second.code, 0x80);

    handle
        .commands
        .send(Command::IndicateResult {
            addr: ADDR,
            request_opcode: RacpOpcode::ReportStoredRecords,
            code: RacpResponseCode::NoRecordsFound,
        })
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut handle.app_events).await,
        AppEvent::RequestIssued { .. }
    ));

    let session = handle.shutdown().await.unwrap();
    assert!(!session.registry().find(&ADDR).unwrap().racp_outstanding());
    assert!(matches!(
        session.gatt().last_request(),
        Some(GattRequest::Indicate { value, .. }) if value == &vec![0x06, 0x00, 0x01, 0x06]
    ));
}

#[tokio::test]
async fn test_shutdown_command_stops_task() {
    let mut handle = spawn_session(GlsConfig::testing(), RecordingGatt::new()).unwrap();
    handle.commands.send(Command::Shutdown).await.unwrap();
    assert_eq!(next_event(&mut handle.app_events).await, AppEvent::Stopped);

    let result = timeout(Duration::from_secs(1), handle.task).await.unwrap();
    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn test_closed_event_channel_keeps_commands_flowing() {
    let handle = spawn_session(GlsConfig::testing(), RecordingGatt::new()).unwrap();
    let gls_runtime::SessionHandle {
        commands,
        events,
        mut app_events,
        task,
    } = handle;
    drop(events);

    commands.send(Command::ListDevices).await.unwrap();
    assert_eq!(next_event(&mut app_events).await, AppEvent::DeviceList(Vec::new()));

    drop(commands);
    let session = timeout(Duration::from_secs(1), task).await.unwrap().unwrap().unwrap();
    assert!(session.registry().is_empty());
}
