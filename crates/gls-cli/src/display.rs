//! Text rendering of session output

use gls_core::{ClientOutcome, DiscoveryUpdate, ProcedureOutcome, ServerOutcome};
use gls_runtime::AppEvent;

use crate::error::Result;

/// Render one application event as shell output lines.
///
/// Events that carry nothing worth showing render to no lines.
pub fn render(event: &AppEvent, pretty_json: bool) -> Result<Vec<String>> {
    let lines = match event {
        AppEvent::Connected { addr, connection } => {
            vec![format!("{} connected on link {}", addr, connection)]
        }
        AppEvent::Disconnected { addr, retained } => vec![format!(
            "{} disconnected, record {}",
            addr,
            if *retained { "retained" } else { "deleted" }
        )],
        AppEvent::EncryptionChanged { addr, encrypted } => vec![format!(
            "{} link {}",
            addr,
            if *encrypted { "encrypted" } else { "not encrypted" }
        )],
        AppEvent::Discovery(update) => render_discovery(update),
        AppEvent::Client(outcome) => render_client(outcome),
        AppEvent::Procedure(outcome) => render_procedure(outcome),
        AppEvent::Server(outcome) => vec![render_server(outcome)],
        AppEvent::RequestIssued {
            operation,
            transaction,
        } => vec![format!("{} issued, transaction {}", operation, transaction)],
        AppEvent::CommandFailed { operation, error } => {
            vec![format!("{} returned {}: {}", operation, error.code(), error)]
        }
        AppEvent::FeaturesChanged(features) => vec![format!("Local features: {}", features)],
        AppEvent::DeviceDeleted { addr, existed } => vec![if *existed {
            format!("{} deleted", addr)
        } else {
            format!("{} is not known", addr)
        }],
        AppEvent::DeviceList(devices) if devices.is_empty() => vec!["No devices".to_string()],
        AppEvent::DeviceList(devices) if pretty_json => {
            vec![serde_json::to_string_pretty(devices)?]
        }
        AppEvent::DeviceList(devices) => devices
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?,
        AppEvent::Stopped => vec!["Session stopped".to_string()],
    };
    Ok(lines)
}

fn render_discovery(update: &DiscoveryUpdate) -> Vec<String> {
    match update {
        DiscoveryUpdate::Populated {
            addr,
            kind,
            warnings,
        } => {
            let mut lines = vec![format!("{} {} service found", addr, kind)];
            lines.extend(warnings.iter().map(|w| format!("  warning: {}", w)));
            lines
        }
        DiscoveryUpdate::Completed { addr, status } => {
            vec![format!("{} discovery complete: {:?}", addr, status)]
        }
        DiscoveryUpdate::Ignored => Vec::new(),
    }
}

fn render_client(outcome: &ClientOutcome) -> Vec<String> {
    let line = match outcome {
        ClientOutcome::AttError {
            addr,
            handle,
            report,
        } => format!("{} handle 0x{:04X}: {}", addr, handle, report),
        ClientOutcome::Timeout { addr, token } => format!("{} timed out on {:?}", addr, token),
        ClientOutcome::Features { addr, features } => format!("{} features: {}", addr, features),
        ClientOutcome::RacpResponse { addr, response } => format!("{} RACP: {}", addr, response),
        ClientOutcome::Measurement { addr, measurement } => format!("{} {}", addr, measurement),
        ClientOutcome::Context { addr, context } => format!("{} {}", addr, context),
        ClientOutcome::Written { addr, handle } => {
            format!("{} write to 0x{:04X} acknowledged", addr, handle)
        }
        ClientOutcome::Raw {
            addr,
            handle,
            value,
        } => format!("{} 0x{:04X} = {}", addr, handle, hex::encode(value)),
        ClientOutcome::Malformed {
            addr,
            handle,
            error,
            value,
        } => format!(
            "{} 0x{:04X} malformed ({}): {}",
            addr,
            handle,
            error,
            hex::encode(value)
        ),
        ClientOutcome::Ignored => return Vec::new(),
    };
    vec![line]
}

fn render_procedure(outcome: &ProcedureOutcome) -> Vec<String> {
    match outcome {
        ProcedureOutcome::Completed {
            addr,
            request,
            response,
        } => vec![format!("{} {} finished: {}", addr, request, response)],
        ProcedureOutcome::AbortFailed { addr, code } => {
            vec![format!("{} abort refused: {:?}", addr, code)]
        }
        ProcedureOutcome::Ignored => Vec::new(),
    }
}

fn render_server(outcome: &ServerOutcome) -> String {
    match outcome {
        ServerOutcome::Racp(decision) if decision.accepted() => {
            format!("{} RACP accepted: {}", decision.addr, decision.command)
        }
        ServerOutcome::Racp(decision) => format!(
            "{} RACP rejected with 0x{:02X}: {}",
            decision.addr, decision.code, decision.command
        ),
        ServerOutcome::ConfigurationRead {
            addr,
            characteristic,
            value,
        } => format!("{} read {} configuration: {}", addr, characteristic.name(), value),
        ServerOutcome::ConfigurationUpdated {
            addr,
            characteristic,
            value,
        } => format!("{} set {} configuration: {}", addr, characteristic.name(), value),
        ServerOutcome::Confirmed { addr, status } => {
            format!("{} confirmed indication, status 0x{:02X}", addr, status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gls_core::{BdAddr, ConnectionId, GlsError};

    const ADDR: BdAddr = BdAddr::new([0x00, 0x1B, 0xDC, 0x07, 0x31, 0x88]);

    #[test]
    fn test_failure_shows_operation_and_code() {
        let event = AppEvent::CommandFailed {
            operation: "discover",
            error: GlsError::not_connected(ADDR),
        };
        let lines = render(&event, false).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("discover returned -1100: "));
    }

    #[test]
    fn test_connected_line() {
        let event = AppEvent::Connected {
            addr: ADDR,
            connection: ConnectionId(3),
        };
        assert_eq!(
            render(&event, false).unwrap(),
            vec![format!("{} connected on link 3", ADDR)]
        );
    }

    #[test]
    fn test_ignored_outcomes_render_nothing() {
        assert!(render(&AppEvent::Client(ClientOutcome::Ignored), false)
            .unwrap()
            .is_empty());
        assert!(render(&AppEvent::Procedure(ProcedureOutcome::Ignored), true)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_device_list() {
        assert_eq!(
            render(&AppEvent::DeviceList(Vec::new()), true).unwrap(),
            vec!["No devices".to_string()]
        );
    }
}
