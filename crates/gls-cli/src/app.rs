//! Shell application
//!
//! Reads command lines, turns them into session commands or simulated peer
//! events, and prints whatever the session reports back.

use std::io::{IsTerminal, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use gls_runtime::{
    spawn_session, AppEventReceiver, Command, CommandSender, RuntimeError, SessionHandle,
    SessionStats,
};

use crate::commands::{self, help_text, Action, PeerLinks};
use crate::config::CliAppConfig;
use crate::console::ConsoleGatt;
use crate::display::render;
use crate::error::{CliError, Result};
use crate::shell::tokenize;

/// What the input loop does after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

// ----------------------------------------------------------------------------
// Shell
// ----------------------------------------------------------------------------

/// Simulated peer events go through the command channel so they keep their
/// order relative to the commands around them.
pub struct Shell {
    commands: CommandSender,
    peers: PeerLinks,
}

impl Shell {
    pub fn new(commands: CommandSender) -> Self {
        Self {
            commands,
            peers: PeerLinks::new(),
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RuntimeError::ChannelClosed { channel: "command" }.into())
    }

    /// Execute one input line
    pub async fn execute(&mut self, line: &str) -> Result<Flow> {
        let Some(line) = tokenize(line)? else {
            return Ok(Flow::Continue);
        };

        match commands::parse(&line, &mut self.peers)? {
            Action::Quit => return Ok(Flow::Quit),
            Action::Help => print!("{}", help_text()),
            Action::Session(command) => {
                debug!(operation = command.name(), "Sending command");
                self.send(command).await?;
            }
            Action::Peer(events) => {
                for event in events {
                    self.send(Command::InjectEvent(event)).await?;
                }
            }
        }
        Ok(Flow::Continue)
    }
}

// ----------------------------------------------------------------------------
// Application Loop
// ----------------------------------------------------------------------------

/// Run the shell on stdin until QUIT or end of input
pub async fn run(config: CliAppConfig) -> Result<SessionStats> {
    let gatt = ConsoleGatt::stdout(config.shell.echo_requests);
    let SessionHandle {
        commands,
        events,
        app_events,
        task,
    } = spawn_session(config.profile.clone(), gatt)?;
    // no radio behind the shell
    drop(events);

    let printer = tokio::spawn(print_app_events(app_events, config.shell.pretty_json));
    let mut shell = Shell::new(commands);

    let interactive = std::io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("GLS shell ready, type HELP for commands");

    loop {
        if interactive {
            print!("{}", config.shell.prompt);
            std::io::stdout().flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            debug!("End of input");
            break;
        };

        match shell.execute(&line).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(CliError::Runtime(e)) => {
                warn!("Session is gone: {}", e);
                break;
            }
            Err(e) => println!("{}", e),
        }
    }

    // closing the command channel stops the session task
    drop(shell);
    let session = task
        .await
        .map_err(|e| RuntimeError::TaskFailed {
            reason: e.to_string(),
        })??;
    if let Err(e) = printer.await {
        warn!("Event printer failed: {}", e);
    }

    Ok(session.stats().clone())
}

async fn print_app_events(mut receiver: AppEventReceiver, pretty_json: bool) {
    while let Some(event) = receiver.recv().await {
        match render(&event, pretty_json) {
            Ok(lines) => {
                for line in lines {
                    println!("{}", line);
                }
            }
            Err(e) => warn!("Failed to render {:?}: {}", event, e),
        }
    }
}
