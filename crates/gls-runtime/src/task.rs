//! Session Task
//!
//! The single task that owns a [`GlsSession`]. Commands and transport events
//! are taken one at a time; handlers run to completion before the next input
//! is looked at. Handler errors never stop the loop, only closed channels do.

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use gls_core::{GattLayer, GlsConfig};

use crate::channel::{
    create_app_event_channel, create_command_channel, create_event_channel, AppEventReceiver,
    AppEventSender, CommandReceiver, CommandSender, EventReceiver, EventSender,
};
use crate::error::{RuntimeError, RuntimeResult};
use crate::session::{AppEvent, Command, GlsSession};

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

pub struct SessionTask<G: GattLayer> {
    session: GlsSession<G>,
    command_receiver: CommandReceiver,
    event_receiver: EventReceiver,
    app_event_sender: AppEventSender,
    running: bool,
}

impl<G: GattLayer> SessionTask<G> {
    pub fn new(
        session: GlsSession<G>,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        app_event_sender: AppEventSender,
    ) -> Self {
        Self {
            session,
            command_receiver,
            event_receiver,
            app_event_sender,
            running: true,
        }
    }

    /// Run until `Shutdown` or the command channel closes, then hand the
    /// session back
    pub async fn run(mut self) -> RuntimeResult<GlsSession<G>> {
        info!("Session task starting");
        let mut events_open = true;

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => {
                            debug!(operation = command.name(), "Command received");
                            if command == Command::Shutdown {
                                self.running = false;
                            }
                            let events = self.session.handle_command(command);
                            self.emit(events).await?;
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }

                event = self.event_receiver.recv(), if events_open => {
                    match event {
                        Some(event) => {
                            let events = self.session.handle_event(event);
                            self.emit(events).await?;
                        }
                        None => {
                            info!("Event channel closed");
                            events_open = false;
                        }
                    }
                }
            }
        }

        info!(stats = ?self.session.stats(), "Session task stopped");
        Ok(self.session)
    }

    async fn emit(&mut self, events: Vec<AppEvent>) -> RuntimeResult<()> {
        for event in events {
            if self.app_event_sender.send(event).await.is_err() {
                error!("App event receiver dropped");
                return Err(RuntimeError::ChannelClosed { channel: "app event" });
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Spawning
// ----------------------------------------------------------------------------

/// Channels and join handle of a spawned session task
pub struct SessionHandle<G: GattLayer> {
    pub commands: CommandSender,
    pub events: EventSender,
    pub app_events: AppEventReceiver,
    pub task: JoinHandle<RuntimeResult<GlsSession<G>>>,
}

impl<G: GattLayer> SessionHandle<G> {
    /// Close the input channels, drain pending app events and wait for the
    /// session
    pub async fn shutdown(self) -> RuntimeResult<GlsSession<G>> {
        let SessionHandle {
            commands,
            events,
            mut app_events,
            task,
        } = self;
        drop(commands);
        drop(events);
        while app_events.recv().await.is_some() {}

        match task.await {
            Ok(result) => result,
            Err(e) => Err(RuntimeError::TaskFailed {
                reason: e.to_string(),
            }),
        }
    }
}

/// Build a session from `config` and run it on a new tokio task
pub fn spawn_session<G>(config: GlsConfig, gatt: G) -> RuntimeResult<SessionHandle<G>>
where
    G: GattLayer + Send + 'static,
{
    let (commands, command_receiver) = create_command_channel(&config.channels);
    let (events, event_receiver) = create_event_channel(&config.channels);
    let (app_event_sender, app_events) = create_app_event_channel(&config.channels);

    let session = GlsSession::new(config, gatt)?;
    let task = SessionTask::new(session, command_receiver, event_receiver, app_event_sender);

    Ok(SessionHandle {
        commands,
        events,
        app_events,
        task: tokio::spawn(task.run()),
    })
}
