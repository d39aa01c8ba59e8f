//! Channel types between the session task and its producers/consumers

use gls_core::{ChannelConfig, GattEvent};
use tokio::sync::mpsc;

use crate::session::{AppEvent, Command};

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;
pub type EventSender = mpsc::Sender<GattEvent>;
pub type EventReceiver = mpsc::Receiver<GattEvent>;
pub type AppEventSender = mpsc::Sender<AppEvent>;
pub type AppEventReceiver = mpsc::Receiver<AppEvent>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    mpsc::channel(config.command_buffer_size)
}

pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
    mpsc::channel(config.event_buffer_size)
}

pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    mpsc::channel(config.app_event_buffer_size)
}
