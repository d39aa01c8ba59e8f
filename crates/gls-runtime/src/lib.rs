//! GLS Runtime
//!
//! Drives the synchronous profile components of `gls-core` from a single
//! tokio task:
//! - `GlsSession`: context owning the registry, the local server and the
//!   GATT layer
//! - `SessionTask`: the actor loop over command and event channels
//! - `spawn_session`: wiring of channels and task from a `GlsConfig`

pub mod channel;
pub mod error;
pub mod session;
pub mod task;

pub use channel::{
    create_app_event_channel, create_command_channel, create_event_channel, AppEventReceiver,
    AppEventSender, CommandReceiver, CommandSender, EventReceiver, EventSender,
};
pub use error::{RuntimeError, RuntimeResult};
pub use session::{AppEvent, Command, GlsSession, SessionStats};
pub use task::{spawn_session, SessionHandle, SessionTask};

// Re-export core types for convenience
pub use gls_core::{GattEvent, GattLayer, GattRequest, GlsConfig, GlsError, RecordingGatt};
