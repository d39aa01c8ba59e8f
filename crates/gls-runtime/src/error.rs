//! Runtime errors

use gls_core::GlsError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("{channel} channel closed")]
    ChannelClosed { channel: &'static str },

    #[error("Profile error: {0}")]
    Profile(#[from] GlsError),

    #[error("Session task failed: {reason}")]
    TaskFailed { reason: String },
}

pub type RuntimeResult<T> = core::result::Result<T, RuntimeError>;
