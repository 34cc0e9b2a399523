//! Error type shared by every dispatcher operation.

use std::any::Any;

use thiserror::Error;

/// Errors surfaced by the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A suspension point was awaited while no dispatcher was running on this thread.
    #[error("no dispatcher is running on the current thread")]
    NotRunning,

    /// Another caller is already consuming this dispatcher's loop.
    #[error("dispatcher is already running")]
    AlreadyRunning,

    /// The operation panicked while it was executing.
    #[error("operation panicked: {0}")]
    OperationPanicked(String),

    /// The operation was dropped before the dispatcher got to run it.
    #[error("operation was dropped before it ran")]
    Canceled,

    /// The dispatcher thread could not be created.
    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("unknown priority `{0}`")]
    InvalidPriority(String),
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;

// Extracts the message carried by a panic payload, if it has one.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
