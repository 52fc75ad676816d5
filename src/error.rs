//! Error taxonomy of the controller.
//!
//! None of these are fatal: registry and command errors are logged and the
//! next element or message is processed, decode errors drop the message and
//! connection errors feed the reconnect state machine.
use thiserror::Error;

use crate::robot::registry::ServoId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("servo registry is full (capacity {0})")]
    Full(usize),

    #[error("no servo named {0:?}")]
    NotFound(ServoId),

    #[error("no servo in slot {0}")]
    SlotNotFound(usize),

    #[error("servo {0:?} is deactivated")]
    Inactive(ServoId),

    #[error("servo {0:?} is already registered")]
    Duplicate(ServoId),

    #[error("invalid angle range {min}..={max}")]
    InvalidRange { min: i32, max: i32 },

    #[error("servo id longer than {} bytes", crate::config::MAX_ID_LEN)]
    IdTooLong,
}

/// Inbound payload could not be decoded, the message is dropped as a whole.
#[derive(Error, Debug)]
#[error("malformed command payload: {0}")]
pub struct DecodeError(pub serde_json::Error);

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self(err)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnError {
    #[error("network is down")]
    Network,

    #[error("broker refused the connection (code {0})")]
    Refused(u8),

    #[error("channel session not established yet")]
    Pending,

    #[error("channel is not connected")]
    NotConnected,

    #[error("outbound queue is full")]
    QueueFull,

    #[error("transport i/o failure")]
    Io,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("expected {expected} positions, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
}
