use shared::Slot;
use thiserror::Error;

use crate::client_manager::ClientId;

/// Failures raised by room mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("{0} slot is already occupied")]
    SlotOccupied(Slot),
}

/// Failures raised while routing connections and their messages.
///
/// None of these are fatal; the session router logs them and, where the
/// sender should know, answers with an `ERROR` message.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown identity {0}")]
    UnknownIdentity(ClientId),

    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("connection {0} is not writable")]
    ConnectionUnwritable(ClientId),

    #[error("Server full")]
    ServerFull,
}
