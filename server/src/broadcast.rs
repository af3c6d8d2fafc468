//! Best-effort fan-out of server messages to connected clients.
//!
//! Each connection registers a bounded outbound queue that its socket writer
//! drains. A message is serialized once and pushed with `try_send`; when a
//! queue is full or its writer has gone away the frame is skipped for that
//! connection. Nothing is retried: game state is re-sent every tick, so a
//! dropped frame is superseded by the next one.

use crate::client_manager::ClientId;
use crate::error::SessionError;
use log::{debug, error};
use shared::ServerMessage;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Outbound frames buffered per connection before sends start being skipped.
pub const OUTBOUND_CAPACITY: usize = 64;

pub type Outbound = mpsc::Sender<String>;

#[derive(Default)]
pub struct Broadcaster {
    connections: HashMap<ClientId, Outbound>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, client_id: ClientId, outbound: Outbound) {
        self.connections.insert(client_id, outbound);
    }

    pub fn unregister(&mut self, client_id: &str) -> bool {
        self.connections.remove(client_id).is_some()
    }

    /// Delivers `message` to every writable connection.
    ///
    /// Returns the number of connections the frame was queued for.
    pub fn broadcast_to_all(&self, message: &ServerMessage) -> usize {
        let Some(text) = Self::encode(message) else {
            return 0;
        };

        let mut delivered = 0;
        for (client_id, outbound) in &self.connections {
            match Self::deliver(client_id, outbound, &text) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Skipped {}: {}", message.kind(), e),
            }
        }
        delivered
    }

    /// Delivers `message` to a single connection.
    pub fn send_to_one(
        &self,
        client_id: &str,
        message: &ServerMessage,
    ) -> Result<(), SessionError> {
        let outbound = self
            .connections
            .get(client_id)
            .ok_or_else(|| SessionError::UnknownIdentity(client_id.to_string()))?;
        let text = message.to_json()?;
        Self::deliver(client_id, outbound, &text)
    }

    fn encode(message: &ServerMessage) -> Option<String> {
        match message.to_json() {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Failed to serialize {}: {}", message.kind(), e);
                None
            }
        }
    }

    fn deliver(client_id: &str, outbound: &Outbound, text: &str) -> Result<(), SessionError> {
        match outbound.try_send(text.to_owned()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                Err(SessionError::ConnectionUnwritable(client_id.to_string()))
            }
        }
    }
}
