//! Client struct definition
//!
//! Represents a registered client: a connection bound to a username and
//! to exactly one current room.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::types::{ConnectionId, RoomId};

/// Registered client information
///
/// Cloning a client clones its outbound sender, which is how broadcast
/// takes a snapshot of room membership.
#[derive(Debug, Clone)]
pub struct Client {
    /// Identity of the wrapped connection (and of the client)
    pub connection: ConnectionId,
    /// Display name chosen at registration
    pub username: String,
    /// Room the client currently belongs to
    pub current_room: RoomId,
    /// Server → Client line channel
    sender: mpsc::Sender<String>,
}

impl Client {
    /// Create a new client. `current_room` is set on registration.
    pub fn new(
        connection: ConnectionId,
        username: String,
        sender: mpsc::Sender<String>,
        current_room: RoomId,
    ) -> Self {
        Self {
            connection,
            username,
            current_room,
            sender,
        }
    }

    /// Queue one line for this client without waiting
    ///
    /// Fails if the channel is closed (client disconnected) or the client
    /// has fallen a full queue behind.
    pub fn send(&self, line: String) -> Result<(), SendError> {
        self.sender.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}
