//! Chat message model
//!
//! A `Message` is an immutable record of an author, a text body and an
//! optional set of target clients.

use std::collections::HashSet;

use crate::client::Client;
use crate::types::{ConnectionId, RoomId};

/// Who wrote a message: a client, or a room posting a system notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    Client {
        connection: ConnectionId,
        username: String,
    },
    Room {
        id: RoomId,
        chat_name: String,
    },
}

impl Author {
    /// Name shown before the message text
    pub fn display_name(&self) -> &str {
        match self {
            Author::Client { username, .. } => username,
            Author::Room { chat_name, .. } => chat_name,
        }
    }
}

impl From<&Client> for Author {
    fn from(client: &Client) -> Self {
        Author::Client {
            connection: client.connection,
            username: client.username.clone(),
        }
    }
}

/// Immutable chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    author: Author,
    text: String,
    targets: Option<HashSet<ConnectionId>>,
}

impl Message {
    /// Message addressed to the whole room
    pub fn new(author: Author, text: impl Into<String>) -> Self {
        Self {
            author,
            text: text.into(),
            targets: None,
        }
    }

    /// Message restricted to `targets`, for delivery and later history
    pub fn targeted(
        author: Author,
        text: impl Into<String>,
        targets: impl IntoIterator<Item = ConnectionId>,
    ) -> Self {
        Self {
            author,
            text: text.into(),
            targets: Some(targets.into_iter().collect()),
        }
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Explicit recipients; `None` or an empty set means everyone
    pub fn targets(&self) -> Option<&HashSet<ConnectionId>> {
        self.targets.as_ref().filter(|t| !t.is_empty())
    }

    /// Whether `connection` may see this message (delivery or history).
    /// Compares client identity, not username.
    pub fn is_visible_to(&self, connection: ConnectionId) -> bool {
        self.targets()
            .map_or(true, |targets| targets.contains(&connection))
    }

    /// Wire rendering: `<author>: <text>`
    pub fn render(&self) -> String {
        format!("{}: {}", self.author.display_name(), self.text)
    }
}
