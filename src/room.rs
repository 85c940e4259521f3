//! Room struct definition
//!
//! A room is a broadcast domain: it owns its members and an append-only
//! message log, and parses the commands of its kind. Commands that move
//! clients between rooms are executed by the `ChatServer`.

use tracing::{debug, info, warn};

use crate::client::Client;
use crate::command::{self, RoomCommand, COMMAND_SIGIL};
use crate::error::{AppError, CommandError};
use crate::message::{Author, Message};
use crate::types::{ConnectionId, RoomId};

/// Reserved display name of the lobby
pub const LOBBY_NAME: &str = "Lobby";

/// Default display name of a chat room without a name
pub const CHAT_NAME: &str = "Chat";

/// Closed set of room kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomKind {
    /// The single persistent entry room
    Lobby,
    /// A user-created room, reclaimed when empty
    Chat,
}

impl RoomKind {
    /// Parse a command body (text after `::`) with this kind's vocabulary
    pub fn parse_command(&self, body: &str) -> Result<RoomCommand, CommandError> {
        match self {
            RoomKind::Lobby => command::parse_lobby(body),
            RoomKind::Chat => command::parse_chat(body),
        }
    }

    /// Whether an empty room of this kind is removed from the server
    pub fn is_reclaimable(&self) -> bool {
        matches!(self, RoomKind::Chat)
    }
}

/// Chat room
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: Option<String>,
    kind: RoomKind,
    members: Vec<Client>,
    log: Vec<Message>,
}

impl Room {
    /// Create the lobby
    pub fn lobby() -> Self {
        Self::new(RoomId::generate(), Some(LOBBY_NAME.to_string()), RoomKind::Lobby)
    }

    /// Create a named chat room
    pub fn chat(id: RoomId, name: String) -> Self {
        Self::new(id, Some(name), RoomKind::Chat)
    }

    fn new(id: RoomId, name: Option<String>, kind: RoomKind) -> Self {
        Self {
            id,
            name,
            kind,
            members: Vec::new(),
            log: Vec::new(),
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    /// Name used when the room authors a message
    pub fn chat_name(&self) -> &str {
        match (&self.name, self.kind) {
            (Some(name), _) => name,
            (None, RoomKind::Lobby) => LOBBY_NAME,
            (None, RoomKind::Chat) => CHAT_NAME,
        }
    }

    pub fn members(&self) -> &[Client] {
        &self.members
    }

    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn member(&self, connection: ConnectionId) -> Option<&Client> {
        self.members.iter().find(|c| c.connection == connection)
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.member(connection).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether the server should drop this room now
    pub fn should_reclaim(&self) -> bool {
        self.kind.is_reclaimable() && self.members.is_empty()
    }

    fn as_author(&self) -> Author {
        Author::Room {
            id: self.id.clone(),
            chat_name: self.chat_name().to_string(),
        }
    }

    /// Add a client, replay the visible history to it, then announce it.
    ///
    /// The caller must not register a client that is already a member.
    pub fn register_client(&mut self, mut client: Client) {
        client.current_room = self.id.clone();
        let connection = client.connection;
        let username = client.username.clone();
        self.members.push(client);

        info!("Client {} ({}) joined room {}", connection, username, self.chat_name());
        debug!("Room {} members: {}", self.id, self.members.len());

        let history = self.readable_history(connection);
        self.send_text(&history, &[connection]);
        self.announce(format!("{} connected", username));
    }

    /// Remove a client and announce it. Returns the removed client,
    /// or `None` without announcing if it was not a member.
    pub fn remove_client(&mut self, connection: ConnectionId) -> Option<Client> {
        let index = self.members.iter().position(|c| c.connection == connection)?;
        let client = self.members.remove(index);

        info!("Client {} ({}) left room {}", connection, client.username, self.chat_name());
        debug!("Room {} members: {}", self.id, self.members.len());

        self.announce(format!("{} disconnected", client.username));
        Some(client)
    }

    /// Handle one line from a member.
    ///
    /// Free text is broadcast and logged. A command line is parsed with
    /// this room's vocabulary: parse errors are replied to the sender and
    /// `Ok(None)` is returned, valid commands are returned for the server
    /// to execute.
    pub fn handle_message(
        &mut self,
        connection: ConnectionId,
        text: &str,
    ) -> Result<Option<RoomCommand>, AppError> {
        let Some(client) = self.member(connection) else {
            return Err(AppError::ClientNotRegistered(connection));
        };

        if let Some(body) = text.strip_prefix(COMMAND_SIGIL) {
            return Ok(self.handle_command(connection, body));
        }

        let message = Message::new(Author::from(client), text);
        self.broadcast(message, true);
        Ok(None)
    }

    fn handle_command(&self, connection: ConnectionId, body: &str) -> Option<RoomCommand> {
        match self.kind.parse_command(body) {
            Ok(command) => {
                debug!("Client {} issued {:?} in room {}", connection, command, self.id);
                Some(command)
            }
            Err(e) => {
                self.reply_error(connection, &e);
                None
            }
        }
    }

    /// Send a command error to the issuing client only; never logged
    pub fn reply_error(&self, connection: ConnectionId, error: &CommandError) {
        debug!("Command error for {}: {}", connection, error);
        self.send_text(&error.to_string(), &[connection]);
    }

    /// Render the log lines visible to `connection`, in log order
    pub fn readable_history(&self, connection: ConnectionId) -> String {
        self.log
            .iter()
            .filter(|m| m.is_visible_to(connection))
            .map(Message::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn announce(&mut self, text: String) {
        let message = Message::new(self.as_author(), text);
        self.broadcast(message, true);
    }

    /// Deliver `<author>: <text>` to the message's targets (or every
    /// member), optionally appending the message to the log.
    ///
    /// Sends never wait: each target either accepts the line into its
    /// queue or fails on its own, so the actor is never suspended here.
    pub fn broadcast(&mut self, message: Message, log: bool) {
        let recipients: Vec<Client> = self
            .members
            .iter()
            .filter(|c| message.is_visible_to(c.connection))
            .cloned()
            .collect();
        let line = message.render();

        info!("[{}] {}", self.chat_name(), line);

        deliver(&recipients, &line);
        if log {
            self.log.push(message);
        }
    }

    /// Deliver raw `text` to `targets` (or every member if empty); never logged
    pub fn send_text(&self, text: &str, targets: &[ConnectionId]) {
        let recipients: Vec<Client> = self
            .members
            .iter()
            .filter(|c| targets.is_empty() || targets.contains(&c.connection))
            .cloned()
            .collect();
        deliver(&recipients, text);
    }
}

/// Fan out one line to a snapshot of clients; one failed target does
/// not affect the others
fn deliver(recipients: &[Client], line: &str) {
    for client in recipients {
        if let Err(e) = client.send(line.to_string()) {
            warn!("Delivery to {} ({}) failed: {}", client.connection, client.username, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn new_client(name: &str) -> (Client, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(64);
        let client = Client::new(ConnectionId::new(), name.to_string(), tx, RoomId::generate());
        (client, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_register_replays_history_then_announces() {
        let mut lobby = Room::lobby();
        let (alice, mut alice_rx) = new_client("alice");
        let alice_id = alice.connection;

        lobby.register_client(alice);

        assert!(lobby.contains(alice_id));
        assert_eq!(lobby.member(alice_id).unwrap().current_room, *lobby.id());
        assert_eq!(drain(&mut alice_rx), vec!["", "Lobby: alice connected"]);
        assert_eq!(lobby.log().len(), 1);
    }

    #[test]
    fn test_history_replay_round_trip() {
        let mut room = Room::chat(RoomId::generate(), "room1".to_string());
        let (alice, _alice_rx) = new_client("alice");
        let alice_id = alice.connection;
        room.register_client(alice);

        for text in ["one", "two", "three"] {
            room.handle_message(alice_id, text).unwrap();
        }

        let (bob, mut bob_rx) = new_client("bob");
        room.register_client(bob);

        let lines = drain(&mut bob_rx);
        assert_eq!(
            lines[0],
            "room1: alice connected\nalice: one\nalice: two\nalice: three"
        );
        assert_eq!(lines[1], "room1: bob connected");
    }

    #[test]
    fn test_readable_history_is_idempotent() {
        let mut room = Room::lobby();
        let (alice, _rx) = new_client("alice");
        let alice_id = alice.connection;
        room.register_client(alice);
        room.handle_message(alice_id, "hi").unwrap();

        let first = room.readable_history(alice_id);
        let second = room.readable_history(alice_id);
        assert_eq!(first, second);
        assert_eq!(room.log().len(), 2);
    }

    #[test]
    fn test_free_text_is_broadcast_and_logged() {
        let mut room = Room::chat(RoomId::generate(), "room1".to_string());
        let (alice, mut alice_rx) = new_client("alice");
        let (bob, mut bob_rx) = new_client("bob");
        let alice_id = alice.connection;
        room.register_client(alice);
        room.register_client(bob);
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let command = room.handle_message(alice_id, "hello").unwrap();

        assert!(command.is_none());
        assert_eq!(drain(&mut bob_rx), vec!["alice: hello"]);
        assert_eq!(drain(&mut alice_rx), vec!["alice: hello"]);
        let last = room.log().last().unwrap();
        assert_eq!(last.text(), "hello");
        assert!(last.targets().is_none());
    }

    #[test]
    fn test_targeted_message_hidden_from_others() {
        let mut room = Room::lobby();
        let (alice, mut alice_rx) = new_client("alice");
        let (bob, mut bob_rx) = new_client("bob");
        let alice_id = alice.connection;
        let bob_id = bob.connection;
        room.register_client(alice);
        room.register_client(bob);
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        let author = room.as_author();
        room.broadcast(Message::targeted(author, "for bob", [bob_id]), true);

        assert_eq!(drain(&mut bob_rx), vec!["Lobby: for bob"]);
        assert!(drain(&mut alice_rx).is_empty());
        assert!(room.readable_history(bob_id).contains("for bob"));
        assert!(!room.readable_history(alice_id).contains("for bob"));
    }

    #[test]
    fn test_reconnected_client_loses_targeted_history() {
        let mut room = Room::lobby();
        let (bob, _rx) = new_client("bob");
        let old_bob = bob.connection;
        room.register_client(bob);

        let author = room.as_author();
        room.broadcast(Message::targeted(author, "for bob", [old_bob]), true);
        room.remove_client(old_bob);

        // Same username, new identity
        let (bob_again, _rx2) = new_client("bob");
        let new_bob = bob_again.connection;
        room.register_client(bob_again);

        assert!(!room.readable_history(new_bob).contains("for bob"));
    }

    #[test]
    fn test_remove_client() {
        let mut room = Room::lobby();
        let (alice, _alice_rx) = new_client("alice");
        let (bob, mut bob_rx) = new_client("bob");
        let alice_id = alice.connection;
        room.register_client(alice);
        room.register_client(bob);
        drain(&mut bob_rx);

        let removed = room.remove_client(alice_id);

        assert_eq!(removed.unwrap().username, "alice");
        assert!(!room.contains(alice_id));
        assert_eq!(drain(&mut bob_rx), vec!["Lobby: alice disconnected"]);
    }

    #[test]
    fn test_remove_absent_client_is_noop() {
        let mut room = Room::lobby();
        let (bob, mut bob_rx) = new_client("bob");
        room.register_client(bob);
        drain(&mut bob_rx);
        let log_len = room.log().len();

        assert!(room.remove_client(ConnectionId::new()).is_none());
        assert!(drain(&mut bob_rx).is_empty());
        assert_eq!(room.log().len(), log_len);
    }

    #[test]
    fn test_message_from_non_member_is_rejected() {
        let mut room = Room::lobby();
        let stranger = ConnectionId::new();

        let result = room.handle_message(stranger, "hi");
        assert!(matches!(result, Err(AppError::ClientNotRegistered(id)) if id == stranger));
        assert!(room.log().is_empty());
    }

    #[test]
    fn test_unrecognized_command_replied_to_issuer_only() {
        let mut room = Room::lobby();
        let (alice, mut alice_rx) = new_client("alice");
        let (bob, mut bob_rx) = new_client("bob");
        let alice_id = alice.connection;
        room.register_client(alice);
        room.register_client(bob);
        drain(&mut alice_rx);
        drain(&mut bob_rx);
        let log_len = room.log().len();

        let command = room.handle_message(alice_id, "::dance").unwrap();

        assert!(command.is_none());
        assert_eq!(drain(&mut alice_rx), vec!["Unrecognized command"]);
        assert!(drain(&mut bob_rx).is_empty());
        assert_eq!(room.log().len(), log_len);
    }

    #[test]
    fn test_valid_command_is_returned() {
        let mut room = Room::lobby();
        let (alice, _rx) = new_client("alice");
        let alice_id = alice.connection;
        room.register_client(alice);

        let command = room.handle_message(alice_id, "::join room1").unwrap();
        assert_eq!(command, Some(RoomCommand::Join("room1".to_string())));
    }

    #[test]
    fn test_failed_delivery_does_not_block_others() {
        let mut room = Room::lobby();
        let (alice, alice_rx) = new_client("alice");
        let (bob, mut bob_rx) = new_client("bob");
        let bob_id = bob.connection;
        room.register_client(alice);
        room.register_client(bob);
        drop(alice_rx);
        drain(&mut bob_rx);

        room.handle_message(bob_id, "anyone?").unwrap();

        assert_eq!(drain(&mut bob_rx), vec!["bob: anyone?"]);
        assert_eq!(room.log().last().unwrap().text(), "anyone?");
    }

    #[test]
    fn test_full_queue_does_not_block_others() {
        let mut room = Room::lobby();
        let (tx, mut stuck_rx) = mpsc::channel(1);
        let stuck = Client::new(ConnectionId::new(), "stuck".to_string(), tx, RoomId::generate());
        let (bob, mut bob_rx) = new_client("bob");
        let bob_id = bob.connection;

        // The history replay fills the stuck client's queue
        room.register_client(stuck);
        room.register_client(bob);
        drain(&mut bob_rx);

        room.handle_message(bob_id, "anyone?").unwrap();

        assert_eq!(drain(&mut bob_rx), vec!["bob: anyone?"]);
        assert_eq!(room.log().last().unwrap().text(), "anyone?");
        assert_eq!(drain(&mut stuck_rx), vec![""]);
    }

    #[test]
    fn test_room_kinds() {
        let lobby = Room::lobby();
        let chat = Room::chat(RoomId::generate(), "room1".to_string());

        assert_eq!(lobby.chat_name(), "Lobby");
        assert_eq!(chat.chat_name(), "room1");
        assert!(!lobby.should_reclaim());
        assert!(chat.should_reclaim());
        assert_eq!(chat.kind(), RoomKind::Chat);
    }
}
