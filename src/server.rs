//! ChatServer Actor implementation
//!
//! The central actor that owns the lobby, the chat rooms and, through
//! room membership, every registered client. Connection handlers talk to
//! it over an mpsc channel, so all room mutation is serialized.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::client::Client;
use crate::command::RoomCommand;
use crate::error::{AppError, CommandError};
use crate::room::Room;
use crate::types::{ConnectionId, RoomId};

/// Commands sent from handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Connection answered the username prompt
    Register {
        connection: ConnectionId,
        username: String,
        sender: mpsc::Sender<String>,
    },
    /// One inbound line from a connection
    Line {
        connection: ConnectionId,
        text: String,
    },
    /// Connection closed
    Closed { connection: ConnectionId },
}

/// The main ChatServer actor
pub struct ChatServer {
    /// Persistent entry room, never destroyed
    lobby: Room,
    /// User-created rooms, in creation order
    rooms: Vec<Room>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            lobby: Room::lobby(),
            rooms: Vec::new(),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            if let Err(e) = self.handle_command(cmd) {
                error!("Command handling failed: {}", e);
            }
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) -> Result<(), AppError> {
        match cmd {
            ServerCommand::Register {
                connection,
                username,
                sender,
            } => {
                self.accept(connection, username, sender);
                Ok(())
            }
            ServerCommand::Line { connection, text } => self.route_line(connection, text),
            ServerCommand::Closed { connection } => {
                self.on_closed(connection);
                Ok(())
            }
        }
    }

    pub fn lobby(&self) -> &Room {
        &self.lobby
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    fn all_rooms(&self) -> impl Iterator<Item = &Room> {
        std::iter::once(&self.lobby).chain(self.rooms.iter())
    }

    fn room_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        if self.lobby.id() == id {
            return Some(&mut self.lobby);
        }
        self.rooms.iter_mut().find(|r| r.id() == id)
    }

    fn room_index(&self, id: &RoomId) -> Option<usize> {
        self.rooms.iter().position(|r| r.id() == id)
    }

    /// Find the client wrapping `connection` across every room
    pub fn resolve(&self, connection: ConnectionId) -> Option<&Client> {
        self.all_rooms().find_map(|room| room.member(connection))
    }

    /// Register a connection that answered the username prompt into the lobby
    fn accept(
        &mut self,
        connection: ConnectionId,
        username: String,
        sender: mpsc::Sender<String>,
    ) {
        if self.resolve(connection).is_some() {
            warn!("Connection {} is already registered", connection);
            return;
        }

        info!("Client {} registered as '{}'", connection, username);
        let client = Client::new(connection, username, sender, self.lobby.id().clone());
        self.lobby.register_client(client);
    }

    /// Route one line to the client's current room
    fn route_line(&mut self, connection: ConnectionId, text: String) -> Result<(), AppError> {
        let Some(client) = self.resolve(connection) else {
            debug!("Dropping line from unregistered connection {}", connection);
            return Ok(());
        };
        let room_id = client.current_room.clone();

        let room = self
            .room_mut(&room_id)
            .ok_or(AppError::ClientNotRegistered(connection))?;
        let Some(command) = room.handle_message(connection, &text)? else {
            return Ok(());
        };

        match self.execute(connection, &room_id, command) {
            Err(AppError::Command(e)) => {
                if let Some(room) = self.room_mut(&room_id) {
                    room.reply_error(connection, &e);
                }
                Ok(())
            }
            other => other,
        }
    }

    /// Deregister a closed connection from its current room
    fn on_closed(&mut self, connection: ConnectionId) {
        let Some(client) = self.resolve(connection) else {
            debug!("Closed connection {} was never registered", connection);
            return;
        };
        let room_id = client.current_room.clone();

        if let Some(room) = self.room_mut(&room_id) {
            room.remove_client(connection);
        }
        self.reclaim_if_empty(&room_id);

        info!("Client {} disconnected", connection);
    }

    fn execute(
        &mut self,
        connection: ConnectionId,
        room_id: &RoomId,
        command: RoomCommand,
    ) -> Result<(), AppError> {
        match command {
            RoomCommand::Join(name) => self.join_room(connection, &name),
            RoomCommand::Create(name) => self.create_and_join(connection, name),
            RoomCommand::Leave => self.leave_room(connection, room_id),
        }
    }

    /// Lobby `join`: move the client into an existing chat room
    fn join_room(&mut self, connection: ConnectionId, name: &str) -> Result<(), AppError> {
        let index = self
            .rooms
            .iter()
            .position(|r| r.name() == Some(name))
            .ok_or_else(|| CommandError::RoomNotFound(name.to_string()))?;

        let client = self
            .lobby
            .remove_client(connection)
            .ok_or(AppError::ClientNotRegistered(connection))?;
        self.rooms[index].register_client(client);
        Ok(())
    }

    /// Lobby `create`: make a new chat room and move the client into it
    fn create_and_join(
        &mut self,
        connection: ConnectionId,
        name: String,
    ) -> Result<(), AppError> {
        let room_id = self.create_room(name)?.id().clone();

        let Some(client) = self.lobby.remove_client(connection) else {
            self.destroy_room(&room_id);
            return Err(AppError::ClientNotRegistered(connection));
        };
        if let Some(room) = self.room_mut(&room_id) {
            room.register_client(client);
        }
        Ok(())
    }

    /// Chat room `leave`: go back to the lobby
    fn leave_room(
        &mut self,
        connection: ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), AppError> {
        let index = self
            .room_index(room_id)
            .ok_or(AppError::ClientNotRegistered(connection))?;

        let client = self.rooms[index]
            .remove_client(connection)
            .ok_or(AppError::ClientNotRegistered(connection))?;
        self.reclaim_if_empty(room_id);
        self.lobby.register_client(client);
        Ok(())
    }

    /// Add a chat room named `name`
    ///
    /// Fails if any room, the lobby included, already carries that name.
    pub fn create_room(&mut self, name: String) -> Result<&mut Room, CommandError> {
        if self.all_rooms().any(|r| r.name() == Some(name.as_str())) {
            return Err(CommandError::RoomNameConflict(name));
        }

        // Generate unique room id
        let id = loop {
            let id = RoomId::generate();
            if !self.all_rooms().any(|r| r.id() == &id) {
                break id;
            }
        };

        info!("Room {} created as '{}'", id, name);
        self.rooms.push(Room::chat(id, name));
        debug!("Total rooms: {}", self.rooms.len());

        let index = self.rooms.len() - 1;
        Ok(&mut self.rooms[index])
    }

    /// Remove a chat room from the collection. The lobby cannot be destroyed.
    pub fn destroy_room(&mut self, id: &RoomId) -> Option<Room> {
        let index = self.room_index(id)?;
        let room = self.rooms.remove(index);
        info!("Room {} ('{}') destroyed", room.id(), room.chat_name());
        debug!("Total rooms: {}", self.rooms.len());
        Some(room)
    }

    fn reclaim_if_empty(&mut self, id: &RoomId) {
        if self
            .room_index(id)
            .is_some_and(|index| self.rooms[index].should_reclaim())
        {
            self.destroy_room(id);
        }
    }
}
