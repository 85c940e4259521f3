//! Lobby Chat Server Library
//!
//! A line-oriented WebSocket chat server built with tokio-tungstenite
//! using the Actor pattern for state management.
//!
//! # Features
//! - Username prompt on connect
//! - A persistent lobby every client starts in
//! - User-created chat rooms (`::create <room>`, `::join <room>`, `::leave`)
//! - History replay when entering a room
//! - Non-blocking broadcast; slow sockets are dropped after a write timeout
//! - Empty chat rooms are reclaimed automatically
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the lobby, the rooms and their clients
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use lobby_chat::{ChatServer, ServerConfig, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8765").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx, ServerConfig::default()));
//!     }
//! }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use command::RoomCommand;
pub use config::ServerConfig;
pub use error::{AppError, CommandError, SendError};
pub use handler::{handle_connection, USERNAME_PROMPT};
pub use message::{Author, Message};
pub use room::{Room, RoomKind};
pub use server::{ChatServer, ServerCommand};
pub use types::{ConnectionId, RoomId};
