//! Error types for the chat server
//!
//! Defines application-level errors, user-facing command errors and
//! per-target delivery errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::ConnectionId;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// recoverable errors that are reported back to a single client.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal for the connection)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// A line was routed to a room that does not list the client as a member
    #[error("Client {0} is not registered in its current room")]
    ClientNotRegistered(ConnectionId),

    /// A recognized or unrecognized command failed; recoverable
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Bad configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Command errors
///
/// The `Display` text is exactly what the issuing client receives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Command name not in the current room's vocabulary
    #[error("Unrecognized command")]
    Unrecognized,

    /// Recognized command with the wrong number of arguments
    #[error("Error: {command} expects {expected} argument(s), got {given}.")]
    WrongArgumentCount {
        command: &'static str,
        expected: usize,
        given: usize,
    },

    /// `create` with a name that is already in use
    #[error("Error: There is already a room with name {0}.")]
    RoomNameConflict(String),

    /// `join` with a name no room carries
    #[error("Error: There is no room with name {0}.")]
    RoomNotFound(String),
}

/// Message send errors
///
/// Occurs when delivering to a single client fails. Never aborts
/// delivery to the other targets of a broadcast.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The client's outbound queue is full
    #[error("Client queue full")]
    Full,

    /// The socket did not accept a frame in time
    #[error("Write timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_reply_text() {
        assert_eq!(CommandError::Unrecognized.to_string(), "Unrecognized command");
        assert_eq!(
            CommandError::RoomNotFound("nosuchroom".to_string()).to_string(),
            "Error: There is no room with name nosuchroom."
        );
        assert_eq!(
            CommandError::WrongArgumentCount {
                command: "join",
                expected: 1,
                given: 2
            }
            .to_string(),
            "Error: join expects 1 argument(s), got 2."
        );
    }

    #[test]
    fn test_command_error_is_transparent_in_app_error() {
        let err: AppError = CommandError::RoomNameConflict("room1".to_string()).into();
        assert_eq!(err.to_string(), "Error: There is already a room with name room1.");
    }
}
