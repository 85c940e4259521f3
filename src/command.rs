//! Chat command parsing
//!
//! Lines starting with `::` are commands: `::name arg1 arg2 ...`.
//! Each room kind recognizes its own vocabulary; anything else is
//! reported back as unrecognized.

use crate::error::CommandError;

/// Prefix that marks a line as a command
pub const COMMAND_SIGIL: &str = "::";

/// A validated command, ready for the server to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand {
    /// Move from the lobby into an existing chat room
    Join(String),
    /// Create a chat room and move into it
    Create(String),
    /// Leave the current chat room for the lobby
    Leave,
}

/// Split a command body into its name and arguments
fn split(body: &str) -> Option<(&str, Vec<&str>)> {
    let mut parts = body.split_whitespace();
    let name = parts.next()?;
    Some((name, parts.collect()))
}

fn expect_args(command: &'static str, args: &[&str], expected: usize) -> Result<(), CommandError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(CommandError::WrongArgumentCount {
            command,
            expected,
            given: args.len(),
        })
    }
}

/// Lobby vocabulary: `join <room>`, `create <room>`
pub fn parse_lobby(body: &str) -> Result<RoomCommand, CommandError> {
    match split(body) {
        Some(("join", args)) => {
            expect_args("join", &args, 1)?;
            Ok(RoomCommand::Join(args[0].to_string()))
        }
        Some(("create", args)) => {
            expect_args("create", &args, 1)?;
            Ok(RoomCommand::Create(args[0].to_string()))
        }
        _ => Err(CommandError::Unrecognized),
    }
}

/// Chat room vocabulary: `leave`
pub fn parse_chat(body: &str) -> Result<RoomCommand, CommandError> {
    match split(body) {
        Some(("leave", args)) => {
            expect_args("leave", &args, 0)?;
            Ok(RoomCommand::Leave)
        }
        _ => Err(CommandError::Unrecognized),
    }
}
