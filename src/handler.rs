//! WebSocket connection handler
//!
//! Thin transport shim around the ChatServer: performs the WebSocket
//! handshake, asks for a username, then turns inbound text frames into
//! lines for the server and outbound lines into text frames.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, SendError};
use crate::server::ServerCommand;
use crate::types::ConnectionId;

/// Sent to every new connection before anything else
pub const USERNAME_PROMPT: &str = "Please register by typing your username";

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, registers the client once it has sent
/// its username, and manages the connection lifecycle. Exactly one
/// `Closed` command is sent for every registered connection. A socket
/// write that takes longer than `config.send_timeout` ends the connection.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: ServerConfig,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection = ConnectionId::new();
    info!("Connection {} opened from {}", connection, peer_addr);

    ws_sender.send(Message::Text(USERNAME_PROMPT.into())).await?;

    // First line is the username; the rest of its frame is chat input
    let (username, pending) = loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => break split_registration(text.as_str()),
            Some(Ok(Message::Close(_))) | None => {
                debug!("Connection {} closed before registering", connection);
                return Ok(());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    };

    // Create channel for server -> client lines
    let (line_tx, mut line_rx) = mpsc::channel::<String>(config.client_buffer);

    if cmd_tx
        .send(ServerCommand::Register {
            connection,
            username,
            sender: line_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register connection {} - server closed", connection);
        return Err(AppError::ChannelSend);
    }

    for text in pending {
        if cmd_tx.send(ServerCommand::Line { connection, text }).await.is_err() {
            return Err(AppError::ChannelSend);
        }
    }

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (WebSocket -> ServerCommand::Line)
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    for line in text.as_str().lines() {
                        let cmd = ServerCommand::Line {
                            connection,
                            text: line.to_string(),
                        };
                        if cmd_tx_read.send(cmd).await.is_err() {
                            debug!("Server closed, ending read task for {}", connection);
                            return;
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", connection);
                    break;
                }
                Ok(_) => {
                    // Binary, ping and pong frames - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", connection, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", connection);
    });

    // Spawn write task (lines -> WebSocket)
    let send_timeout = config.send_timeout;
    let mut write_task = tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            match timeout(send_timeout, ws_sender.send(Message::Text(line.into()))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("WebSocket send failed for {}: {}", connection, e);
                    break;
                }
                Err(_) => {
                    warn!("Dropping {}: {}", connection, SendError::Timeout);
                    return;
                }
            }
        }
        debug!("Write task ended for client");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete, then stop the other one
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", connection);
            write_task.abort();
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", connection);
            read_task.abort();
        }
    }

    // Send close notification
    let _ = cmd_tx.send(ServerCommand::Closed { connection }).await;

    info!("Connection {} closed", connection);

    Ok(())
}

/// Split the first frame into the username and any lines sent with it
fn split_registration(text: &str) -> (String, Vec<String>) {
    let mut lines = text.lines();
    let username = lines.next().unwrap_or_default().to_string();
    (username, lines.map(str::to_string).collect())
}
