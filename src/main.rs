//! Lobby Chat Server - Entry Point
//!
//! Starts the TCP listener and ChatServer actor, accepting connections
//! until Ctrl-C.

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lobby_chat::{handle_connection, ChatServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=lobby_chat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lobby_chat=info")),
        )
        .init();

    // Bind address from command line, CHAT_ADDR, or default
    let config = ServerConfig::from_env()?;

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!("Chat Server listening on {}", config.addr);

    // Create ChatServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let server = ChatServer::new(cmd_rx);
    tokio::spawn(server.run());

    info!("ChatServer actor started");

    // Connection accept loop
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let cmd_tx = cmd_tx.clone();
                    let config = config.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, cmd_tx, config).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
