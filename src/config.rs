//! Server configuration
//!
//! Read from the command line and environment:
//! - first positional argument or `CHAT_ADDR`: bind address
//! - `CHAT_SEND_TIMEOUT_MS`: socket write timeout in milliseconds

use std::env;
use std::time::Duration;

use crate::error::AppError;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8765";

/// Default socket write timeout
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of each client's outbound queue
pub const DEFAULT_CLIENT_BUFFER: usize = 256;

/// Channel buffer size for server commands
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub addr: String,
    /// How long one socket write may take before the connection is dropped
    pub send_timeout: Duration,
    /// Lines queued for one client before further deliveries fail
    pub client_buffer: usize,
    /// Capacity of the handler → server command channel
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
            client_buffer: DEFAULT_CLIENT_BUFFER,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Load configuration from process arguments and environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_sources(env::args().nth(1), |key| env::var(key).ok())
    }

    /// Build a configuration from an optional address argument and a
    /// variable lookup. The argument wins over `CHAT_ADDR`.
    pub fn from_sources<F>(arg_addr: Option<String>, var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = arg_addr.or_else(|| var("CHAT_ADDR")) {
            config.addr = addr;
        }

        if let Some(raw) = var("CHAT_SEND_TIMEOUT_MS") {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                AppError::InvalidConfig(format!("CHAT_SEND_TIMEOUT_MS is not a number: {}", raw))
            })?;
            if millis == 0 {
                return Err(AppError::InvalidConfig(
                    "CHAT_SEND_TIMEOUT_MS must be positive".to_string(),
                ));
            }
            config.send_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}
