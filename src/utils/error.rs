//! Error type shared by the transport, config and client internals.
//!
//! The public client API reports failures through events and return values,
//! so these errors surface from connectors, message parsing and the binary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// Websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Frame that is not a valid message envelope.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The connector could not establish a link, or gave up on the handshake.
    #[error("connect failed: {0}")]
    Connect(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
