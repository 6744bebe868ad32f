//! The `transport` module owns everything between the client and the wire:
//! the JSON message envelopes, the `Connector` seam that opens a physical
//! connection, and two connectors (tokio-tungstenite and in-memory).
//!
//! A connection is exposed as a [`TransportLink`]: a sender of outbound
//! [`Frame`]s and a receiver of inbound [`TransportEvent`]s. The link owns no
//! reconnect logic; when it dies it reports a close code and is discarded.

pub mod memory;
pub mod message;
pub mod websocket;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::utils::error::Result;

pub use memory::{MemoryConnector, MemoryPeer};
pub use message::{ClientMessage, InboundMessage, MessageKind};
pub use websocket::WsConnector;

/// Close code for a caller-initiated shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close frame that carried no status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Close code reported when a connection dies without a close handshake.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Frame written by the client to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Event read by the client from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Text(String),
    Closed { code: u16, reason: String },
}

/// One live physical connection.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<Frame>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens physical connections on behalf of the channel client.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<TransportLink>;
}
