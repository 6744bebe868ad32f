//! In-memory connector.
//!
//! Each successful `connect` hands the server side of the link to whoever
//! holds the peer receiver, so the client can be driven frame by frame
//! without a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::transport::{Connector, Frame, TransportEvent, TransportLink};
use crate::utils::error::{ChannelError, Result};

#[derive(Debug, Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refuse: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Returns the connector and the receiver on which each new peer arrives.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                peers: tx,
                refuse: Arc::new(AtomicBool::new(false)),
                attempts: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }

    /// While set, every `connect` fails as if the server were unreachable.
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of `connect` calls so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ChannelError::Connect(format!("{url}: connection refused")));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        self.peers
            .send(MemoryPeer {
                frames: out_rx,
                events: in_tx,
            })
            .map_err(|_| ChannelError::Connect(format!("{url}: no peer listener")))?;

        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// Server end of an in-memory link.
#[derive(Debug)]
pub struct MemoryPeer {
    frames: mpsc::UnboundedReceiver<Frame>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl MemoryPeer {
    /// Pushes a raw text frame to the client.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Text(text.into())).is_ok()
    }

    pub fn push_json(&self, value: &Value) -> bool {
        self.push_text(value.to_string())
    }

    /// Closes the link from the server side with `code`.
    pub fn close(&self, code: u16, reason: &str) -> bool {
        self.events
            .send(TransportEvent::Closed {
                code,
                reason: reason.to_string(),
            })
            .is_ok()
    }

    /// Waits for the next frame written by the client.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    /// Waits for the next text frame and parses it as JSON, skipping close frames.
    pub async fn next_json(&mut self) -> Option<Value> {
        while let Some(frame) = self.frames.recv().await {
            if let Frame::Text(text) = frame {
                return serde_json::from_str(&text).ok();
            }
        }
        None
    }

    /// Drains frames already written without waiting.
    pub fn drain(&mut self) -> Vec<Frame> {
        let mut out = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            out.push(frame);
        }
        out
    }
}
