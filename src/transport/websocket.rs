//! WebSocket connector
//!
//! Opens a socket with tokio-tungstenite and bridges it onto a
//! [`TransportLink`]:
//! - a send loop forwards outbound frames from an unbounded channel to the socket
//! - a receive loop turns socket frames into [`TransportEvent`]s
//!
//! Exactly one `Closed` event is produced per link. A close frame keeps its
//! code (1005 when it has none); errors and EOF without a close frame are
//! reported as 1006.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::spawn;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};

use crate::transport::{
    ABNORMAL_CLOSURE, Connector, Frame, NO_STATUS_RECEIVED, TransportEvent, TransportLink,
};
use crate::utils::error::Result;

/// Connector backed by a real websocket.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink> {
        let (ws_stream, _response) = connect_async(url).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();

        {
            let url = url.to_string();
            spawn(async move {
                while let Some(frame) = out_rx.recv().await {
                    let (msg, closing) = match frame {
                        Frame::Text(text) => (WsMessage::Text(text.into()), false),
                        Frame::Close { code, reason } => (
                            WsMessage::Close(Some(CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            })),
                            true,
                        ),
                    };
                    if let Err(e) = ws_sender.send(msg).await {
                        warn!(%url, error = %e, "failed to write frame");
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
                debug!(%url, "send loop closed");
            });
        }

        spawn(async move {
            let mut closed = None;
            while let Some(next) = ws_receiver.next().await {
                match next {
                    Ok(WsMessage::Text(text)) => {
                        if in_tx.send(TransportEvent::Text(text.to_string())).is_err() {
                            // client dropped the link
                            return;
                        }
                    }
                    Ok(WsMessage::Close(frame)) => {
                        closed = Some(match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                            None => (NO_STATUS_RECEIVED, String::new()),
                        });
                        break;
                    }
                    // tungstenite answers pings itself; binary frames are not part of the protocol
                    Ok(_) => {}
                    Err(e) => {
                        closed = Some((ABNORMAL_CLOSURE, e.to_string()));
                        break;
                    }
                }
            }
            let (code, reason) = closed.unwrap_or((ABNORMAL_CLOSURE, "connection ended".to_string()));
            let _ = in_tx.send(TransportEvent::Closed { code, reason });
        });

        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
