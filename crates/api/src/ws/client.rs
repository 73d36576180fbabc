//! Per-connection read and write pumps.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};

use super::hub::{BinaryMessage, Channel, HubHandle, TextEvent};
use canopy_core::types::DbId;

/// Time allowed to read the next pong from the peer.
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Ping interval. Must stay below [`PONG_WAIT`].
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Time allowed to write one frame to the peer.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Largest inbound message accepted, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Outbound queue depth per connection. A peer that falls this far behind is
/// evicted by the hub.
pub const SEND_BUFFER: usize = 256;

/// A frame queued for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Vec<u8>),
    /// Send a close frame and stop writing.
    Close,
}

/// Identity the read pump stamps onto every inbound frame.
#[derive(Debug, Clone)]
pub struct Connection {
    pub client_id: String,
    pub room_id: DbId,
    pub channel: Channel,
}

/// Forward inbound frames to the hub until the socket closes, errors, or
/// misses a pong.
pub async fn read_pump(mut stream: SplitStream<WebSocket>, conn: &Connection, hub: &HubHandle) {
    let mut deadline = Instant::now() + PONG_WAIT;
    loop {
        let message = match timeout_at(deadline, stream.next()).await {
            Err(_) => {
                tracing::debug!(client_id = %conn.client_id, "Pong timeout");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                tracing::debug!(client_id = %conn.client_id, error = %e, "WebSocket receive error");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        let forwarded = match (message, conn.channel) {
            (Message::Text(text), Channel::Text) => hub.on_text(TextEvent::parse(
                text.as_str(),
                &conn.client_id,
                conn.room_id,
            )),
            (Message::Binary(bytes), Channel::Binary) => hub.on_binary(BinaryMessage {
                client_id: conn.client_id.clone(),
                room_id: conn.room_id,
                bytes: bytes.to_vec(),
            }),
            (Message::Pong(_), _) => {
                deadline = Instant::now() + PONG_WAIT;
                Ok(())
            }
            (Message::Close(_), _) => break,
            // Pings are answered by axum. Frames of the other channel's kind are ignored.
            (other, channel) => {
                if !matches!(other, Message::Ping(_)) {
                    tracing::debug!(client_id = %conn.client_id, ?channel, "Ignoring frame for the other channel");
                }
                Ok(())
            }
        };
        if forwarded.is_err() {
            break;
        }
    }
}

/// Drain the connection's queue onto the socket and ping on a timer.
///
/// Text frames already waiting when one is dequeued are sent together in a
/// single newline-delimited frame.
pub async fn write_pump(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<OutboundFrame>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    let _ = write(&mut sink, Message::Close(None)).await;
                    return;
                };
                let (first, trailing) = match frame {
                    OutboundFrame::Text(text) => {
                        let (batch, trailing) = coalesce_text(text, &mut rx);
                        (Message::Text(batch.into()), trailing)
                    }
                    OutboundFrame::Binary(bytes) => (Message::Binary(bytes.into()), None),
                    OutboundFrame::Close => (Message::Close(None), None),
                };
                let closing = matches!(first, Message::Close(_));
                if !write(&mut sink, first).await || closing {
                    return;
                }
                match trailing {
                    Some(OutboundFrame::Binary(bytes)) => {
                        if !write(&mut sink, Message::Binary(bytes.into())).await {
                            return;
                        }
                    }
                    Some(OutboundFrame::Close) => {
                        let _ = write(&mut sink, Message::Close(None)).await;
                        return;
                    }
                    Some(OutboundFrame::Text(_)) | None => {}
                }
            }
            _ = ticker.tick() => {
                if !write(&mut sink, Message::Ping(Vec::new().into())).await {
                    return;
                }
            }
        }
    }
}

/// Append every text frame already queued behind `first`.
///
/// Stops at the first non-text frame and hands it back so it is written
/// after the batch.
fn coalesce_text(
    first: String,
    rx: &mut mpsc::Receiver<OutboundFrame>,
) -> (String, Option<OutboundFrame>) {
    let mut batch = first;
    while let Ok(next) = rx.try_recv() {
        match next {
            OutboundFrame::Text(text) => {
                batch.push('\n');
                batch.push_str(&text);
            }
            other => return (batch, Some(other)),
        }
    }
    (batch, None)
}

async fn write(sink: &mut SplitSink<WebSocket, Message>, message: Message) -> bool {
    match timeout(WRITE_WAIT, sink.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "WebSocket write failed");
            false
        }
        Err(_) => {
            tracing::debug!("WebSocket write timed out");
            false
        }
    }
}
