//! Per-connection session: greeting, outbound writer and the ingest loop.
//!
//! The session is transport agnostic. Callers hand in a stream of inbound
//! [`Frame`]s and a sink of outbound text frames; the tungstenite listener in
//! this crate and the axum endpoint in the `arena` binary both adapt their
//! socket halves to that shape.

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use protocol::{ProtocolError, ServerMessage, decode_entity};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::arena::Arena;
use super::connections::ClientChannel;
use crate::registry::Upsert;

/// Token correlating a connection with the entity it controls.
///
/// Generated when the connection is accepted and sent to the client right
/// after the initial snapshot. When the connection ends, the entity with this
/// id is removed from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An inbound WebSocket frame, reduced to what the ingest loop cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Close,
    /// Ping, pong and raw frames.
    Control,
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Binary(data) => Frame::Binary(data),
            Message::Close(_) => Frame::Close,
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Frame::Control,
        }
    }
}

/// Why a session ended.
#[derive(Debug)]
pub enum Disconnect {
    /// Close frame or end of stream.
    Closed,
    /// Read error from the transport.
    Transport(String),
    /// A frame did not decode as an entity.
    Malformed(ProtocolError),
    /// The greeting could not be encoded.
    Greeting(ProtocolError),
}

impl fmt::Display for Disconnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disconnect::Closed => f.write_str("closed"),
            Disconnect::Transport(e) => write!(f, "transport error: {e}"),
            Disconnect::Malformed(e) => write!(f, "{e}"),
            Disconnect::Greeting(e) => write!(f, "greeting failed: {e}"),
        }
    }
}

/// Drive one client connection to completion.
///
/// Queues the current snapshot and the session id, registers the outbound
/// channel for broadcasts, then applies every inbound entity to the registry
/// until the client goes away or sends something undecodable. Either way the
/// session's entity and channel are removed before returning.
pub async fn run_session<R, E, W>(
    arena: Arc<Arena>,
    session: SessionId,
    addr: SocketAddr,
    read: R,
    write: W,
) -> Disconnect
where
    R: Stream<Item = Result<Frame, E>> + Unpin + Send,
    E: fmt::Display + Send,
    W: Sink<String> + Unpin + Send + 'static,
    W::Error: fmt::Display + Send,
{
    let server = &arena.config.server;
    // The greeting is two frames and must fit before the writer starts draining.
    let (tx, rx) = mpsc::channel(server.outbound_queue.max(2));
    let writer = tokio::spawn(write_frames(write, rx, server.write_timeout(), addr));

    let reason = match greet(&arena, &session, &tx).await {
        Ok(()) => {
            arena
                .connections
                .insert(session.clone(), ClientChannel::new(addr, tx))
                .await;
            ingest(&arena, &session, read).await
        }
        Err(e) => {
            drop(tx);
            Disconnect::Greeting(e)
        }
    };

    let removed = arena.registry.remove(session.as_str()).await;
    // Dropping the last sender lets the writer drain and close the socket.
    drop(arena.connections.remove(&session).await);
    if let Err(e) = writer.await {
        warn!(%session, %addr, "Writer task failed: {}", e);
    }

    match &reason {
        Disconnect::Closed => info!(%session, %addr, entity_removed = removed.is_some(), "Client disconnected"),
        other => warn!(%session, %addr, entity_removed = removed.is_some(), "Client dropped: {}", other),
    }
    reason
}

async fn greet(
    arena: &Arena,
    session: &SessionId,
    tx: &mpsc::Sender<String>,
) -> Result<(), ProtocolError> {
    let snapshot = ServerMessage::Snapshot(arena.registry.snapshot().await).encode()?;
    let id = ServerMessage::SessionId(session.to_string()).encode()?;
    for frame in [snapshot, id] {
        if tx.send(frame).await.is_err() {
            debug!(%session, "Writer closed before greeting was queued");
            break;
        }
    }
    Ok(())
}

async fn ingest<R, E>(arena: &Arena, session: &SessionId, mut read: R) -> Disconnect
where
    R: Stream<Item = Result<Frame, E>> + Unpin,
    E: fmt::Display,
{
    while let Some(frame) = read.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => return Disconnect::Transport(e.to_string()),
        };
        let payload: &[u8] = match &frame {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(data) => &data[..],
            Frame::Close => return Disconnect::Closed,
            Frame::Control => continue,
        };
        let entity = match decode_entity(payload) {
            Ok(entity) => entity,
            Err(e) => return Disconnect::Malformed(e),
        };

        arena.stats.record_frame();
        if arena.registry.upsert(entity).await == Upsert::Inserted {
            debug!(%session, "Client added an entity");
        }
    }
    Disconnect::Closed
}

/// Drain the outbound queue into the socket. Each write is bounded by
/// `timeout`; failures are logged and the next frame is still attempted.
async fn write_frames<W>(
    mut write: W,
    mut rx: mpsc::Receiver<String>,
    timeout: Duration,
    addr: SocketAddr,
) where
    W: Sink<String> + Unpin,
    W::Error: fmt::Display,
{
    while let Some(frame) = rx.recv().await {
        match tokio::time::timeout(timeout, write.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(%addr, "Failed to send frame: {}", e),
            Err(_) => warn!(%addr, "Send timed out after {:?}", timeout),
        }
    }
    match tokio::time::timeout(timeout, write.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(%addr, "Close failed: {}", e),
        Err(_) => debug!(%addr, "Close timed out"),
    }
}
