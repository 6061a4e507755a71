//! WebSocket server implementation.

use crate::config::Config;
use anyhow::Context;
use futures_util::{SinkExt, StreamExt, future};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{info, warn};

pub mod arena;
pub mod connections;
pub mod session;

pub use arena::Arena;
pub use connections::{BroadcastReport, ClientChannel, ConnectionSet};
pub use session::{Disconnect, Frame, SessionId, run_session};

/// A bound listener plus the arena it serves.
pub struct Server {
    listener: TcpListener,
    arena: Arc<Arena>,
}

impl Server {
    /// Bind the listening socket. This is the only fatal startup step.
    pub async fn bind(config: Config) -> anyhow::Result<Self> {
        let addr = format!("{}:{}", config.server.bind, config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("bind {addr}"))?;
        Ok(Self {
            listener,
            arena: Arena::new(config),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    /// Start the periodic tasks and accept connections forever.
    pub async fn serve(self) -> anyhow::Result<()> {
        let local = self.listener.local_addr()?;
        info!("Listening on ws://{}{}", local, self.arena.config.server.path);

        let _loops = self.arena.spawn_loops();

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            let arena = Arc::clone(&self.arena);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, arena).await {
                    warn!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

/// Run the game server.
pub async fn run(config: Config) -> anyhow::Result<()> {
    Server::bind(config).await?.serve().await
}

fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("No WebSocket endpoint at {path}")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    arena: Arc<Arena>,
) -> anyhow::Result<()> {
    let endpoint = arena.config.server.path.clone();
    let ws_stream = accept_hdr_async(stream, move |request: &Request, response: Response| {
        if request.uri().path() == endpoint {
            Ok(response)
        } else {
            Err(not_found(request.uri().path()))
        }
    })
    .await
    .context("websocket handshake")?;

    arena.stats.record_connection();
    let session = SessionId::new();
    info!(%session, %addr, "New connection");

    let (write, read) = ws_stream.split();
    let write = write.with(|text: String| future::ready(Ok::<_, WsError>(Message::text(text))));
    let read = read.map(|message| message.map(Frame::from));

    run_session(arena, session, addr, read, write).await;
    Ok(())
}
