//! Arena - simulation server with an HTTP front.
//!
//! Serves the WebSocket endpoint through axum and exposes the tick counters
//! as JSON at `/stats`.

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt, future};
use server::{Arena, Frame, SessionId, StatsSnapshot};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    arena: Arc<Arena>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,server=debug")),
        )
        .init();

    info!("Arena v{}", env!("CARGO_PKG_VERSION"));

    // Load server configuration
    let config = server::Config::load()?;
    info!("Loaded configuration");
    info!("  Port: {}", config.server.port);
    info!("  Arena: {}x{}", config.arena.width, config.arena.height);
    info!("  Population cap: {}", config.population.cap);

    let bind = format!("{}:{}", config.server.bind, config.server.port);
    let endpoint = config.server.path.clone();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    let addr = listener.local_addr()?;

    // Shared state and periodic tasks
    let arena = Arena::new(config);
    let _loops = arena.spawn_loops();

    let app = Router::new()
        .route(&endpoint, get(websocket_handler))
        .route("/stats", get(stats_handler))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(AppState { arena });

    info!("Server running on http://{}", addr);
    info!("Game WebSocket endpoint: ws://{}{}", addr, endpoint);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Upgrade to a WebSocket and hand the socket to a session.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, addr, state.arena))
}

async fn handle_websocket(socket: WebSocket, addr: SocketAddr, arena: Arc<Arena>) {
    arena.stats.record_connection();
    let session = SessionId::new();
    info!(%session, %addr, "New game connection");

    let (write, read) = socket.split();
    let write = write.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text.into()))));
    let read = read.map(|message| message.map(to_frame));

    server::run_session(arena, session, addr, read, write).await;
}

fn to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data),
        Message::Close(_) => Frame::Close,
        Message::Ping(_) | Message::Pong(_) => Frame::Control,
    }
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.arena.stats_snapshot().await)
}
