// WebSocket server for live auction rooms.

use std::sync::Arc;

use auction_core::hub::ConnectionId;
use axum::extract::Query;
use axum::http::Uri;
use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::realtime::dispatch_frame;
use crate::state::AppState;

/// Query parameters a client sends with the upgrade request.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub auction_id: Option<String>,
    pub user_email: Option<String>,
}

impl Handshake {
    /// Extract the handshake from the upgrade URI. Unparseable queries are
    /// treated as empty.
    pub fn from_uri(uri: &Uri) -> Self {
        Query::<Handshake>::try_from_uri(uri)
            .map(|Query(h)| h)
            .unwrap_or_default()
    }

    /// The room to join, if one was named.
    pub fn room(&self) -> Option<&str> {
        self.auction_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Bind `0.0.0.0:{port}` and serve connections forever.
pub async fn run(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve(listener, state).await
}

/// Accept connections from `listener`, each handled on its own task.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("Accepted TCP connection from {addr}");
        tokio::spawn(handle_connection(stream, addr.to_string(), Arc::clone(&state)));
    }
}

async fn handle_connection(stream: TcpStream, addr: String, state: Arc<AppState>) {
    let mut handshake = Handshake::default();
    let capture = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        handshake = Handshake::from_uri(req.uri());
        Ok(resp)
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, capture).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };
    let (mut write, read) = ws_stream.split();

    let conn = state.hub.next_connection_id();
    let (tx, mut rx) = mpsc::channel::<String>(state.outbound_buffer);
    let auction_id = handshake.room().unwrap_or_default().to_string();

    if let Err(e) = state.hub.join(&auction_id, conn, tx) {
        warn!("Rejecting {addr}: {e}");
        let _ = write.send(Message::Close(None)).await;
        return;
    }
    info!(
        conn,
        auction_id = %auction_id,
        user_email = handshake.user_email.as_deref().unwrap_or(""),
        "client {addr} connected"
    );

    // Sole writer for this socket: drains the queue the hub fills.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write.send(Message::text(frame)).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    process_message_stream(read, &state, conn, &addr).await;

    // Dropping the hub's sender ends the writer once the queue drains.
    state.hub.leave(conn);
    let _ = writer.await;
    info!(conn, auction_id = %auction_id, "client {addr} disconnected");
}

/// Dispatch text frames from any [`Stream`] of WebSocket messages until the
/// client closes, errors, or the stream ends. Frames are handled one at a
/// time, so one connection's events apply in the order it sent them.
pub async fn process_message_stream<St>(
    mut stream: St,
    state: &AppState,
    conn: ConnectionId,
    addr: &str,
) where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                dispatch_frame(state, conn, text.as_str()).await;
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
}
