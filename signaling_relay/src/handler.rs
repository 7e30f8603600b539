//! HTTP and WebSocket handlers
//!
//! One listener serves everything:
//!
//! - `/health` answers `ok` for load balancer checks
//! - any request carrying WebSocket upgrade headers becomes a relay connection,
//!   whatever its path
//! - any other request gets a plain `signaling-ok` so infrastructure probes
//!   never see a 404

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::state::ServerState;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use futures::{Sink, SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval};
use tracing::{debug, warn};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub state: ServerState,
    pub config: Arc<ServerConfig>,
}

/// Build the router for the relay
pub fn build_router(app: AppState) -> Router {
    Router::new()
        .route("/health", any(health))
        .fallback(upgrade_or_ack)
        .with_state(app)
}

async fn health() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "ok")
}

async fn upgrade_or_ack(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(app): State<AppState>,
) -> Response {
    match upgrade {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, app)),
        Err(_) => ([(header::CONTENT_TYPE, "text/plain")], "signaling-ok").into_response(),
    }
}

/// Drive one relay connection until the peer goes away.
async fn handle_socket(socket: WebSocket, app: AppState) {
    let (connection, rx) = Connection::new(app.config.send_queue);
    debug!(conn_id = %connection.id(), "connection opened");

    let (sink, mut stream) = socket.split();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mut writer = tokio::spawn(write_loop(
        sink,
        rx,
        shutdown_rx,
        connection.clone(),
        app.config.write_timeout,
        app.config.ping_interval,
    ));

    let mut writer_done = false;
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    app.state.handle_message(&connection, text.as_str());
                }
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => app.state.handle_message(&connection, text),
                    Err(_) => debug!(conn_id = %connection.id(), "discarding non-UTF-8 frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                // ping/pong are answered by the transport
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(conn_id = %connection.id(), error = %err, "read failed");
                    break;
                }
            },
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    app.state.disconnect(&connection);
    if !writer_done {
        // the writer finishes the close handshake, bounded by write_timeout
        let _ = shutdown_tx.send(());
        let _ = writer.await;
    }
    debug!(conn_id = %connection.id(), "connection closed");
}

/// Drain the outbound queue into the socket, one bounded write at a time,
/// then close the sink.
async fn write_loop<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<str>>,
    mut shutdown: oneshot::Receiver<()>,
    connection: Connection,
    write_timeout: Duration,
    ping_interval: Duration,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    let mut keepalive = (!ping_interval.is_zero())
        .then(|| tokio::time::interval_at(Instant::now() + ping_interval, ping_interval));

    loop {
        let message = tokio::select! {
            _ = &mut shutdown => break,
            next = rx.recv() => match next {
                Some(text) => Message::Text(text.to_string().into()),
                None => break,
            },
            () = tick(&mut keepalive) => Message::Ping(Bytes::new()),
        };

        match tokio::time::timeout(write_timeout, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(conn_id = %connection.id(), error = %err, "write failed");
                break;
            }
            Err(_) => {
                warn!(conn_id = %connection.id(), ?write_timeout, "write timed out");
                break;
            }
        }
    }

    connection.close();
    let _ = tokio::time::timeout(write_timeout, sink.close()).await;
}

async fn tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
