use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::{AppState, Keepalive};
use crate::ws::lifecycle::{ConnectionState, Lifecycle};
use crate::ws::Session;

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from an mpsc channel
/// - Reader loop: hands every inbound frame to the message router, in order
///
/// The mpsc sender is the connection handle stored in the registry, so any
/// part of the system can push frames to this client by cloning it.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    username: String,
    mut lifecycle: Lifecycle,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Writer first so the presence frame below has somewhere to go.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let session = match state.registry.register(&username, tx.clone()) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(username = %username, error = %e, "Registration refused");
            writer_handle.abort();
            lifecycle.advance(ConnectionState::Closed);
            return;
        }
    };
    lifecycle.advance(ConnectionState::Registered);
    state.presence.broadcast_all("");

    tracing::info!(
        username = %session.username,
        session_id = %session.id,
        "WebSocket actor started"
    );

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_handle = tokio::spawn(keepalive_task(tx.clone(), pong_rx, state.keepalive));

    lifecycle.advance(ConnectionState::Active);
    receive_loop(&mut ws_receiver, &state, &session, &tx, &pong_tx).await;

    lifecycle.advance(ConnectionState::Closing);
    ping_handle.abort();
    state.registry.unregister(session.id);
    // Dropping the writer closes our half of the socket.
    writer_handle.abort();
    state.presence.broadcast_all("");
    lifecycle.advance(ConnectionState::Closed);

    tracing::info!(
        username = %session.username,
        session_id = %session.id,
        "WebSocket actor stopped"
    );
}

/// Read frames until the peer closes, the transport fails, or the writer is
/// gone (write failure or keepalive close).
///
/// Only the wait for the next frame races the writer; a frame that has been
/// read is always routed to completion.
async fn receive_loop(
    ws_receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    state: &AppState,
    session: &Session,
    tx: &mpsc::UnboundedSender<Message>,
    pong_tx: &mpsc::UnboundedSender<()>,
) {
    loop {
        let next = tokio::select! {
            next = ws_receiver.next() => next,
            _ = tx.closed() => {
                tracing::info!(
                    username = %session.username,
                    session_id = %session.id,
                    "WebSocket writer closed"
                );
                return;
            }
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    if let Err(e) = state.router.route(session, text.as_str()).await {
                        e.log(session);
                    }
                }
                Message::Binary(data) => {
                    if let Err(e) = state.router.route_binary(session, &data).await {
                        e.log(session);
                    }
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        username = %session.username,
                        session_id = %session.id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    return;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    username = %session.username,
                    session_id = %session.id,
                    error = %e,
                    "WebSocket receive error"
                );
                return;
            }
            None => {
                tracing::info!(
                    username = %session.username,
                    session_id = %session.id,
                    "WebSocket stream ended"
                );
                return;
            }
        }
    }
}

/// Send periodic pings; close the connection if a pong does not come back
/// within the timeout.
async fn keepalive_task(
    ping_tx: mpsc::UnboundedSender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    keepalive: Keepalive,
) {
    let mut ping_timer = interval(keepalive.ping_interval);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            // Writer task has died, connection is gone
            break;
        }

        match timeout(keepalive.pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}

/// Writer task: receives frames from the mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}
