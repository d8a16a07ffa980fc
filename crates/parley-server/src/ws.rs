//! Push channel endpoint.
//!
//! Each socket gets a reader task (inbound frames: auth, typing, pongs) and a
//! writer task draining the connection's outbound queue. Whichever task
//! finishes first takes the other down. Eviction fires the connection's
//! termination signal, which aborts both tasks and drops the socket even if
//! the writer is stuck on a peer that stopped reading.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use parley_shared::{InboundEvent, OutboundEvent, UserId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::hub::{ConnectionHandle, ConnectionId, Outbound};

pub async fn push_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state))
}

async fn run_connection(socket: WebSocket, state: AppState) {
    let (handle, outbound) = ConnectionHandle::new(state.config.connection_buffer);
    let (sink, stream) = socket.split();
    drive(sink, stream, handle, outbound, state).await;
}

/// Serve one connection until the peer leaves or the registry terminates it.
async fn drive<Tx, Rx>(
    mut sink: Tx,
    mut stream: Rx,
    handle: ConnectionHandle,
    mut outbound: mpsc::Receiver<Outbound>,
    state: AppState,
) where
    Tx: Sink<WsMessage> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<WsMessage, axum::Error>> + Unpin + Send + 'static,
{
    let id = handle.id();
    let terminated = handle.terminated();
    state.registry.attach(handle);
    info!(connection = %id, "Push connection opened");

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let message = match frame {
                Outbound::Event(json) => WsMessage::Text(json.to_string()),
                Outbound::Ping => WsMessage::Ping(Vec::new()),
            };
            if sink.send(message).await.is_err() {
                return;
            }
        }
        let _ = sink.send(WsMessage::Close(None)).await;
    });

    let reader_state = state.clone();
    let mut reader = tokio::spawn(async move {
        let mut user: Option<UserId> = None;
        while let Some(Ok(message)) = stream.next().await {
            match message {
                WsMessage::Text(text) => {
                    handle_frame(&reader_state, id, &mut user, &text).await;
                }
                WsMessage::Pong(_) | WsMessage::Ping(_) => reader_state.registry.mark_alive(id),
                WsMessage::Binary(_) => debug!(connection = %id, "Ignoring binary frame"),
                WsMessage::Close(_) => break,
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
        _ = terminated.cancelled() => {
            writer.abort();
            reader.abort();
        }
    }

    state.registry.unregister(id);
    info!(connection = %id, "Push connection closed");
}

async fn handle_frame(state: &AppState, id: ConnectionId, user: &mut Option<UserId>, text: &str) {
    match InboundEvent::parse(text) {
        Ok(InboundEvent::Auth { user_id }) => {
            if state.users.get_user(user_id).await.is_none() {
                warn!(connection = %id, user = %user_id, "Auth for unknown user ignored");
                return;
            }
            if state.registry.register(id, user_id) {
                *user = Some(user_id);
            }
        }
        Ok(InboundEvent::Typing { is_typing }) => match *user {
            Some(user_id) => {
                state.broadcaster.publish_except(
                    user_id,
                    id,
                    &OutboundEvent::Typing { user_id, is_typing },
                );
            }
            None => debug!(connection = %id, "Typing before auth dropped"),
        },
        Ok(InboundEvent::Unknown) => debug!(connection = %id, "Unknown event dropped"),
        Err(e) => debug!(connection = %id, error = %e, "Malformed frame dropped"),
    }
}
