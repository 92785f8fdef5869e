// Per-socket session - Pumps frames between one client and the hub
use crate::application::connection_hub::{Connection, ConnectionHub, ConnectionId, Outbound};
use crate::presentation::app_state::AppState;
use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn run_session(socket: WebSocket, state: Arc<AppState>) {
    let (ws_tx, mut ws_rx) = socket.split();
    let Connection { id, outbox } = state.hub.accept();

    let writer = tokio::spawn(write_outbox(ws_tx, outbox, state.hub.clone(), id));

    let mut reason = None;
    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(Message::Text(text)) => state.hub.on_message(id, &text, &state.router).await,
            Ok(Message::Close(frame)) => {
                reason = frame.map(|f| f.reason.to_string());
                break;
            }
            Ok(Message::Binary(_)) => tracing::debug!("Binary frames are not supported, ignoring"),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                state.hub.on_error(id, &e);
                break;
            }
        }
    }

    state.hub.on_close(id, reason.as_deref());
    writer.abort();
}

/// Drain the hub queue into the socket. A failed write removes the
/// connection right away instead of waiting for the next delivery.
async fn write_outbox<S>(
    mut sink: S,
    mut outbox: mpsc::Receiver<Outbound>,
    hub: Arc<ConnectionHub>,
    id: ConnectionId,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(outbound) = outbox.recv().await {
        match outbound {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    hub.on_error(id, &e);
                    break;
                }
            }
            Outbound::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}
