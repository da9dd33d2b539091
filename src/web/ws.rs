//! `/ws` endpoint: every connection is one observer of the progress bus.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::download::bus::{ProgressBus, Subscription};
use crate::web::WebState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WebState>) -> Response {
    let bus = state.registry.bus().clone();
    ws.on_upgrade(move |socket| observe(socket, bus))
}

/// Forwards bus events to the client until either side goes away.
///
/// Client frames are read only to notice a close; their content is ignored.
async fn observe(socket: WebSocket, bus: Arc<ProgressBus>) {
    let Subscription { handle, mut receiver } = bus.subscribe().await;
    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = receiver.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    bus.unsubscribe(handle).await;
    log::debug!("WebSocket observer {:?} disconnected", handle);
}
