use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

use crate::game::arena::{Arena, Handshake};

pub async fn handle_socket(socket: WebSocket, arena: Arc<Arena>, handshake: Handshake) {
    let Some(io) = arena.open_connection(handshake).await else {
        return;
    };
    let connection_id = io.connection_id;
    let mut outbound_rx = io.outbound_rx;
    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
    });

    while let Some(result) = receiver.next().await {
        let Ok(message) = result else { break };
        match message {
            Message::Text(text) => {
                if !arena.handle_text_message(&connection_id, &text).await {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    arena.close_connection(&connection_id).await;
    send_task.abort();
}
