//! WebSocket transport: one task pair per connection forwarding JSON text
//! frames to and from the authoritative `World` (spec §6 transport boundary).

use std::sync::Arc;

use arena_proto::outbound::OutboundMessage;
use arena_proto::{encode_outbound, parse_inbound};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use crate::state::{AppState, SEND_BUFFER_CAPACITY};

pub async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let id = state.ids.next();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(SEND_BUFFER_CAPACITY);
    let closed = Arc::new(Notify::new());
    state.register(id.clone(), tx.clone(), closed.clone()).await;

    let welcome = {
        let mut world = state.world.lock().await;
        world.on_connect(id.clone())
    };
    info!(player = %id, "subscriber connected");
    state
        .broadcast_except(
            &id,
            OutboundMessage::PlayerJoined {
                player_id: id.clone(),
                x: Some(welcome.spawn_x),
                y: Some(welcome.spawn_y),
                selected_spell: Some(welcome.selected_spell),
            },
        )
        .await;
    let mut buffer_full = tx.try_send(OutboundMessage::Welcome(welcome)).is_err();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Ok(text) = encode_outbound(&message) else {
                continue;
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while !buffer_full {
        tokio::select! {
            _ = closed.notified() => break,
            next = ws_rx.next() => {
                match next {
                    Some(Ok(Message::Text(text))) => match parse_inbound(text.as_bytes()) {
                        Ok(inbound) => {
                            let reply = {
                                let mut world = state.world.lock().await;
                                world.on_message(&id, inbound)
                            };
                            if let Some(reply) = reply {
                                buffer_full = tx.try_send(reply).is_err();
                            }
                        }
                        Err(err) => {
                            if state.should_log_protocol_error(&id).await {
                                warn!(player = %id, %err, "malformed inbound message");
                            }
                        }
                    },
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(player = %id, %err, "websocket recv error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
    if buffer_full {
        warn!(player = %id, "subscriber send buffer full, dropping connection");
    }

    writer.abort();
    state.unregister(&id).await;
    state.forget_subscriber(&id).await;
    {
        let mut world = state.world.lock().await;
        world.on_disconnect(&id);
    }
    state.pending_disconnects.lock().await.push(id.clone());
    state.broadcast(OutboundMessage::PlayerLeft { player_id: id.clone() }).await;
    info!(player = %id, "subscriber disconnected");
}
