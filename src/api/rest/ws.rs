use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::realtime::{ClientMessage, RealtimeEvent, RoomEvent};
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

enum RoomChange {
    Join(Uuid),
    Leave(Uuid),
}

enum Step {
    Room(Option<RoomChange>),
    Event(Option<RoomEvent>),
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.events.subscribe();
    let (room_tx, mut room_rx) = mpsc::unbounded_channel::<RoomChange>();

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let step = tokio::select! {
                change = room_rx.recv() => Step::Room(change),
                event = subscription.next() => Step::Event(event),
            };

            match step {
                Step::Room(Some(RoomChange::Join(room))) => subscription.join(room),
                Step::Room(Some(RoomChange::Leave(room))) => subscription.leave(room),
                Step::Room(None) | Step::Event(None) => break,
                Step::Event(Some(event)) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize realtime event for ws");
                            continue;
                        }
                    };

                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let relay_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else { continue };

            let parsed = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    debug!(error = %err, "ignoring malformed ws frame");
                    continue;
                }
            };

            match parsed {
                ClientMessage::JoinRoom { room } => {
                    if room_tx.send(RoomChange::Join(room)).is_err() {
                        break;
                    }
                }
                ClientMessage::LeaveRoom { room } => {
                    if room_tx.send(RoomChange::Leave(room)).is_err() {
                        break;
                    }
                }
                ClientMessage::NewOrder { shop_id, data } => {
                    relay_state
                        .events
                        .publish(shop_id, RealtimeEvent::OrderReceived { shop_id, data });
                }
                ClientMessage::OrderStatusUpdate { user_id, data } => {
                    relay_state
                        .events
                        .publish(user_id, RealtimeEvent::OrderStatusChanged { user_id, data });
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
