use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::order::ShopOrderStatus;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    OrderReceived {
        shop_id: Uuid,
        data: Value,
    },
    OrderStatusChanged {
        user_id: Uuid,
        data: Value,
    },
    DeliveryBroadcast {
        assignment_id: Uuid,
        order_id: Uuid,
        shop_id: Uuid,
        shop_order_id: Uuid,
    },
    AssignmentAccepted {
        assignment_id: Uuid,
        order_id: Uuid,
        shop_order_id: Uuid,
        courier_id: Uuid,
    },
}

impl RealtimeEvent {
    pub fn status_changed(
        user_id: Uuid,
        order_id: Uuid,
        shop_order_id: Uuid,
        status: ShopOrderStatus,
    ) -> Self {
        RealtimeEvent::OrderStatusChanged {
            user_id,
            data: serde_json::json!({
                "order_id": order_id,
                "shop_order_id": shop_order_id,
                "status": status,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomEvent {
    pub room: Uuid,
    #[serde(flatten)]
    pub event: RealtimeEvent,
}

/// Frames a websocket client may send.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom {
        room: Uuid,
    },
    LeaveRoom {
        room: Uuid,
    },
    NewOrder {
        shop_id: Uuid,
        #[serde(default)]
        data: Value,
    },
    OrderStatusUpdate {
        user_id: Uuid,
        #[serde(default)]
        data: Value,
    },
}

/// Best-effort fan-out keyed by room (a shop id or a user id).
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<RoomEvent>,
}

impl EventHub {
    pub fn new(buffer: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Returns how many connections could observe the event.
    pub fn publish(&self, room: Uuid, event: RealtimeEvent) -> usize {
        match self.tx.send(RoomEvent { room, event }) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(%room, "no realtime subscribers; event dropped");
                0
            }
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            stream: BroadcastStream::new(self.tx.subscribe()),
            rooms: HashSet::new(),
        }
    }
}

pub struct Subscription {
    stream: BroadcastStream<RoomEvent>,
    rooms: HashSet<Uuid>,
}

impl Subscription {
    pub fn join(&mut self, room: Uuid) {
        self.rooms.insert(room);
    }

    pub fn leave(&mut self, room: Uuid) {
        self.rooms.remove(&room);
    }

    /// Next event for a joined room; `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<RoomEvent> {
        while let Some(item) = self.stream.next().await {
            match item {
                Ok(event) if self.rooms.contains(&event.room) => return Some(event),
                Ok(_) => continue,
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    warn!(missed, "realtime subscriber lagged; events dropped");
                }
            }
        }
        None
    }
}
