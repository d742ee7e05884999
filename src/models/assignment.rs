use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Broadcasted,
    Assigned,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAssignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub shop_id: Uuid,
    pub shop_order_id: Uuid,
    pub broadcast_to: Vec<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub status: AssignmentStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryAssignment {
    pub fn broadcast(
        order_id: Uuid,
        shop_id: Uuid,
        shop_order_id: Uuid,
        broadcast_to: Vec<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            shop_id,
            shop_order_id,
            broadcast_to,
            assigned_to: None,
            status: AssignmentStatus::Broadcasted,
            accepted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_candidate(&self, courier_id: Uuid) -> bool {
        self.broadcast_to.contains(&courier_id)
    }
}
