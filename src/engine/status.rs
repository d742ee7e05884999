use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::broadcast::broadcast;
use crate::error::AppError;
use crate::models::order::{ShopOrder, ShopOrderStatus};
use crate::models::user::CandidateCourier;
use crate::realtime::RealtimeEvent;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub shop_order: ShopOrder,
    pub assignment: Option<Uuid>,
    /// Couriers offered the delivery; empty unless this update broadcast it.
    pub broadcasted_to: Vec<CandidateCourier>,
}

pub fn check_transition(from: ShopOrderStatus, to: ShopOrderStatus) -> Result<(), AppError> {
    if to == ShopOrderStatus::Delivered {
        return Err(AppError::Validation(
            "delivered can only be set by delivery code verification".to_string(),
        ));
    }
    if from.is_terminal() {
        return Err(AppError::InvalidTransition(
            "shop order is already delivered".to_string(),
        ));
    }
    if to.rank() < from.rank() {
        return Err(AppError::InvalidTransition(format!(
            "cannot move from {} back to {}",
            from.as_str(),
            to.as_str()
        )));
    }
    Ok(())
}

pub async fn update_status(
    state: &AppState,
    order_id: Uuid,
    shop_id: Uuid,
    caller: Uuid,
    target: ShopOrderStatus,
) -> Result<StatusUpdate, AppError> {
    let order = state
        .store
        .order(order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
    let current = order
        .shop_order_for_shop(shop_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("no shop order for shop {shop_id}")))?;

    if current.owner != caller {
        return Err(AppError::Forbidden(
            "only the shop owner can change this order".to_string(),
        ));
    }

    check_transition(current.status, target)?;

    if target == ShopOrderStatus::OutForDelivery && current.assignment.is_none() {
        let outcome = broadcast(state, order_id, &current, &order.delivery_address).await?;
        notify_customer(state, order.user, order_id, &outcome.shop_order);

        return Ok(StatusUpdate {
            assignment: Some(outcome.assignment.id),
            shop_order: outcome.shop_order,
            broadcasted_to: outcome.candidates,
        });
    }

    if current.status == target {
        return Ok(StatusUpdate {
            assignment: current.assignment,
            shop_order: current,
            broadcasted_to: Vec::new(),
        });
    }

    let updated = state
        .store
        .update_shop_order(order_id, current.id, |_, so| {
            check_transition(so.status, target)?;
            so.status = target;
            Ok(so.clone())
        })?;

    info!(
        order_id = %order_id,
        shop_order_id = %updated.id,
        status = target.as_str(),
        "shop order status changed"
    );
    notify_customer(state, order.user, order_id, &updated);

    Ok(StatusUpdate {
        assignment: updated.assignment,
        shop_order: updated,
        broadcasted_to: Vec::new(),
    })
}

pub(crate) fn notify_customer(state: &AppState, user: Uuid, order_id: Uuid, so: &ShopOrder) {
    state.events.publish(
        user,
        RealtimeEvent::status_changed(user, order_id, so.id, so.status),
    );
}
