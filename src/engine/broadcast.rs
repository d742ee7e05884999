use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::order::{DeliveryAddress, ShopOrder, ShopOrderStatus};
use crate::models::user::{CandidateCourier, GeoPoint, Role, User};
use crate::realtime::RealtimeEvent;
use crate::state::AppState;
use crate::store::Transition;

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastOutcome {
    pub assignment: DeliveryAssignment,
    pub shop_order: ShopOrder,
    pub candidates: Vec<CandidateCourier>,
}

/// Nearby couriers that do not already hold a delivery.
pub async fn eligible_couriers(state: &AppState, origin: GeoPoint) -> Result<Vec<User>, AppError> {
    let nearby = state
        .proximity
        .nearby(
            origin,
            state.config.search_radius_meters,
            state.config.candidate_limit,
            Role::Courier,
        )
        .await?;

    Ok(nearby
        .into_iter()
        .filter(|courier| !state.store.is_courier_busy(courier.id))
        .collect())
}

pub async fn broadcast(
    state: &AppState,
    order_id: Uuid,
    shop_order: &ShopOrder,
    address: &DeliveryAddress,
) -> Result<BroadcastOutcome, AppError> {
    let origin = address.coordinates().ok_or_else(|| {
        AppError::Validation("delivery address needs both latitude and longitude".to_string())
    })?;

    let couriers = eligible_couriers(state, origin).await?;
    if couriers.is_empty() {
        state
            .metrics
            .broadcasts_total
            .with_label_values(&["no_courier"])
            .inc();
        warn!(
            order_id = %order_id,
            shop_order_id = %shop_order.id,
            "no eligible couriers near delivery address"
        );
        return Err(AppError::NoAvailableCouriers);
    }

    let candidate_ids: Vec<Uuid> = couriers.iter().map(|courier| courier.id).collect();
    let assignment =
        DeliveryAssignment::broadcast(order_id, shop_order.shop, shop_order.id, candidate_ids);

    // The record is inserted while the order entry is locked, so an accept
    // that races it waits for the link before checking it.
    let linked = state
        .store
        .update_shop_order(order_id, shop_order.id, |_, so| {
            if so.status.is_terminal() {
                return Err(AppError::InvalidTransition(format!(
                    "shop order {} is already delivered",
                    so.id
                )));
            }
            if let Some(existing) = so.assignment {
                return Err(AppError::InvalidTransition(format!(
                    "shop order {} is already linked to assignment {existing}",
                    so.id
                )));
            }

            state.store.insert_assignment(assignment.clone());
            so.assignment = Some(assignment.id);
            so.assigned_courier = None;
            so.status = ShopOrderStatus::OutForDelivery;
            Ok(so.clone())
        });

    let linked = match linked {
        Ok(linked) => linked,
        Err(err) => {
            state.store.revoke_assignment(assignment.id);
            state
                .metrics
                .broadcasts_total
                .with_label_values(&["link_failed"])
                .inc();
            warn!(
                assignment_id = %assignment.id,
                error = %err,
                "revoked assignment that could not be linked"
            );
            return Err(err);
        }
    };

    for courier in &couriers {
        state.events.publish(
            courier.id,
            RealtimeEvent::DeliveryBroadcast {
                assignment_id: assignment.id,
                order_id,
                shop_id: linked.shop,
                shop_order_id: linked.id,
            },
        );
    }

    state
        .metrics
        .broadcasts_total
        .with_label_values(&["broadcasted"])
        .inc();
    info!(
        order_id = %order_id,
        shop_order_id = %linked.id,
        assignment_id = %assignment.id,
        candidates = couriers.len(),
        "delivery broadcasted"
    );

    Ok(BroadcastOutcome {
        assignment,
        shop_order: linked,
        candidates: couriers.iter().map(CandidateCourier::from).collect(),
    })
}

/// Replaces an unaccepted broadcast with a fresh one.
pub async fn rebroadcast(
    state: &AppState,
    order_id: Uuid,
    shop_id: Uuid,
    caller: Uuid,
) -> Result<BroadcastOutcome, AppError> {
    let order = state
        .store
        .order(order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
    let shop_order = order
        .shop_order_for_shop(shop_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("no shop order for shop {shop_id}")))?;

    if shop_order.owner != caller {
        return Err(AppError::Forbidden(
            "only the shop owner can rebroadcast".to_string(),
        ));
    }
    if shop_order.status != ShopOrderStatus::OutForDelivery {
        return Err(AppError::InvalidTransition(format!(
            "shop order is {}, not out_for_delivery",
            shop_order.status.as_str()
        )));
    }

    if let Some(previous) = shop_order.assignment {
        let expired = state
            .store
            .transition_assignment(previous, AssignmentStatus::Broadcasted, |a| {
                a.status = AssignmentStatus::Expired;
            });

        match expired {
            Ok(Transition::Applied(_)) | Ok(Transition::Rejected(AssignmentStatus::Expired)) => {}
            Ok(Transition::Rejected(_)) => {
                return Err(AppError::InvalidTransition(
                    "a courier already accepted this delivery".to_string(),
                ));
            }
            Err(AppError::NotFound(_)) => {
                warn!(assignment_id = %previous, "shop order pointed at a missing assignment");
            }
            Err(err) => return Err(err),
        }

        state.store.update_shop_order(order_id, shop_order.id, |_, so| {
            if so.assignment == Some(previous) {
                so.assignment = None;
            }
            Ok(())
        })?;
    }

    let shop_order = state
        .store
        .order(order_id)
        .and_then(|order| order.shop_order(shop_order.id).cloned())
        .ok_or_else(|| AppError::Storage(format!("shop order {} vanished", shop_order.id)))?;

    broadcast(state, order_id, &shop_order, &order.delivery_address).await
}
