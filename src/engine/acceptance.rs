use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ExclusivityScope;
use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::order::ShopOrder;
use crate::models::user::Role;
use crate::realtime::RealtimeEvent;
use crate::state::AppState;
use crate::store::Transition;

#[derive(Debug, Clone, Serialize)]
pub struct Acceptance {
    pub assignment: DeliveryAssignment,
    pub shop_order: ShopOrder,
    pub expired: Vec<Uuid>,
    /// Sibling shop orders handed to the same courier under order scope.
    pub bundled: Vec<ShopOrder>,
}

/// Binds `courier_id` to an open broadcast. At most one caller ever wins.
pub async fn accept(
    state: &AppState,
    assignment_id: Uuid,
    courier_id: Uuid,
) -> Result<Acceptance, AppError> {
    let start = Instant::now();
    let result = arbitrate(state, assignment_id, courier_id);

    let outcome = match &result {
        Ok(_) => "accepted",
        Err(AppError::AssignmentExpired(_)) => "expired",
        Err(AppError::CourierBusy(_)) => "busy",
        Err(AppError::NotFound(_)) => "not_found",
        Err(AppError::Forbidden(_)) => "forbidden",
        Err(_) => "error",
    };
    state
        .metrics
        .accepts_total
        .with_label_values(&[outcome])
        .inc();
    state
        .metrics
        .accept_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());

    let acceptance = result?;

    for so in std::iter::once(&acceptance.shop_order).chain(&acceptance.bundled) {
        state.events.publish(
            so.shop,
            RealtimeEvent::AssignmentAccepted {
                assignment_id,
                order_id: acceptance.assignment.order_id,
                shop_order_id: so.id,
                courier_id,
            },
        );
    }

    info!(
        assignment_id = %assignment_id,
        courier_id = %courier_id,
        order_id = %acceptance.assignment.order_id,
        expired = acceptance.expired.len(),
        bundled = acceptance.bundled.len(),
        "delivery accepted"
    );

    Ok(acceptance)
}

fn arbitrate(
    state: &AppState,
    assignment_id: Uuid,
    courier_id: Uuid,
) -> Result<Acceptance, AppError> {
    let store = &state.store;

    let snapshot = store
        .assignment(assignment_id)
        .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))?;

    if snapshot.status != AssignmentStatus::Broadcasted {
        return Err(AppError::AssignmentExpired(assignment_id.to_string()));
    }

    let is_courier = store
        .user(courier_id)
        .is_some_and(|user| user.role == Role::Courier);
    if !is_courier || !snapshot.is_candidate(courier_id) {
        return Err(AppError::Forbidden(format!(
            "courier {courier_id} was not offered assignment {assignment_id}"
        )));
    }

    if store.claim_courier(courier_id, assignment_id).is_err() {
        return Err(AppError::CourierBusy(courier_id.to_string()));
    }

    let now = Utc::now();
    let assignment = match store.transition_assignment(
        assignment_id,
        AssignmentStatus::Broadcasted,
        |a| {
            a.status = AssignmentStatus::Assigned;
            a.assigned_to = Some(courier_id);
            a.accepted_at = Some(now);
        },
    ) {
        Ok(Transition::Applied(assignment)) => assignment,
        Ok(Transition::Rejected(_)) => {
            store.release_courier(courier_id, assignment_id);
            return Err(AppError::AssignmentExpired(assignment_id.to_string()));
        }
        Err(err) => {
            store.release_courier(courier_id, assignment_id);
            return Err(err);
        }
    };

    let linked = store.update_shop_order(assignment.order_id, assignment.shop_order_id, |_, so| {
        if so.assignment != Some(assignment_id) {
            return Err(AppError::Storage(format!(
                "shop order {} is not linked to assignment {assignment_id}",
                so.id
            )));
        }
        so.assigned_courier = Some(courier_id);
        Ok(so.clone())
    });

    let shop_order = match linked {
        Ok(shop_order) => shop_order,
        Err(err) => {
            error!(
                assignment_id = %assignment_id,
                error = %err,
                "accepted assignment could not be linked; expiring it"
            );
            match store.transition_assignment(assignment_id, AssignmentStatus::Assigned, |a| {
                a.status = AssignmentStatus::Expired;
            }) {
                Ok(Transition::Applied(_)) => {}
                Ok(Transition::Rejected(status)) => {
                    warn!(assignment_id = %assignment_id, ?status, "unlinked assignment changed under us");
                }
                Err(expire_err) => {
                    warn!(assignment_id = %assignment_id, error = %expire_err, "could not expire unlinked assignment");
                }
            }
            store.release_courier(courier_id, assignment_id);
            return Err(err);
        }
    };

    state.metrics.active_assignments.inc();

    let (expired, bundled) = match state.config.exclusivity_scope {
        ExclusivityScope::ShopOrder => {
            let expired = store.expire_broadcasts(assignment_id, |other| {
                other.shop_order_id == assignment.shop_order_id
            });
            (expired, Vec::new())
        }
        ExclusivityScope::Order => {
            let expired = store
                .expire_broadcasts(assignment_id, |other| other.order_id == assignment.order_id);
            let bundled = bundle_siblings(state, &expired, assignment_id, courier_id);
            (expired, bundled)
        }
    };

    Ok(Acceptance {
        assignment,
        shop_order,
        expired: expired.into_iter().map(|a| a.id).collect(),
        bundled,
    })
}

fn bundle_siblings(
    state: &AppState,
    expired: &[DeliveryAssignment],
    assignment_id: Uuid,
    courier_id: Uuid,
) -> Vec<ShopOrder> {
    let mut bundled = Vec::new();

    for sibling in expired {
        let linked = state
            .store
            .update_shop_order(sibling.order_id, sibling.shop_order_id, |_, so| {
                if so.assignment != Some(sibling.id) || so.status.is_terminal() {
                    return Ok(None);
                }
                so.assignment = Some(assignment_id);
                so.assigned_courier = Some(courier_id);
                Ok(Some(so.clone()))
            });

        match linked {
            Ok(Some(so)) => bundled.push(so),
            Ok(None) => {}
            Err(err) => {
                warn!(
                    assignment_id = %sibling.id,
                    error = %err,
                    "could not bundle sibling shop order"
                );
            }
        }
    }

    bundled
}
