use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::status::notify_customer;
use crate::error::AppError;
use crate::mail::DeliveryCodeMail;
use crate::models::assignment::AssignmentStatus;
use crate::models::order::{ShopOrder, ShopOrderStatus};
use crate::state::AppState;
use crate::store::Transition;

const CODE_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

#[derive(Debug, Clone, Serialize)]
pub struct CodeIssued {
    pub order_id: Uuid,
    pub shop_order_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub mailed: bool,
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_RANGE).to_string()
}

/// A new code replaces any earlier one; mail failures only clear `mailed`.
pub async fn issue_code(
    state: &AppState,
    order_id: Uuid,
    shop_order_id: Uuid,
) -> Result<CodeIssued, AppError> {
    let code = generate_code();
    let ttl_secs = state.config.delivery_code_ttl_secs;
    let expires_at = Duration::try_seconds(ttl_secs)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| AppError::Internal(format!("delivery code ttl {ttl_secs}s out of range")))?;

    let customer_id = state
        .store
        .update_shop_order(order_id, shop_order_id, |order, so| {
            if so.status != ShopOrderStatus::OutForDelivery || so.assigned_courier.is_none() {
                return Err(AppError::InvalidTransition(format!(
                    "shop order {} has no courier out for delivery",
                    so.id
                )));
            }
            so.delivery_code = Some(code.clone());
            so.code_expires_at = Some(expires_at);
            Ok(order.user)
        })?;

    state.metrics.delivery_codes_issued_total.inc();

    let mailed = match state.store.user(customer_id) {
        Some(customer) => {
            let mail = DeliveryCodeMail {
                to: customer.email,
                recipient_name: customer.fullname,
                code,
                expires_in_minutes: ttl_secs.saturating_add(59) / 60,
            };
            match state.mailer.send_delivery_code(mail).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(order_id = %order_id, error = %err, "delivery code mail failed");
                    false
                }
            }
        }
        None => {
            warn!(order_id = %order_id, user_id = %customer_id, "customer missing; code not mailed");
            false
        }
    };

    info!(order_id = %order_id, shop_order_id = %shop_order_id, mailed, "delivery code issued");

    Ok(CodeIssued {
        order_id,
        shop_order_id,
        expires_at,
        mailed,
    })
}

pub async fn verify_code(
    state: &AppState,
    order_id: Uuid,
    shop_order_id: Uuid,
    code: &str,
) -> Result<ShopOrder, AppError> {
    let now = Utc::now();
    let supplied = code.trim();

    let (delivered, customer_id) = state
        .store
        .update_shop_order(order_id, shop_order_id, |order, so| {
            let stored = so.delivery_code.as_deref().ok_or(AppError::InvalidCode)?;
            if stored != supplied {
                return Err(AppError::InvalidCode);
            }
            let expires_at = so.code_expires_at.ok_or(AppError::CodeExpired)?;
            if now >= expires_at {
                return Err(AppError::CodeExpired);
            }

            mark_delivered(so, now);
            Ok((so.clone(), order.user))
        })?;

    retire_assignment(state, order_id, &delivered);
    state
        .metrics
        .deliveries_completed_total
        .with_label_values(&["verified"])
        .inc();
    notify_customer(state, customer_id, order_id, &delivered);

    info!(
        order_id = %order_id,
        shop_order_id = %shop_order_id,
        courier_id = ?delivered.assigned_courier,
        "delivery completed"
    );

    Ok(delivered)
}

/// Administrative completion without a code. Always audited.
pub async fn force_deliver(
    state: &AppState,
    order_id: Uuid,
    shop_order_id: Uuid,
    reason: &str,
) -> Result<ShopOrder, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation(
            "a reason is required to override delivery".to_string(),
        ));
    }

    let now = Utc::now();
    let (delivered, customer_id, previous) = state
        .store
        .update_shop_order(order_id, shop_order_id, |order, so| {
            if so.status.is_terminal() {
                return Err(AppError::InvalidTransition(
                    "shop order is already delivered".to_string(),
                ));
            }
            let previous = so.status;
            mark_delivered(so, now);
            Ok((so.clone(), order.user, previous))
        })?;

    retire_assignment(state, order_id, &delivered);
    state
        .metrics
        .deliveries_completed_total
        .with_label_values(&["override"])
        .inc();
    notify_customer(state, customer_id, order_id, &delivered);

    warn!(
        target: "audit",
        order_id = %order_id,
        shop_order_id = %shop_order_id,
        previous_status = previous.as_str(),
        courier_id = ?delivered.assigned_courier,
        reason,
        "delivery forced to delivered without code"
    );

    Ok(delivered)
}

fn mark_delivered(so: &mut ShopOrder, at: DateTime<Utc>) {
    so.status = ShopOrderStatus::Delivered;
    so.delivered_at = Some(at);
    so.delivery_code = None;
    so.code_expires_at = None;
}

fn retire_assignment(state: &AppState, order_id: Uuid, so: &ShopOrder) {
    let Some(assignment_id) = so.assignment else {
        return;
    };

    let still_carrying = state.store.order(order_id).is_some_and(|order| {
        order
            .shop_orders
            .iter()
            .any(|other| other.assignment == Some(assignment_id) && !other.status.is_terminal())
    });
    if still_carrying {
        info!(assignment_id = %assignment_id, "courier still carrying bundled shop orders");
        return;
    }

    let completed = state
        .store
        .transition_assignment(assignment_id, AssignmentStatus::Assigned, |a| {
            a.status = AssignmentStatus::Completed;
        });

    match completed {
        Ok(Transition::Applied(assignment)) => {
            if let Some(courier) = assignment.assigned_to {
                if state.store.release_courier(courier, assignment_id) {
                    state.metrics.active_assignments.dec();
                }
            }
        }
        Ok(Transition::Rejected(AssignmentStatus::Broadcasted)) => {
            // Nobody accepted yet; close the open broadcast.
            let expired = state
                .store
                .transition_assignment(assignment_id, AssignmentStatus::Broadcasted, |a| {
                    a.status = AssignmentStatus::Expired;
                });
            match expired {
                Ok(Transition::Applied(_)) => {}
                Ok(Transition::Rejected(status)) => {
                    warn!(assignment_id = %assignment_id, ?status, "open broadcast changed before expiry");
                }
                Err(err) => {
                    warn!(assignment_id = %assignment_id, error = %err, "could not expire open broadcast");
                }
            }
        }
        Ok(Transition::Rejected(status)) => {
            warn!(assignment_id = %assignment_id, ?status, "assignment already closed");
        }
        Err(err) => {
            warn!(assignment_id = %assignment_id, error = %err, "could not retire assignment");
        }
    }
}
