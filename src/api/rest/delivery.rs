use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::rest::extract::Caller;
use crate::engine::acceptance::{accept, Acceptance};
use crate::error::AppError;
use crate::models::assignment::{AssignmentStatus, DeliveryAssignment};
use crate::models::order::{DeliveryAddress, LineItem, Order, PaymentMethod, ShopOrder};
use crate::models::user::{Contact, GeoPoint};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/delivery/assignments", get(list_open_assignments))
        .route(
            "/delivery/assignments/:assignment_id/accept",
            post(accept_assignment),
        )
        .route("/delivery/current", get(current_delivery))
}

#[derive(Serialize)]
pub struct ShopSummary {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
}

/// An open broadcast as a candidate courier sees it.
#[derive(Serialize)]
pub struct AssignmentView {
    pub id: Uuid,
    pub status: AssignmentStatus,
    pub order_id: Uuid,
    pub shop_order_id: Uuid,
    pub shop: Option<ShopSummary>,
    pub owner: Option<Contact>,
    pub customer: Option<Contact>,
    pub delivery_address: DeliveryAddress,
    pub subtotal: u64,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineItem>,
    pub broadcast_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct CurrentDelivery {
    pub assignment: DeliveryAssignment,
    pub shop_order: ShopOrder,
    pub shop: Option<ShopSummary>,
    pub owner: Option<Contact>,
    pub customer: Option<Contact>,
    pub delivery_mobile: Option<String>,
    pub courier_location: Option<GeoPoint>,
    pub customer_location: Option<GeoPoint>,
}

fn shop_summary(state: &AppState, shop_id: Uuid) -> Option<ShopSummary> {
    state.store.shop(shop_id).map(|shop| ShopSummary {
        id: shop.id,
        name: shop.name,
        address: shop.address,
    })
}

fn contact(state: &AppState, user_id: Uuid) -> Option<Contact> {
    state.store.user(user_id).as_ref().map(Contact::from)
}

fn resolve(
    state: &AppState,
    assignment: &DeliveryAssignment,
) -> Result<(Order, ShopOrder), AppError> {
    let order = state.store.order(assignment.order_id).ok_or_else(|| {
        AppError::Storage(format!(
            "assignment {} points at missing order {}",
            assignment.id, assignment.order_id
        ))
    })?;
    let shop_order = order
        .shop_order(assignment.shop_order_id)
        .cloned()
        .ok_or_else(|| {
            AppError::Storage(format!(
                "assignment {} points at missing shop order {}",
                assignment.id, assignment.shop_order_id
            ))
        })?;
    Ok((order, shop_order))
}

async fn list_open_assignments(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> Result<Json<Vec<AssignmentView>>, AppError> {
    let views = state
        .store
        .broadcasts_for_courier(caller)
        .into_iter()
        .map(|assignment| {
            let (order, shop_order) = resolve(&state, &assignment)?;
            Ok(AssignmentView {
                id: assignment.id,
                status: assignment.status,
                order_id: order.id,
                shop_order_id: shop_order.id,
                shop: shop_summary(&state, shop_order.shop),
                owner: contact(&state, shop_order.owner),
                customer: contact(&state, order.user),
                delivery_address: order.delivery_address,
                subtotal: shop_order.subtotal,
                payment_method: order.payment_method,
                items: shop_order.items,
                broadcast_at: assignment.created_at,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Json(views))
}

async fn accept_assignment(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<Acceptance>, AppError> {
    let acceptance = accept(&state, assignment_id, caller).await?;
    Ok(Json(acceptance))
}

async fn current_delivery(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> Result<Json<CurrentDelivery>, AppError> {
    let assignment = state
        .store
        .active_assignment_for(caller)
        .and_then(|id| state.store.assignment(id))
        .filter(|assignment| assignment.status == AssignmentStatus::Assigned)
        .ok_or_else(|| AppError::NotFound("no active delivery".to_string()))?;

    let (order, shop_order) = resolve(&state, &assignment)?;

    Ok(Json(CurrentDelivery {
        shop: shop_summary(&state, shop_order.shop),
        owner: contact(&state, shop_order.owner),
        customer: contact(&state, order.user),
        delivery_mobile: order.delivery_mobile.clone(),
        courier_location: state.store.user(caller).and_then(|user| user.location),
        customer_location: order.delivery_address.coordinates(),
        assignment,
        shop_order,
    }))
}
