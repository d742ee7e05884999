use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::extract::Caller;
use crate::engine::broadcast::{rebroadcast, BroadcastOutcome};
use crate::engine::completion::{issue_code, verify_code, CodeIssued};
use crate::engine::placement::{place_order, PlaceOrder};
use crate::engine::status::{update_status, StatusUpdate};
use crate::error::AppError;
use crate::models::order::{Order, ShopOrder, ShopOrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/order", post(create_order))
        .route("/order/my-orders", get(my_orders))
        .route("/order/owner-orders", get(owner_orders))
        .route("/order/delivery-code/send", post(send_delivery_code))
        .route("/order/delivery-code/verify", post(verify_delivery_code))
        .route("/order/:order_id", get(get_order))
        .route(
            "/order/:order_id/shop/:shop_id/status",
            patch(update_shop_order_status),
        )
        .route(
            "/order/:order_id/shop/:shop_id/rebroadcast",
            post(rebroadcast_shop_order),
        )
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ShopOrderStatus,
}

#[derive(Deserialize)]
pub struct DeliveryCodeRequest {
    #[serde(alias = "orderId")]
    pub order_id: Uuid,
    #[serde(alias = "shopOrderId")]
    pub shop_order_id: Uuid,
}

#[derive(Deserialize)]
pub struct VerifyCodeRequest {
    #[serde(alias = "orderId")]
    pub order_id: Uuid,
    #[serde(alias = "shopOrderId")]
    pub shop_order_id: Uuid,
    pub code: String,
}

#[derive(Serialize)]
pub struct DeliveredResponse {
    pub message: &'static str,
    pub shop_order: ShopOrder,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(payload): Json<PlaceOrder>,
) -> Result<Json<Order>, AppError> {
    let order = place_order(&state, caller, payload)?;
    Ok(Json(order))
}

async fn my_orders(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> Json<Vec<Order>> {
    Json(state.store.orders_for_user(caller))
}

async fn owner_orders(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
) -> Json<Vec<Order>> {
    Json(state.store.orders_for_owner(caller))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .store
        .order(order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let involved = order.user == caller
        || order
            .shop_orders
            .iter()
            .any(|so| so.owner == caller || so.assigned_courier == Some(caller));
    if !involved {
        return Err(AppError::Forbidden(format!(
            "order {order_id} belongs to someone else"
        )));
    }

    Ok(Json(order))
}

async fn update_shop_order_status(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path((order_id, shop_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<StatusUpdate>, AppError> {
    let update = update_status(&state, order_id, shop_id, caller, payload.status).await?;
    Ok(Json(update))
}

async fn rebroadcast_shop_order(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path((order_id, shop_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<BroadcastOutcome>, AppError> {
    let outcome = rebroadcast(&state, order_id, shop_id, caller).await?;
    Ok(Json(outcome))
}

/// Only the courier carrying the shop order may drive the code handshake.
fn ensure_assigned_courier(
    state: &AppState,
    caller: Uuid,
    order_id: Uuid,
    shop_order_id: Uuid,
) -> Result<(), AppError> {
    let order = state
        .store
        .order(order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
    let shop_order = order.shop_order(shop_order_id).ok_or_else(|| {
        AppError::NotFound(format!("shop order {shop_order_id} not found"))
    })?;

    if shop_order.assigned_courier != Some(caller) {
        return Err(AppError::Forbidden(
            "only the assigned courier can complete this delivery".to_string(),
        ));
    }
    Ok(())
}

async fn send_delivery_code(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(payload): Json<DeliveryCodeRequest>,
) -> Result<Json<CodeIssued>, AppError> {
    ensure_assigned_courier(&state, caller, payload.order_id, payload.shop_order_id)?;
    let issued = issue_code(&state, payload.order_id, payload.shop_order_id).await?;
    Ok(Json(issued))
}

async fn verify_delivery_code(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<DeliveredResponse>, AppError> {
    ensure_assigned_courier(&state, caller, payload.order_id, payload.shop_order_id)?;
    let shop_order =
        verify_code(&state, payload.order_id, payload.shop_order_id, &payload.code).await?;

    Ok(Json(DeliveredResponse {
        message: "delivery completed",
        shop_order,
    }))
}
