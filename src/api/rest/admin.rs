use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::extract::AdminAccess;
use crate::engine::completion::force_deliver;
use crate::error::AppError;
use crate::models::order::ShopOrder;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/admin/order/:order_id/shop-order/:shop_order_id/force-deliver",
        post(force_deliver_shop_order),
    )
}

#[derive(Deserialize)]
pub struct ForceDeliverRequest {
    pub reason: String,
}

async fn force_deliver_shop_order(
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    Path((order_id, shop_order_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ForceDeliverRequest>,
) -> Result<Json<ShopOrder>, AppError> {
    let shop_order = force_deliver(&state, order_id, shop_order_id, &payload.reason).await?;
    Ok(Json(shop_order))
}
