use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::order::{DeliveryAddress, LineItem, Order, PaymentMethod, ShopOrder};
use crate::realtime::RealtimeEvent;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub item: Uuid,
    pub shop: Uuid,
    pub name: String,
    pub price: u64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub payment_method: PaymentMethod,
    pub delivery_address: DeliveryAddress,
    pub cart_items: Vec<CartItem>,
    #[serde(default)]
    pub delivery_mobile: Option<String>,
}

pub fn delivery_fee(config: &Config, items_total: u64) -> u64 {
    if items_total > config.free_delivery_threshold {
        0
    } else {
        config.delivery_fee
    }
}

/// Groups cart items by shop, keeping the order shops first appear in.
fn group_by_shop(items: Vec<CartItem>) -> Vec<(Uuid, Vec<CartItem>)> {
    let mut groups: Vec<(Uuid, Vec<CartItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(shop, _)| *shop == item.shop) {
            Some((_, bucket)) => bucket.push(item),
            None => groups.push((item.shop, vec![item])),
        }
    }
    groups
}

pub fn place_order(state: &AppState, user: Uuid, request: PlaceOrder) -> Result<Order, AppError> {
    if state.store.user(user).is_none() {
        return Err(AppError::NotFound(format!("user {user} not found")));
    }
    if request.cart_items.is_empty() {
        return Err(AppError::Validation("cart is empty".to_string()));
    }
    if request.delivery_address.text.trim().is_empty()
        || request.delivery_address.coordinates().is_none()
    {
        return Err(AppError::Validation(
            "delivery address needs text, latitude and longitude".to_string(),
        ));
    }
    if let Some(item) = request.cart_items.iter().find(|item| item.quantity == 0) {
        return Err(AppError::Validation(format!(
            "item {} has zero quantity",
            item.item
        )));
    }

    let mut shop_orders = Vec::new();
    for (shop_id, items) in group_by_shop(request.cart_items) {
        let shop = state
            .store
            .shop(shop_id)
            .ok_or_else(|| AppError::NotFound(format!("shop {shop_id} not found")))?;

        let lines = items
            .into_iter()
            .map(|item| LineItem {
                item: item.item,
                name: item.name,
                price: item.price,
                quantity: item.quantity,
            })
            .collect();
        shop_orders.push(ShopOrder::new(shop.id, shop.owner, lines)?);
    }

    let overflow = || AppError::Validation("order total overflows".to_string());
    let items_total = shop_orders
        .iter()
        .try_fold(0u64, |sum, so| sum.checked_add(so.subtotal))
        .ok_or_else(overflow)?;
    let fee = delivery_fee(&state.config, items_total);
    let total_amount = items_total.checked_add(fee).ok_or_else(overflow)?;

    let order = state.store.insert_order(Order {
        id: Uuid::new_v4(),
        user,
        payment_method: request.payment_method,
        delivery_address: request.delivery_address,
        delivery_mobile: request.delivery_mobile,
        total_amount,
        delivery_fee: fee,
        shop_orders,
        created_at: Utc::now(),
    });

    for so in &order.shop_orders {
        state.events.publish(
            so.shop,
            RealtimeEvent::OrderReceived {
                shop_id: so.shop,
                data: serde_json::json!({
                    "order_id": order.id,
                    "shop_order_id": so.id,
                    "subtotal": so.subtotal,
                    "items": so.items.len(),
                }),
            },
        );
    }

    info!(
        order_id = %order.id,
        user_id = %user,
        shops = order.shop_orders.len(),
        total = order.total_amount,
        "order placed"
    );

    Ok(order)
}
