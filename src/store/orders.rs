use uuid::Uuid;

use super::Store;
use crate::error::AppError;
use crate::models::order::{Order, ShopOrder};

impl Store {
    pub fn insert_order(&self, order: Order) -> Order {
        self.orders.insert(order.id, order.clone());
        order
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.orders.get(&id).map(|entry| entry.value().clone())
    }

    pub fn orders_for_user(&self, user: Uuid) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().user == user)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Orders touching any shop of `owner`, each trimmed to that owner's shop orders.
    pub fn orders_for_owner(&self, owner: Uuid) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().shop_orders.iter().any(|so| so.owner == owner))
            .map(|entry| {
                let mut order = entry.value().clone();
                order.shop_orders.retain(|so| so.owner == owner);
                order
            })
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// `apply` works on a scratch copy that is written back only on `Ok`.
    pub fn update_shop_order<T>(
        &self,
        order_id: Uuid,
        shop_order_id: Uuid,
        apply: impl FnOnce(&Order, &mut ShopOrder) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        let mut scratch = order.shop_order(shop_order_id).cloned().ok_or_else(|| {
            AppError::NotFound(format!(
                "shop order {shop_order_id} not found in order {order_id}"
            ))
        })?;

        let outcome = apply(&order, &mut scratch)?;

        let slot = order.shop_order_mut(shop_order_id).ok_or_else(|| {
            AppError::Storage(format!("shop order {shop_order_id} vanished under lock"))
        })?;
        *slot = scratch;

        Ok(outcome)
    }
}
