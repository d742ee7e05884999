use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Online,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShopOrderStatus {
    Pending,
    Preparing,
    OutForDelivery,
    Delivered,
}

impl ShopOrderStatus {
    /// Position in the forward-only lifecycle.
    pub fn rank(self) -> u8 {
        match self {
            ShopOrderStatus::Pending => 0,
            ShopOrderStatus::Preparing => 1,
            ShopOrderStatus::OutForDelivery => 2,
            ShopOrderStatus::Delivered => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ShopOrderStatus::Delivered
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShopOrderStatus::Pending => "pending",
            ShopOrderStatus::Preparing => "preparing",
            ShopOrderStatus::OutForDelivery => "out_for_delivery",
            ShopOrderStatus::Delivered => "delivered",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub text: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl DeliveryAddress {
    pub fn coordinates(&self) -> Option<GeoPoint> {
        let point = GeoPoint {
            lat: self.latitude?,
            lng: self.longitude?,
        };
        point.is_valid().then_some(point)
    }
}

/// Item snapshot taken at order time; catalog edits never rewrite it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub item: Uuid,
    pub name: String,
    pub price: u64,
    pub quantity: u32,
}

impl LineItem {
    /// `None` when price times quantity does not fit in a `u64`.
    pub fn total(&self) -> Option<u64> {
        self.price.checked_mul(u64::from(self.quantity))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopOrder {
    pub id: Uuid,
    pub shop: Uuid,
    pub owner: Uuid,
    pub items: Vec<LineItem>,
    pub subtotal: u64,
    pub status: ShopOrderStatus,
    pub assignment: Option<Uuid>,
    pub assigned_courier: Option<Uuid>,
    #[serde(skip_serializing, default)]
    pub delivery_code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl ShopOrder {
    pub fn new(shop: Uuid, owner: Uuid, items: Vec<LineItem>) -> Result<Self, AppError> {
        let subtotal = items
            .iter()
            .try_fold(0u64, |sum, item| item.total()?.checked_add(sum))
            .ok_or_else(|| AppError::Validation("order total overflows".to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            shop,
            owner,
            items,
            subtotal,
            status: ShopOrderStatus::Pending,
            assignment: None,
            assigned_courier: None,
            delivery_code: None,
            code_expires_at: None,
            delivered_at: None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user: Uuid,
    pub payment_method: PaymentMethod,
    pub delivery_address: DeliveryAddress,
    pub delivery_mobile: Option<String>,
    pub total_amount: u64,
    pub delivery_fee: u64,
    pub shop_orders: Vec<ShopOrder>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn shop_order(&self, shop_order_id: Uuid) -> Option<&ShopOrder> {
        self.shop_orders.iter().find(|so| so.id == shop_order_id)
    }

    pub fn shop_order_mut(&mut self, shop_order_id: Uuid) -> Option<&mut ShopOrder> {
        self.shop_orders.iter_mut().find(|so| so.id == shop_order_id)
    }

    pub fn shop_order_for_shop(&self, shop_id: Uuid) -> Option<&ShopOrder> {
        self.shop_orders.iter().find(|so| so.shop == shop_id)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{DeliveryAddress, LineItem, ShopOrder, ShopOrderStatus};
    use crate::error::AppError;

    #[test]
    fn status_uses_snake_case_on_the_wire() {
        let raw = serde_json::to_string(&ShopOrderStatus::OutForDelivery).unwrap();
        assert_eq!(raw, "\"out_for_delivery\"");

        let rejected = serde_json::from_str::<ShopOrderStatus>("\"out of delivery\"");
        assert!(rejected.is_err());
    }

    #[test]
    fn address_without_longitude_has_no_coordinates() {
        let address = DeliveryAddress {
            text: "12 Market Road".to_string(),
            latitude: Some(12.97),
            longitude: None,
        };
        assert!(address.coordinates().is_none());

        let out_of_range = DeliveryAddress {
            longitude: Some(200.0),
            ..address
        };
        assert!(out_of_range.coordinates().is_none());
    }

    #[test]
    fn subtotal_sums_line_items() {
        let items = vec![
            LineItem {
                item: Uuid::new_v4(),
                name: "Dosa".to_string(),
                price: 12_000,
                quantity: 2,
            },
            LineItem {
                item: Uuid::new_v4(),
                name: "Chai".to_string(),
                price: 2_500,
                quantity: 1,
            },
        ];

        let shop_order = ShopOrder::new(Uuid::new_v4(), Uuid::new_v4(), items).unwrap();
        assert_eq!(shop_order.subtotal, 26_500);
        assert_eq!(shop_order.status, ShopOrderStatus::Pending);
    }

    #[test]
    fn overflowing_subtotal_is_rejected() {
        let line = |price: u64, quantity: u32| LineItem {
            item: Uuid::new_v4(),
            name: "Thali".to_string(),
            price,
            quantity,
        };

        let summed = ShopOrder::new(Uuid::new_v4(), Uuid::new_v4(), vec![line(u64::MAX, 1), line(1, 1)]);
        assert!(matches!(summed, Err(AppError::Validation(_))));

        let multiplied = ShopOrder::new(Uuid::new_v4(), Uuid::new_v4(), vec![line(u64::MAX / 2, 3)]);
        assert!(matches!(multiplied, Err(AppError::Validation(_))));
    }

    #[test]
    fn delivery_code_is_never_serialized() {
        let mut shop_order = ShopOrder::new(Uuid::new_v4(), Uuid::new_v4(), Vec::new()).unwrap();
        shop_order.delivery_code = Some("123456".to_string());

        let json = serde_json::to_value(&shop_order).unwrap();
        assert!(json.get("delivery_code").is_none());
    }
}
