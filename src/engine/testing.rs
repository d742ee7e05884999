use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::mail::MemoryMailer;
use crate::models::order::{DeliveryAddress, LineItem, Order, PaymentMethod, ShopOrder};
use crate::models::shop::Shop;
use crate::models::user::{GeoPoint, Role, User};
use crate::state::AppState;

pub const DELIVERY: (f64, f64) = (12.9716, 77.5946);
pub const NEAR_SHOP: (f64, f64) = (12.9720, 77.5950);
pub const FAR_AWAY: (f64, f64) = (13.3000, 77.9000);

pub struct Fixture {
    pub state: AppState,
    pub mailer: Arc<MemoryMailer>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let mailer = Arc::new(MemoryMailer::new());
        let state = AppState::in_memory(config, mailer.clone());
        Self { state, mailer }
    }

    pub fn user(&self, role: Role, location: Option<(f64, f64)>) -> User {
        let id = Uuid::new_v4();
        let user = User {
            id,
            fullname: format!("{role:?} {}", &id.to_string()[..8]),
            email: format!("{id}@example.com"),
            mobile: Some("9800000000".to_string()),
            role,
            location: location.map(|(lat, lng)| GeoPoint { lat, lng }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state
            .store
            .insert_user(user)
            .expect("fixture emails are unique")
    }

    pub fn courier(&self, at: (f64, f64)) -> User {
        self.user(Role::Courier, Some(at))
    }

    pub fn shop(&self) -> Shop {
        let owner = self.user(Role::Owner, None);
        self.state.store.insert_shop(Shop {
            id: Uuid::new_v4(),
            name: "Dosa Corner".to_string(),
            owner: owner.id,
            address: None,
            created_at: Utc::now(),
        })
    }

    /// Places an order spanning `shops` new shops, straight into the store.
    pub fn order_with_shops(&self, shops: usize) -> Order {
        let customer = self.user(Role::User, None);
        let shop_orders = (0..shops)
            .map(|_| {
                let shop = self.shop();
                ShopOrder::new(
                    shop.id,
                    shop.owner,
                    vec![LineItem {
                        item: Uuid::new_v4(),
                        name: "Masala Dosa".to_string(),
                        price: 9_000,
                        quantity: 1,
                    }],
                )
                .expect("fixture subtotal fits")
            })
            .collect::<Vec<_>>();

        self.state.store.insert_order(Order {
            id: Uuid::new_v4(),
            user: customer.id,
            payment_method: PaymentMethod::Cod,
            delivery_address: DeliveryAddress {
                text: "1 Residency Road".to_string(),
                latitude: Some(DELIVERY.0),
                longitude: Some(DELIVERY.1),
            },
            delivery_mobile: None,
            total_amount: 9_000 * shops as u64,
            delivery_fee: 0,
            shop_orders,
            created_at: Utc::now(),
        })
    }

    pub fn single_shop_order(&self) -> (Order, ShopOrder) {
        let order = self.order_with_shops(1);
        let shop_order = order.shop_orders[0].clone();
        (order, shop_order)
    }
}
