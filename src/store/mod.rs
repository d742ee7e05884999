mod assignments;
mod orders;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::DeliveryAssignment;
use crate::models::order::Order;
use crate::models::shop::Shop;
use crate::models::user::{GeoPoint, Role, User};

pub use assignments::Transition;

#[derive(Default)]
pub struct Store {
    users: DashMap<Uuid, User>,
    /// lowercased email -> user id.
    emails: DashMap<String, Uuid>,
    shops: DashMap<Uuid, Shop>,
    orders: DashMap<Uuid, Order>,
    assignments: DashMap<Uuid, DeliveryAssignment>,
    /// courier id -> the one assignment that courier currently holds.
    active_by_courier: DashMap<Uuid, Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreCounts {
    pub users: usize,
    pub shops: usize,
    pub orders: usize,
    pub assignments: usize,
    pub active_deliveries: usize,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            users: self.users.len(),
            shops: self.shops.len(),
            orders: self.orders.len(),
            assignments: self.assignments.len(),
            active_deliveries: self.active_by_courier.len(),
        }
    }

    pub fn insert_user(&self, user: User) -> Result<User, AppError> {
        match self.emails.entry(user.email.to_lowercase()) {
            Entry::Occupied(_) => Err(AppError::Validation(format!(
                "email {} is already registered",
                user.email
            ))),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
                self.users.insert(user.id, user.clone());
                Ok(user)
            }
        }
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    pub fn users_with_role(&self, role: Role) -> Vec<User> {
        self.users
            .iter()
            .filter(|entry| entry.value().role == role)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn update_user_location(&self, id: Uuid, location: GeoPoint) -> Result<User, AppError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

        user.location = Some(location);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    pub fn insert_shop(&self, shop: Shop) -> Shop {
        self.shops.insert(shop.id, shop.clone());
        shop
    }

    pub fn shop(&self, id: Uuid) -> Option<Shop> {
        self.shops.get(&id).map(|entry| entry.value().clone())
    }
}
