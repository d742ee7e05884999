use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AppError;
use crate::geo::haversine_meters;
use crate::models::user::{GeoPoint, Role, User};
use crate::store::Store;

#[async_trait]
pub trait ProximityIndex: Send + Sync {
    /// Nearest first, at most `limit`.
    async fn nearby(
        &self,
        origin: GeoPoint,
        max_distance_meters: f64,
        limit: usize,
        role: Role,
    ) -> Result<Vec<User>, AppError>;
}

/// Linear scan over the store's users.
pub struct StoreProximityIndex {
    store: Arc<Store>,
}

impl StoreProximityIndex {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProximityIndex for StoreProximityIndex {
    async fn nearby(
        &self,
        origin: GeoPoint,
        max_distance_meters: f64,
        limit: usize,
        role: Role,
    ) -> Result<Vec<User>, AppError> {
        let mut within: Vec<(f64, User)> = self
            .store
            .users_with_role(role)
            .into_iter()
            .filter_map(|user| {
                let location = user.location?;
                let distance = haversine_meters(&origin, &location);
                (distance <= max_distance_meters).then_some((distance, user))
            })
            .collect();

        within.sort_by(|a, b| a.0.total_cmp(&b.0));
        within.truncate(limit);

        Ok(within.into_iter().map(|(_, user)| user).collect())
    }
}
