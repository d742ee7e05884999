use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Owner,
    #[serde(rename = "deliveryboy")]
    Courier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub mobile: Option<String>,
    pub role: Role,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the shop owner sees about a courier while a broadcast is open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateCourier {
    pub id: Uuid,
    pub fullname: String,
    pub mobile: Option<String>,
    pub location: Option<GeoPoint>,
}

impl From<&User> for CandidateCourier {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname.clone(),
            mobile: user.mobile.clone(),
            location: user.location,
        }
    }
}

/// Contact details embedded in delivery views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub mobile: Option<String>,
}

impl From<&User> for Contact {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname.clone(),
            email: user.email.clone(),
            mobile: user.mobile.clone(),
        }
    }
}
