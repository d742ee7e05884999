use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::extract::Caller;
use crate::error::AppError;
use crate::models::shop::Shop;
use crate::models::user::{GeoPoint, Role, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:id", get(get_user))
        .route("/users/:id/location", patch(update_user_location))
        .route("/shops", post(create_shop))
        .route("/shops/:id", get(get_shop))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub fullname: String,
    pub email: String,
    #[serde(default)]
    pub mobile: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct CreateShopRequest {
    pub name: String,
    pub owner: Uuid,
    #[serde(default)]
    pub address: Option<String>,
}

fn check_location(location: &GeoPoint) -> Result<(), AppError> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(AppError::Validation(
            "location must be a valid latitude/longitude".to_string(),
        ))
    }
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.fullname.trim().is_empty() {
        return Err(AppError::Validation("fullname cannot be empty".to_string()));
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation("email is not valid".to_string()));
    }
    if let Some(location) = &payload.location {
        check_location(location)?;
    }

    let now = Utc::now();
    let user = state.store.insert_user(User {
        id: Uuid::new_v4(),
        fullname: payload.fullname.trim().to_string(),
        email: payload.email.trim().to_string(),
        mobile: payload.mobile,
        role: payload.role,
        location: payload.location,
        created_at: now,
        updated_at: now,
    })?;

    Ok(Json(user))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    state
        .store
        .user(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
}

async fn update_user_location(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<User>, AppError> {
    if caller != id {
        return Err(AppError::Forbidden(
            "users can only move themselves".to_string(),
        ));
    }
    check_location(&payload.location)?;

    let user = state.store.update_user_location(id, payload.location)?;
    Ok(Json(user))
}

async fn create_shop(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateShopRequest>,
) -> Result<Json<Shop>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    let owner = state
        .store
        .user(payload.owner)
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", payload.owner)))?;
    if owner.role != Role::Owner {
        return Err(AppError::Validation(format!(
            "user {} is not a shop owner",
            owner.id
        )));
    }

    let shop = state.store.insert_shop(Shop {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        owner: owner.id,
        address: payload.address,
        created_at: Utc::now(),
    });

    Ok(Json(shop))
}

async fn get_shop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Shop>, AppError> {
    state
        .store
        .shop(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("shop {id} not found")))
}
