use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const CALLER_HEADER: &str = "x-user-id";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Authenticated user id, stamped on the request by the upstream auth layer.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {CALLER_HEADER} header")))?;

        raw.to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .map(Caller)
            .ok_or_else(|| AppError::Unauthorized(format!("malformed {CALLER_HEADER} header")))
    }
}

/// Proof the request carries the configured admin token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_token.as_deref() else {
            return Err(AppError::Forbidden(
                "administrative overrides are disabled".to_string(),
            ));
        };

        let supplied = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {ADMIN_TOKEN_HEADER} header")))?;

        if supplied != expected {
            return Err(AppError::Forbidden("admin token rejected".to_string()));
        }
        Ok(AdminAccess)
    }
}
