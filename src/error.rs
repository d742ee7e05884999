use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no couriers available near the delivery address")]
    NoAvailableCouriers,

    #[error("courier {0} already holds an active delivery")]
    CourierBusy(String),

    #[error("assignment {0} is no longer open for acceptance")]
    AssignmentExpired(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("delivery code does not match")]
    InvalidCode,

    #[error("delivery code has expired")]
    CodeExpired,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::NoAvailableCouriers => "no_available_courier",
            AppError::CourierBusy(_) => "courier_busy",
            AppError::AssignmentExpired(_) => "assignment_expired",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::InvalidCode => "invalid_code",
            AppError::CodeExpired => "code_expired",
            AppError::Storage(_) => "storage_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidCode => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CourierBusy(_)
            | AppError::AssignmentExpired(_)
            | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::CodeExpired => StatusCode::GONE,
            AppError::NoAvailableCouriers => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail stays in the logs.
        let message = match &self {
            AppError::Storage(detail) | AppError::Internal(detail) => {
                tracing::error!(error = %detail, code = self.code(), "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}
