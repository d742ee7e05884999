use std::env;
use std::str::FromStr;

use crate::error::AppError;

const MAX_DELIVERY_CODE_TTL_SECS: i64 = 86_400;

/// Which broadcasts are expired when a courier accepts one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusivityScope {
    /// Only other broadcasts for the same shop order.
    ShopOrder,
    /// Every other open broadcast of the parent order; one courier serves all shops.
    Order,
}

impl FromStr for ExclusivityScope {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "shop_order" => Ok(ExclusivityScope::ShopOrder),
            "order" => Ok(ExclusivityScope::Order),
            other => Err(format!("expected shop_order or order, got {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected compact or json, got {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub search_radius_meters: f64,
    pub candidate_limit: usize,
    pub delivery_code_ttl_secs: i64,
    pub exclusivity_scope: ExclusivityScope,
    pub free_delivery_threshold: u64,
    pub delivery_fee: u64,
    pub allowed_origins: Vec<String>,
    /// Shared secret for the administrative override routes; unset disables them.
    pub admin_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            search_radius_meters: 5_000.0,
            candidate_limit: 20,
            delivery_code_ttl_secs: 300,
            exclusivity_scope: ExclusivityScope::ShopOrder,
            free_delivery_threshold: 50_000,
            delivery_fee: 5_000,
            allowed_origins: Vec::new(),
            admin_token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_or_default("LOG_FORMAT", defaults.log_format)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            search_radius_meters: parse_or_default(
                "COURIER_SEARCH_RADIUS_METERS",
                defaults.search_radius_meters,
            )?,
            candidate_limit: parse_or_default("BROADCAST_CANDIDATE_LIMIT", defaults.candidate_limit)?,
            delivery_code_ttl_secs: parse_or_default(
                "DELIVERY_CODE_TTL_SECS",
                defaults.delivery_code_ttl_secs,
            )?,
            exclusivity_scope: parse_or_default("EXCLUSIVITY_SCOPE", defaults.exclusivity_scope)?,
            free_delivery_threshold: parse_or_default(
                "FREE_DELIVERY_THRESHOLD",
                defaults.free_delivery_threshold,
            )?,
            delivery_fee: parse_or_default("DELIVERY_FEE", defaults.delivery_fee)?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|raw| split_origins(&raw))
                .unwrap_or_default(),
            admin_token: env::var("ADMIN_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !(self.search_radius_meters.is_finite() && self.search_radius_meters > 0.0) {
            return Err(AppError::Internal(
                "COURIER_SEARCH_RADIUS_METERS must be a positive number".to_string(),
            ));
        }
        if self.candidate_limit == 0 {
            return Err(AppError::Internal(
                "BROADCAST_CANDIDATE_LIMIT must be > 0".to_string(),
            ));
        }
        if !(0..=MAX_DELIVERY_CODE_TTL_SECS).contains(&self.delivery_code_ttl_secs) {
            return Err(AppError::Internal(format!(
                "DELIVERY_CODE_TTL_SECS must be between 0 and {MAX_DELIVERY_CODE_TTL_SECS}"
            )));
        }
        Ok(())
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
