pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod mail;
pub mod models;
pub mod observability;
pub mod realtime;
pub mod state;
pub mod store;
