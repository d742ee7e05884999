pub mod assignment;
pub mod order;
pub mod shop;
pub mod user;
