//! services/mod.rs

pub mod channel_store;
pub mod channel_validator;
pub mod credentials;
pub mod permission_policy;
pub mod scheduler;
pub mod telegram_gateway;
