//! handlers/mod.rs

pub mod channel_handler;
pub mod health_handler;
pub mod scheduler_handler;
