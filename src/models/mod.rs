//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod channel_config;
pub mod permissions;
pub mod validation_history;
