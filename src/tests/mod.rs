//! tests/mod.rs
//! Helpers compartidos: base SQLite en memoria y fixtures.

mod channel_store_tests;
mod channel_validator_tests;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::models::channel_config::NewChannelConfig;
use crate::models::permissions::{BotPermissions, Permission};
use crate::services::channel_store::ChannelStore;

/// Permisos requeridos usados en toda la suite.
pub fn required() -> Vec<Permission> {
    vec![Permission::CanPostMessages, Permission::CanEditMessages]
}

pub fn full_permissions() -> BotPermissions {
    BotPermissions {
        can_post_messages: true,
        can_edit_messages: true,
        can_send_media_messages: true,
        can_delete_messages: true,
        can_pin_messages: true,
    }
}

/// Pool en memoria con una sola conexión, para que todas las queries
/// vean la misma base.
pub async fn memory_pool() -> Pool<Sqlite> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("No se pudo abrir SQLite en memoria")
}

pub async fn memory_store() -> (ChannelStore, Pool<Sqlite>) {
    let pool = memory_pool().await;
    let store = ChannelStore::new(pool.clone());
    store
        .run_migrations()
        .await
        .expect("Fallo en migraciones de test");
    (store, pool)
}

pub fn sample_channel(account_id: i64) -> NewChannelConfig {
    NewChannelConfig {
        account_id,
        channel_id: 1000 + account_id,
        channel_username: format!("canal_{}", account_id),
        channel_title: format!("Canal {}", account_id),
        channel_type: "channel".to_string(),
        channel_member_count: 42,
        permissions: full_permissions(),
    }
}
