//! tests/channel_store_tests.rs

use chrono::{Duration, Utc};

use crate::models::permissions::BotPermissions;
use crate::models::validation_history::ValidationType;
use crate::services::channel_store::ValidationPersist;
use crate::tests::{full_permissions, memory_store, sample_channel};

#[actix_rt::test]
async fn create_and_fetch_roundtrip() {
    let (store, _pool) = memory_store().await;

    let created = store.create_config(&sample_channel(1)).await.unwrap();
    assert!(created.is_validated);
    assert!(created.last_validated_at.is_some());
    assert!(created.validation_error.is_none());
    assert_eq!(created.channel_id, Some(1001));

    let fetched = store.get_by_account_id(1).await.unwrap().unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.permissions, full_permissions());

    assert!(store.get_by_account_id(999).await.unwrap().is_none());
}

#[actix_rt::test]
async fn create_writes_setup_history_row() {
    let (store, _pool) = memory_store().await;
    let config = store.create_config(&sample_channel(1)).await.unwrap();

    let history = store.list_history(&config.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].validation_type, ValidationType::Setup.as_str());
    assert!(history[0].validation_result);
    assert_eq!(history[0].permissions_snapshot, Some(full_permissions()));
}

#[actix_rt::test]
async fn duplicate_account_is_rejected() {
    let (store, _pool) = memory_store().await;
    store.create_config(&sample_channel(1)).await.unwrap();

    let result = store.create_config(&sample_channel(1)).await;
    assert!(result.is_err());

    // El rechazo no deja historial huérfano
    let config = store.get_by_account_id(1).await.unwrap().unwrap();
    let history = store.list_history(&config.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[actix_rt::test]
async fn validation_outcome_commits_config_and_history_together() {
    let (store, _pool) = memory_store().await;
    let config = store.create_config(&sample_channel(1)).await.unwrap();

    let mut degraded = full_permissions();
    degraded.can_post_messages = false;
    let persist = ValidationPersist {
        permissions: degraded,
        is_validated: false,
        validation_error: Some("Missing required permissions: can_post_messages".to_string()),
        validation_type: ValidationType::Periodic,
        validated_at: Utc::now(),
        permissions_snapshot: Some(degraded),
    };

    store.apply_validation_outcome(&config.id, &persist).await.unwrap();

    let updated = store.get_by_account_id(1).await.unwrap().unwrap();
    assert!(!updated.is_validated);
    assert!(!updated.permissions.can_post_messages);
    assert_eq!(
        updated.validation_error.as_deref(),
        Some("Missing required permissions: can_post_messages")
    );
    assert!(updated.last_validated_at.unwrap() >= config.last_validated_at.unwrap());

    // setup + periodic
    let history = store.list_history(&config.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].validation_type, ValidationType::Periodic.as_str());
    assert!(!history[0].validation_result);
}

#[actix_rt::test]
async fn failure_without_snapshot_keeps_history_snapshot_null() {
    let (store, _pool) = memory_store().await;
    let config = store.create_config(&sample_channel(1)).await.unwrap();

    let persist = ValidationPersist {
        permissions: config.permissions,
        is_validated: false,
        validation_error: Some("Telegram API request timeout".to_string()),
        validation_type: ValidationType::Periodic,
        validated_at: Utc::now(),
        permissions_snapshot: None,
    };
    store.apply_validation_outcome(&config.id, &persist).await.unwrap();

    let updated = store.get_by_account_id(1).await.unwrap().unwrap();
    // El snapshot almacenado se preserva tal cual
    assert_eq!(updated.permissions, full_permissions());

    let history = store.list_history(&config.id, 1).await.unwrap();
    assert!(history[0].permissions_snapshot.is_none());
}

#[actix_rt::test]
async fn list_stale_selects_old_and_never_validated() {
    let (store, pool) = memory_store().await;
    let old = store.create_config(&sample_channel(1)).await.unwrap();
    let never = store.create_config(&sample_channel(2)).await.unwrap();
    store.create_config(&sample_channel(3)).await.unwrap();

    let two_hours_ago = (Utc::now() - Duration::hours(2)).to_rfc3339();
    sqlx::query("UPDATE channel_configs SET last_validated_at = ?1 WHERE id = ?2")
        .bind(&two_hours_ago)
        .bind(&old.id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE channel_configs SET last_validated_at = NULL WHERE id = ?1")
        .bind(&never.id)
        .execute(&pool)
        .await
        .unwrap();

    let cutoff = Utc::now() - Duration::hours(1);
    let stale = store.list_stale(cutoff).await.unwrap();
    let accounts: Vec<i64> = stale.iter().map(|c| c.account_id).collect();
    assert_eq!(accounts, vec![1, 2]);
}

#[actix_rt::test]
async fn set_permissions_updates_flags_only() {
    let (store, _pool) = memory_store().await;
    let config = store.create_config(&sample_channel(1)).await.unwrap();

    let mut proposed = full_permissions();
    proposed.can_pin_messages = false;
    store.set_permissions(&config.id, &proposed).await.unwrap();

    let updated = store.get_by_account_id(1).await.unwrap().unwrap();
    assert!(!updated.permissions.can_pin_messages);
    // La edición manual no toca el estado de validación ni agrega historial
    assert!(updated.is_validated);
    let history = store.list_history(&config.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[actix_rt::test]
async fn delete_by_account_id_reports_effect() {
    let (store, _pool) = memory_store().await;
    store.create_config(&sample_channel(1)).await.unwrap();

    assert!(store.delete_by_account_id(1).await.unwrap());
    assert!(!store.delete_by_account_id(1).await.unwrap());
    assert!(store.get_by_account_id(1).await.unwrap().is_none());
}

#[actix_rt::test]
async fn prune_history_respects_retention_cutoff() {
    let (store, pool) = memory_store().await;
    let config = store.create_config(&sample_channel(1)).await.unwrap();

    // Envejecer el registro de setup a 31 días
    let old = (Utc::now() - Duration::days(31)).to_rfc3339();
    sqlx::query("UPDATE validation_history SET validated_at = ?1 WHERE channel_config_id = ?2")
        .bind(&old)
        .bind(&config.id)
        .execute(&pool)
        .await
        .unwrap();

    // Un registro reciente que debe sobrevivir
    let persist = ValidationPersist {
        permissions: config.permissions,
        is_validated: true,
        validation_error: None,
        validation_type: ValidationType::Periodic,
        validated_at: Utc::now() - Duration::days(29),
        permissions_snapshot: Some(config.permissions),
    };
    store.apply_validation_outcome(&config.id, &persist).await.unwrap();

    let removed = store
        .prune_history(Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let history = store.list_history(&config.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].validation_type, ValidationType::Periodic.as_str());
}

#[actix_rt::test]
async fn statistics_aggregate_by_result_and_type() {
    let (store, _pool) = memory_store().await;
    let config = store.create_config(&sample_channel(1)).await.unwrap();

    let failed = ValidationPersist {
        permissions: BotPermissions::default(),
        is_validated: false,
        validation_error: Some("Bot is no longer an administrator in the channel".to_string()),
        validation_type: ValidationType::Periodic,
        validated_at: Utc::now(),
        permissions_snapshot: Some(BotPermissions::default()),
    };
    store.apply_validation_outcome(&config.id, &failed).await.unwrap();

    let ok = ValidationPersist {
        permissions: full_permissions(),
        is_validated: true,
        validation_error: None,
        validation_type: ValidationType::PermissionCheck,
        validated_at: Utc::now(),
        permissions_snapshot: Some(full_permissions()),
    };
    store.apply_validation_outcome(&config.id, &ok).await.unwrap();

    let stats = store
        .validation_statistics(Utc::now() - Duration::days(1))
        .await
        .unwrap();

    // setup + periodic + permission_check
    assert_eq!(stats.total_validations, 3);
    assert_eq!(stats.successful_validations, 2);
    assert_eq!(stats.failed_validations, 1);
    assert!((stats.success_rate - 66.66).abs() < 1.0);
    assert_eq!(stats.validation_types.get("setup"), Some(&1));
    assert_eq!(stats.validation_types.get("periodic"), Some(&1));
    assert_eq!(stats.validation_types.get("permission_check"), Some(&1));
}
