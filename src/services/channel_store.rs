//! services/channel_store.rs
//! Acceso a datos para configuraciones de canal e historial de
//! validaciones. La única mutación de los campos escalares de
//! `channel_configs` pasa por `apply_validation_outcome` (o por la
//! edición manual de permisos); el historial es append-only.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::channel_config::{ChannelConfig, NewChannelConfig};
use crate::models::permissions::BotPermissions;
use crate::models::validation_history::{ValidationHistoryRecord, ValidationType};

/// Resultado terminal de un intento de validación, listo para
/// persistirse como una sola transacción (config + fila de historial).
#[derive(Debug, Clone)]
pub struct ValidationPersist {
    pub permissions: BotPermissions,
    pub is_validated: bool,
    pub validation_error: Option<String>,
    pub validation_type: ValidationType,
    pub validated_at: DateTime<Utc>,
    /// Snapshot registrado en el historial. None cuando el gateway
    /// falló antes de poder leer permisos.
    pub permissions_snapshot: Option<BotPermissions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationStatistics {
    pub total_validations: i64,
    pub successful_validations: i64,
    pub failed_validations: i64,
    pub success_rate: f64,
    pub validation_types: HashMap<String, i64>,
}

#[derive(Clone)]
pub struct ChannelStore {
    db_pool: Pool<Sqlite>,
}

impl ChannelStore {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        ChannelStore { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo al correr migraciones")?;
        Ok(())
    }

    /// Crea la configuración validada y su registro de historial
    /// 'setup' en una sola transacción. El UNIQUE sobre account_id
    /// garantiza un canal por cuenta.
    pub async fn create_config(&self, new: &NewChannelConfig) -> Result<ChannelConfig> {
        let config_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_raw = now.to_rfc3339();

        let mut tx = self
            .db_pool
            .begin()
            .await
            .context("Fallo al abrir transacción para create_config")?;

        sqlx::query(
            r#"
            INSERT INTO channel_configs (
                id, account_id, channel_id, channel_username, channel_title,
                channel_type, channel_member_count,
                can_post_messages, can_edit_messages, can_send_media_messages,
                can_delete_messages, can_pin_messages,
                is_validated, last_validated_at, validation_error,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, ?13, NULL, ?13, ?13)
            "#,
        )
        .bind(&config_id)
        .bind(new.account_id)
        .bind(new.channel_id)
        .bind(&new.channel_username)
        .bind(&new.channel_title)
        .bind(&new.channel_type)
        .bind(new.channel_member_count)
        .bind(new.permissions.can_post_messages)
        .bind(new.permissions.can_edit_messages)
        .bind(new.permissions.can_send_media_messages)
        .bind(new.permissions.can_delete_messages)
        .bind(new.permissions.can_pin_messages)
        .bind(&now_raw)
        .execute(&mut *tx)
        .await
        .context("Fallo al insertar channel_config (¿la cuenta ya tiene canal?)")?;

        insert_history_row(
            &mut tx,
            &config_id,
            ValidationType::Setup,
            true,
            None,
            Some(&new.permissions),
            &now_raw,
        )
        .await?;

        tx.commit()
            .await
            .context("Fallo al confirmar transacción de create_config")?;

        self.get_by_id(&config_id)
            .await?
            .context("La configuración recién creada no se encontró")
    }

    pub async fn get_by_id(&self, config_id: &str) -> Result<Option<ChannelConfig>> {
        let row = sqlx::query("SELECT * FROM channel_configs WHERE id = ?1")
            .bind(config_id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Fallo al consultar channel_config por id")?;

        row.as_ref().map(config_from_row).transpose()
    }

    pub async fn get_by_account_id(&self, account_id: i64) -> Result<Option<ChannelConfig>> {
        let row = sqlx::query("SELECT * FROM channel_configs WHERE account_id = ?1")
            .bind(account_id)
            .fetch_optional(&self.db_pool)
            .await
            .context("Fallo al consultar channel_config por account_id")?;

        row.as_ref().map(config_from_row).transpose()
    }

    pub async fn list_all(&self) -> Result<Vec<ChannelConfig>> {
        let rows = sqlx::query("SELECT * FROM channel_configs ORDER BY account_id ASC")
            .fetch_all(&self.db_pool)
            .await
            .context("Fallo al listar channel_configs")?;

        rows.iter().map(config_from_row).collect()
    }

    /// Canales cuya última validación es vieja o inexistente. Un
    /// last_validated_at NULL significa "nunca validado" y entra
    /// siempre en la selección.
    pub async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<ChannelConfig>> {
        let cutoff_raw = cutoff.to_rfc3339();
        let rows = sqlx::query(
            r#"
            SELECT * FROM channel_configs
            WHERE last_validated_at IS NULL OR last_validated_at < ?1
            ORDER BY account_id ASC
            "#,
        )
        .bind(&cutoff_raw)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al seleccionar canales pendientes de validación")?;

        rows.iter().map(config_from_row).collect()
    }

    pub async fn delete_by_account_id(&self, account_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM channel_configs WHERE account_id = ?1")
            .bind(account_id)
            .execute(&self.db_pool)
            .await
            .context("Fallo al borrar channel_config")?;

        Ok(result.rows_affected() > 0)
    }

    /// Persiste el resultado terminal de una validación: actualiza el
    /// snapshot de permisos, el estado y el timestamp, y agrega la fila
    /// de historial. Todo o nada: si el commit falla, la validación se
    /// considera no ocurrida y el caller puede reintentar completa.
    pub async fn apply_validation_outcome(
        &self,
        config_id: &str,
        persist: &ValidationPersist,
    ) -> Result<()> {
        let validated_at_raw = persist.validated_at.to_rfc3339();

        let mut tx = self
            .db_pool
            .begin()
            .await
            .context("Fallo al abrir transacción para el resultado de validación")?;

        sqlx::query(
            r#"
            UPDATE channel_configs
            SET can_post_messages = ?2,
                can_edit_messages = ?3,
                can_send_media_messages = ?4,
                can_delete_messages = ?5,
                can_pin_messages = ?6,
                is_validated = ?7,
                last_validated_at = ?8,
                validation_error = ?9,
                updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(config_id)
        .bind(persist.permissions.can_post_messages)
        .bind(persist.permissions.can_edit_messages)
        .bind(persist.permissions.can_send_media_messages)
        .bind(persist.permissions.can_delete_messages)
        .bind(persist.permissions.can_pin_messages)
        .bind(persist.is_validated)
        .bind(&validated_at_raw)
        .bind(persist.validation_error.as_deref())
        .execute(&mut *tx)
        .await
        .context("Fallo al actualizar channel_config con el resultado")?;

        insert_history_row(
            &mut tx,
            config_id,
            persist.validation_type,
            persist.is_validated && persist.validation_error.is_none(),
            persist.validation_error.as_deref(),
            persist.permissions_snapshot.as_ref(),
            &validated_at_raw,
        )
        .await?;

        tx.commit()
            .await
            .context("Fallo al confirmar el resultado de validación")?;

        Ok(())
    }

    /// Refresco descriptivo (título y cantidad de miembros); best-effort,
    /// no toca el estado de validación.
    pub async fn update_channel_profile(
        &self,
        config_id: &str,
        channel_title: &str,
        member_count: i64,
    ) -> Result<()> {
        let now_raw = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE channel_configs
            SET channel_title = ?2, channel_member_count = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(config_id)
        .bind(channel_title)
        .bind(member_count)
        .bind(&now_raw)
        .execute(&self.db_pool)
        .await
        .context("Fallo al refrescar metadata del canal")?;

        Ok(())
    }

    /// Edición manual de permisos (camino de update-acceptance).
    pub async fn set_permissions(
        &self,
        config_id: &str,
        permissions: &BotPermissions,
    ) -> Result<()> {
        let now_raw = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE channel_configs
            SET can_post_messages = ?2,
                can_edit_messages = ?3,
                can_send_media_messages = ?4,
                can_delete_messages = ?5,
                can_pin_messages = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(config_id)
        .bind(permissions.can_post_messages)
        .bind(permissions.can_edit_messages)
        .bind(permissions.can_send_media_messages)
        .bind(permissions.can_delete_messages)
        .bind(permissions.can_pin_messages)
        .bind(&now_raw)
        .execute(&self.db_pool)
        .await
        .context("Fallo al actualizar permisos manualmente")?;

        Ok(())
    }

    pub async fn list_history(
        &self,
        config_id: &str,
        limit: i64,
    ) -> Result<Vec<ValidationHistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM validation_history
            WHERE channel_config_id = ?1
            ORDER BY validated_at DESC
            LIMIT ?2
            "#,
        )
        .bind(config_id)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al listar historial de validaciones")?;

        rows.iter().map(history_from_row).collect()
    }

    /// Borra en bloque el historial anterior al corte de retención.
    pub async fn prune_history(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff_raw = cutoff.to_rfc3339();
        let result = sqlx::query("DELETE FROM validation_history WHERE validated_at < ?1")
            .bind(&cutoff_raw)
            .execute(&self.db_pool)
            .await
            .context("Fallo al limpiar historial viejo")?;

        Ok(result.rows_affected())
    }

    /// Estadísticas agregadas del historial desde `since`.
    pub async fn validation_statistics(&self, since: DateTime<Utc>) -> Result<ValidationStatistics> {
        let since_raw = since.to_rfc3339();

        let rows = sqlx::query(
            r#"
            SELECT validation_type, validation_result, COUNT(*) as cnt
            FROM validation_history
            WHERE validated_at >= ?1
            GROUP BY validation_type, validation_result
            "#,
        )
        .bind(&since_raw)
        .fetch_all(&self.db_pool)
        .await
        .context("Fallo al calcular estadísticas de validación")?;

        let mut stats = ValidationStatistics {
            total_validations: 0,
            successful_validations: 0,
            failed_validations: 0,
            success_rate: 0.0,
            validation_types: HashMap::new(),
        };

        for row in &rows {
            let validation_type: String = row.try_get("validation_type")?;
            let result: bool = row.try_get("validation_result")?;
            let count: i64 = row.try_get("cnt")?;

            stats.total_validations += count;
            if result {
                stats.successful_validations += count;
            } else {
                stats.failed_validations += count;
            }
            *stats.validation_types.entry(validation_type).or_insert(0) += count;
        }

        if stats.total_validations > 0 {
            stats.success_rate =
                (stats.successful_validations as f64 / stats.total_validations as f64) * 100.0;
        }

        Ok(stats)
    }
}

async fn insert_history_row(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    config_id: &str,
    validation_type: ValidationType,
    result: bool,
    error_message: Option<&str>,
    snapshot: Option<&BotPermissions>,
    validated_at_raw: &str,
) -> Result<()> {
    let record_id = Uuid::new_v4().to_string();
    let snapshot_json = snapshot
        .map(serde_json::to_string)
        .transpose()
        .context("Fallo al serializar snapshot de permisos")?;

    sqlx::query(
        r#"
        INSERT INTO validation_history (
            id, channel_config_id, validation_type, validation_result,
            error_message, permissions_snapshot, validated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&record_id)
    .bind(config_id)
    .bind(validation_type.as_str())
    .bind(result)
    .bind(error_message)
    .bind(snapshot_json)
    .bind(validated_at_raw)
    .execute(&mut **tx)
    .await
    .context("Fallo al insertar registro de historial")?;

    Ok(())
}

fn config_from_row(row: &SqliteRow) -> Result<ChannelConfig> {
    let last_validated_at: Option<String> = row.try_get("last_validated_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ChannelConfig {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        channel_id: row.try_get("channel_id")?,
        channel_username: row.try_get("channel_username")?,
        channel_title: row.try_get("channel_title")?,
        channel_type: row.try_get("channel_type")?,
        channel_member_count: row.try_get("channel_member_count")?,
        permissions: BotPermissions {
            can_post_messages: row.try_get("can_post_messages")?,
            can_edit_messages: row.try_get("can_edit_messages")?,
            can_send_media_messages: row.try_get("can_send_media_messages")?,
            can_delete_messages: row.try_get("can_delete_messages")?,
            can_pin_messages: row.try_get("can_pin_messages")?,
        },
        is_validated: row.try_get("is_validated")?,
        last_validated_at: last_validated_at
            .map(|raw| raw.parse().context("last_validated_at inválido"))
            .transpose()?,
        validation_error: row.try_get("validation_error")?,
        created_at: created_at.parse().context("created_at inválido")?,
        updated_at: updated_at.parse().context("updated_at inválido")?,
    })
}

fn history_from_row(row: &SqliteRow) -> Result<ValidationHistoryRecord> {
    let snapshot_json: Option<String> = row.try_get("permissions_snapshot")?;
    let validated_at: String = row.try_get("validated_at")?;

    Ok(ValidationHistoryRecord {
        id: row.try_get("id")?,
        channel_config_id: row.try_get("channel_config_id")?,
        validation_type: row.try_get("validation_type")?,
        validation_result: row.try_get("validation_result")?,
        error_message: row.try_get("error_message")?,
        permissions_snapshot: snapshot_json
            .map(|raw| serde_json::from_str(&raw).context("permissions_snapshot inválido"))
            .transpose()?,
        validated_at: validated_at.parse().context("validated_at inválido")?,
    })
}
