//! services/channel_validator.rs
//! Orquesta una pasada de validación: consulta el gateway, evalúa la
//! política de permisos y persiste el resultado terminal. Cada intento
//! termina en exactamente un registro de historial, sin estados
//! intermedios visibles.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::models::channel_config::{ChannelConfig, NewChannelConfig, SetupChannelRequest};
use crate::models::permissions::{BotPermissions, Permission};
use crate::models::validation_history::ValidationType;
use crate::services::channel_store::{ChannelStore, ValidationPersist};
use crate::services::credentials::BotCredentials;
use crate::services::permission_policy::{self, PermissionDiff, UpdateValidation};
use crate::services::telegram_gateway::{GatewayError, TelegramGateway};

/// Resultado terminal de una validación, ya persistido.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub error: Option<String>,
    pub permissions_changed: bool,
    pub current_permissions: BotPermissions,
    pub missing_permissions: Vec<Permission>,
    pub diff: PermissionDiff,
}

/// Fallas del alta de canal. El alta no persiste nada salvo en éxito,
/// así que cada variante mapea directo a una respuesta HTTP.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Account already has a configured channel")]
    AlreadyConfigured,

    #[error("Bot is not an administrator in the channel")]
    NotAdministrator,

    #[error("{}", permission_policy::missing_message(.0))]
    MissingPermissions(Vec<Permission>),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct ChannelValidator {
    gateway: TelegramGateway,
    store: ChannelStore,
    required_permissions: Vec<Permission>,
}

impl ChannelValidator {
    pub fn new(
        gateway: TelegramGateway,
        store: ChannelStore,
        required_permissions: Vec<Permission>,
    ) -> Self {
        ChannelValidator {
            gateway,
            store,
            required_permissions,
        }
    }

    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    pub fn required_permissions(&self) -> &[Permission] {
        &self.required_permissions
    }

    /// Alta de canal: resuelve el chat por username, exige que el bot
    /// sea administrador con los permisos mínimos, y recién entonces
    /// crea la configuración (ya validada) con su registro de setup.
    pub async fn setup(
        &self,
        request: &SetupChannelRequest,
        credentials: &BotCredentials,
    ) -> Result<ChannelConfig, SetupError> {
        let existing = self
            .store
            .get_by_account_id(request.account_id)
            .await
            .context("Fallo al verificar configuración existente")?;
        if existing.is_some() {
            return Err(SetupError::AlreadyConfigured);
        }

        let channel = self
            .gateway
            .get_channel_info(&credentials.bot_token, &request.channel_username)
            .await?;

        let member = self
            .gateway
            .get_member_status(&credentials.bot_token, channel.id, credentials.bot_id)
            .await?;

        if member.status != "administrator" {
            return Err(SetupError::NotAdministrator);
        }

        let check = permission_policy::check_required(&member.permissions, &self.required_permissions);
        if !check.compliant {
            return Err(SetupError::MissingPermissions(check.missing));
        }

        let new = NewChannelConfig {
            account_id: request.account_id,
            channel_id: channel.id,
            channel_username: request.channel_username.trim_start_matches('@').to_string(),
            channel_title: channel.title.unwrap_or_default(),
            channel_type: channel.chat_type.unwrap_or_else(|| "channel".to_string()),
            channel_member_count: channel.members_count,
            permissions: member.permissions,
        };

        let config = self
            .store
            .create_config(&new)
            .await
            .context("Fallo al crear la configuración del canal")?;

        log::info!(
            "(setup) Canal @{} configurado para la cuenta {}",
            config.channel_username,
            config.account_id
        );

        Ok(config)
    }

    /// Una pasada de validación contra Telegram. Siempre termina en un
    /// commit: éxito, falla de permisos, o falla de gateway (esta última
    /// preserva el último snapshot bueno en lugar de pisarlo con ceros).
    pub async fn validate(
        &self,
        config: &ChannelConfig,
        credentials: &BotCredentials,
        validation_type: ValidationType,
    ) -> Result<ValidationOutcome> {
        let channel_id = match config.channel_id {
            Some(channel_id) => channel_id,
            None => {
                // Config sin chat vinculado: no hay nada que consultar
                return self
                    .record_failure(
                        config,
                        "Channel is not linked to a Telegram chat".to_string(),
                        validation_type,
                    )
                    .await;
            }
        };

        let member = match self
            .gateway
            .get_member_status(&credentials.bot_token, channel_id, credentials.bot_id)
            .await
        {
            Ok(member) => member,
            Err(gateway_error) => {
                log::warn!(
                    "(validate) Gateway falló para la cuenta {}: {}",
                    config.account_id,
                    gateway_error
                );
                return self
                    .record_failure(config, gateway_error.to_string(), validation_type)
                    .await;
            }
        };

        // Telegram omite los flags can_* para no-administradores, así que
        // un bot degradado no trae un snapshot utilizable: se conserva el
        // último snapshot guardado, igual que ante una falla de gateway
        if member.status != "administrator" {
            return self
                .record_failure(
                    config,
                    "Bot is no longer an administrator in the channel".to_string(),
                    validation_type,
                )
                .await;
        }

        let current = member.permissions;
        let comparison =
            permission_policy::diff(&config.permissions, &current, &self.required_permissions);

        if !comparison.lost_required.is_empty() {
            log::warn!(
                "(validate) Cuenta {} perdió permisos críticos: {}",
                config.account_id,
                permission_policy::join_permissions(&comparison.lost_required)
            );
        }

        let check = permission_policy::check_required(&current, &self.required_permissions);
        let (is_validated, validation_error) = if check.compliant {
            (true, None)
        } else {
            (false, Some(permission_policy::missing_message(&check.missing)))
        };

        let persist = ValidationPersist {
            permissions: current,
            is_validated,
            validation_error: validation_error.clone(),
            validation_type,
            validated_at: Utc::now(),
            permissions_snapshot: Some(current),
        };

        self.store
            .apply_validation_outcome(&config.id, &persist)
            .await
            .context("Fallo al persistir el resultado de la validación")?;

        Ok(ValidationOutcome {
            valid: is_validated,
            error: validation_error,
            permissions_changed: comparison.changed,
            current_permissions: current,
            missing_permissions: check.missing,
            diff: comparison,
        })
    }

    /// Revalidación a pedido: refresca la metadata descriptiva
    /// (best-effort) y corre la validación completa.
    pub async fn revalidate(
        &self,
        config: &ChannelConfig,
        credentials: &BotCredentials,
    ) -> Result<ValidationOutcome> {
        if let Ok(channel) = self
            .gateway
            .get_channel_info(&credentials.bot_token, &config.channel_username)
            .await
        {
            let title = channel.title.unwrap_or_default();
            if let Err(e) = self
                .store
                .update_channel_profile(&config.id, &title, channel.members_count)
                .await
            {
                log::warn!("(revalidate) No se pudo refrescar metadata: {:#}", e);
            }
        }

        self.validate(config, credentials, ValidationType::PermissionCheck)
            .await
    }

    /// Edición manual de permisos: valida la propuesta contra la
    /// política y sólo persiste si cumple el mínimo requerido.
    pub async fn update_permissions(
        &self,
        config: &ChannelConfig,
        proposed: &BotPermissions,
    ) -> Result<UpdateValidation> {
        let validation = permission_policy::validate_update(
            &config.permissions,
            proposed,
            &self.required_permissions,
        );

        if let Some(warning) = &validation.warning {
            log::warn!("(update_permissions) Cuenta {}: {}", config.account_id, warning);
        }

        if validation.valid {
            self.store
                .set_permissions(&config.id, proposed)
                .await
                .context("Fallo al guardar los permisos actualizados")?;
        }

        Ok(validation)
    }

    /// Falla que ocurre antes de poder leer permisos (gateway caído,
    /// credenciales inexistentes): marca inválido pero conserva el
    /// último snapshot de permisos conocido, y registra historial sin
    /// snapshot.
    pub async fn record_failure(
        &self,
        config: &ChannelConfig,
        message: String,
        validation_type: ValidationType,
    ) -> Result<ValidationOutcome> {
        let persist = ValidationPersist {
            permissions: config.permissions,
            is_validated: false,
            validation_error: Some(message.clone()),
            validation_type,
            validated_at: Utc::now(),
            permissions_snapshot: None,
        };

        self.store
            .apply_validation_outcome(&config.id, &persist)
            .await
            .context("Fallo al persistir la falla de validación")?;

        let missing_permissions =
            permission_policy::check_required(&config.permissions, &self.required_permissions)
                .missing;

        Ok(ValidationOutcome {
            valid: false,
            error: Some(message),
            permissions_changed: false,
            current_permissions: config.permissions,
            missing_permissions,
            diff: permission_policy::diff(
                &config.permissions,
                &config.permissions,
                &self.required_permissions,
            ),
        })
    }
}
