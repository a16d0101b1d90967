use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::permissions::BotPermissions;

/// Configuración de canal vinculada a una cuenta de bot (1:1 por cuenta).
#[derive(Debug, Clone, Serialize)]
pub struct ChannelConfig {
    pub id: String,
    pub account_id: i64,
    // Negativo para canales/supergrupos; el signo es opaco para este servicio.
    pub channel_id: Option<i64>,
    pub channel_username: String,
    pub channel_title: String,
    pub channel_type: String, // "channel", "supergroup"
    pub channel_member_count: i64,
    pub permissions: BotPermissions,
    pub is_validated: bool,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub validation_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Datos para crear una configuración nueva (sólo desde el setup).
#[derive(Debug, Clone)]
pub struct NewChannelConfig {
    pub account_id: i64,
    pub channel_id: i64,
    pub channel_username: String,
    pub channel_title: String,
    pub channel_type: String,
    pub channel_member_count: i64,
    pub permissions: BotPermissions,
}

/// Request para POST /api/channels/setup
#[derive(Debug, Clone, Deserialize)]
pub struct SetupChannelRequest {
    pub account_id: i64,
    pub channel_username: String,
}

/// Request para PUT /api/channels/permissions/{account_id}
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePermissionsRequest {
    pub permissions: BotPermissions,
}
