use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::permissions::BotPermissions;

/// Contexto que originó el intento de validación. Es metadata de
/// auditoría: nunca cambia el algoritmo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    Setup,
    PermissionCheck,
    Periodic,
}

impl ValidationType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationType::Setup => "setup",
            ValidationType::PermissionCheck => "permission_check",
            ValidationType::Periodic => "periodic",
        }
    }
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registro inmutable de un intento de validación.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationHistoryRecord {
    pub id: String,
    pub channel_config_id: String,
    pub validation_type: String,
    pub validation_result: bool,
    pub error_message: Option<String>,
    pub permissions_snapshot: Option<BotPermissions>,
    pub validated_at: DateTime<Utc>,
}
