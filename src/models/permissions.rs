use serde::{Deserialize, Serialize};
use std::fmt;

/// Las cinco capacidades que Telegram reporta para un administrador de canal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CanPostMessages,
    CanEditMessages,
    CanSendMediaMessages,
    CanDeleteMessages,
    CanPinMessages,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::CanPostMessages,
        Permission::CanEditMessages,
        Permission::CanSendMediaMessages,
        Permission::CanDeleteMessages,
        Permission::CanPinMessages,
    ];

    /// Nombre del campo tal como lo expone la API de Telegram.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::CanPostMessages => "can_post_messages",
            Permission::CanEditMessages => "can_edit_messages",
            Permission::CanSendMediaMessages => "can_send_media_messages",
            Permission::CanDeleteMessages => "can_delete_messages",
            Permission::CanPinMessages => "can_pin_messages",
        }
    }

    pub fn parse(value: &str) -> Option<Permission> {
        match value.trim() {
            "can_post_messages" => Some(Permission::CanPostMessages),
            "can_edit_messages" => Some(Permission::CanEditMessages),
            "can_send_media_messages" => Some(Permission::CanSendMediaMessages),
            "can_delete_messages" => Some(Permission::CanDeleteMessages),
            "can_pin_messages" => Some(Permission::CanPinMessages),
            _ => None,
        }
    }

    /// Etiqueta legible para el dashboard.
    pub fn label(self) -> &'static str {
        match self {
            Permission::CanPostMessages => "Post Messages",
            Permission::CanEditMessages => "Edit Messages",
            Permission::CanSendMediaMessages => "Send Media",
            Permission::CanDeleteMessages => "Delete Messages",
            Permission::CanPinMessages => "Pin Messages",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot de permisos del bot en el canal (último valor conocido,
/// sólo se refresca en un intento de validación).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BotPermissions {
    #[serde(default)]
    pub can_post_messages: bool,
    #[serde(default)]
    pub can_edit_messages: bool,
    #[serde(default)]
    pub can_send_media_messages: bool,
    #[serde(default)]
    pub can_delete_messages: bool,
    #[serde(default)]
    pub can_pin_messages: bool,
}

impl BotPermissions {
    pub fn get(&self, permission: Permission) -> bool {
        match permission {
            Permission::CanPostMessages => self.can_post_messages,
            Permission::CanEditMessages => self.can_edit_messages,
            Permission::CanSendMediaMessages => self.can_send_media_messages,
            Permission::CanDeleteMessages => self.can_delete_messages,
            Permission::CanPinMessages => self.can_pin_messages,
        }
    }

    pub fn set(&mut self, permission: Permission, value: bool) {
        match permission {
            Permission::CanPostMessages => self.can_post_messages = value,
            Permission::CanEditMessages => self.can_edit_messages = value,
            Permission::CanSendMediaMessages => self.can_send_media_messages = value,
            Permission::CanDeleteMessages => self.can_delete_messages = value,
            Permission::CanPinMessages => self.can_pin_messages = value,
        }
    }
}
