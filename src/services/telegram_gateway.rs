//! services/telegram_gateway.rs
//! Cliente delgado sobre la Bot API de Telegram. Normaliza todos los
//! modos de falla (timeout, red, respuesta malformada, rechazo de la
//! API) en un único `GatewayError`. No reintenta: la política de retry
//! es del caller, porque reintentar un "no es administrador" no tiene
//! sentido mientras que un timeout sí puede reintentarse.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::permissions::BotPermissions;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Telegram API request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Channel not found or not accessible")]
    NotFound,

    #[error("Malformed Telegram API response: {0}")]
    Malformed(String),

    #[error("Telegram API error: {0}")]
    RemoteRejected(String),
}

/// Metadata del canal según getChat.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "type")]
    pub chat_type: Option<String>,
    #[serde(default)]
    pub members_count: i64,
}

/// Estado de membresía del bot según getChatMember.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberInfo {
    pub status: String,
    #[serde(flatten)]
    pub permissions: BotPermissions,
}

/// Envelope estándar de la Bot API: {ok, result} | {ok:false, description}
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramGateway {
    http_client: Client,
    api_base: String,
    timeout: Duration,
}

impl TelegramGateway {
    pub fn new(api_base: String, timeout_secs: u64) -> Self {
        TelegramGateway {
            http_client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn method_url(&self, bot_token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, bot_token, method)
    }

    /// getChat: metadata del canal por username.
    pub async fn get_channel_info(
        &self,
        bot_token: &str,
        channel_username: &str,
    ) -> Result<ChannelInfo, GatewayError> {
        // Asegurar que el username empiece con @
        let handle = normalize_handle(channel_username);

        let response = self
            .http_client
            .get(self.method_url(bot_token, "getChat"))
            .query(&[("chat_id", handle.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        parse_envelope(response).await
    }

    /// getChatMember: estado y permisos del bot dentro del canal.
    pub async fn get_member_status(
        &self,
        bot_token: &str,
        channel_id: i64,
        user_id: i64,
    ) -> Result<MemberInfo, GatewayError> {
        let response = self
            .http_client
            .get(self.method_url(bot_token, "getChatMember"))
            .query(&[
                ("chat_id", channel_id.to_string()),
                ("user_id", user_id.to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        parse_envelope(response).await
    }
}

fn normalize_handle(channel_username: &str) -> String {
    let trimmed = channel_username.trim();
    if trimmed.starts_with('@') {
        trimmed.to_string()
    } else {
        format!("@{}", trimmed)
    }
}

fn map_reqwest_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(error.to_string())
    }
}

async fn parse_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let http_status = response.status();
    let body = response.text().await.map_err(map_reqwest_error)?;

    let envelope: ApiEnvelope<T> = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(_) if http_status == reqwest::StatusCode::NOT_FOUND => {
            return Err(GatewayError::NotFound);
        }
        Err(e) => return Err(GatewayError::Malformed(e.to_string())),
    };

    if !envelope.ok {
        let description = envelope
            .description
            .unwrap_or_else(|| format!("HTTP {}: Unknown Telegram API error", http_status));
        // "chat not found" llega como ok:false con HTTP 400
        if description.to_lowercase().contains("not found") {
            return Err(GatewayError::NotFound);
        }
        return Err(GatewayError::RemoteRejected(description));
    }

    envelope
        .result
        .ok_or_else(|| GatewayError::Malformed("ok:true sin campo result".to_string()))
}
