//! services/credentials.rs
//! Resolución de credenciales de bot por cuenta. En producción las
//! entrega el servicio de auth; los tests enchufan un provider propio.

use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No credentials found for account {0}")]
    AccountNotFound(i64),

    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Clone)]
pub struct BotCredentials {
    pub bot_token: String,
    pub bot_id: i64,
}

/// Fuente de credenciales de bot. El scheduler y los handlers son
/// genéricos sobre esto para poder validar sin un auth service real.
pub trait CredentialProvider: Send + Sync + 'static {
    fn get_bot_credentials(
        &self,
        account_id: i64,
    ) -> impl Future<Output = Result<BotCredentials, CredentialError>> + Send;
}

#[derive(Debug, Deserialize)]
struct CredentialsResponse {
    #[serde(default)]
    success: bool,
    bot_token: Option<String>,
    bot_id: Option<i64>,
}

/// Cliente HTTP contra el servicio de auth.
#[derive(Clone)]
pub struct AuthServiceClient {
    http_client: Client,
    base_url: String,
}

impl AuthServiceClient {
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        AuthServiceClient {
            http_client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl CredentialProvider for AuthServiceClient {
    fn get_bot_credentials(
        &self,
        account_id: i64,
    ) -> impl Future<Output = Result<BotCredentials, CredentialError>> + Send {
        let url = format!("{}/api/auth/credentials/{}", self.base_url, account_id);
        let http_client = self.http_client.clone();

        async move {
            let response = http_client
                .get(&url)
                .send()
                .await
                .map_err(|e| CredentialError::ServiceUnavailable(e.to_string()))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(CredentialError::AccountNotFound(account_id));
            }

            let body: CredentialsResponse = response
                .json()
                .await
                .map_err(|e| CredentialError::ServiceUnavailable(e.to_string()))?;

            match (body.success, body.bot_token, body.bot_id) {
                (true, Some(bot_token), Some(bot_id)) => Ok(BotCredentials { bot_token, bot_id }),
                _ => Err(CredentialError::AccountNotFound(account_id)),
            }
        }
    }
}
