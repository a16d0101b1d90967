//! handlers/channel_handler.rs
//! Endpoints de configuración de canal: alta, consulta, revalidación,
//! edición de permisos, historial y baja.

use actix_web::{web, HttpResponse};
use log::error;
use serde::Deserialize;
use serde_json::json;

use crate::models::channel_config::{SetupChannelRequest, UpdatePermissionsRequest};
use crate::services::channel_store::ChannelStore;
use crate::services::channel_validator::{ChannelValidator, SetupError};
use crate::services::credentials::{AuthServiceClient, CredentialError, CredentialProvider};
use crate::services::permission_policy;
use crate::services::telegram_gateway::GatewayError;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// POST /api/channels/setup
pub async fn setup_channel_endpoint(
    validator: web::Data<ChannelValidator>,
    auth_client: web::Data<AuthServiceClient>,
    req_body: web::Json<SetupChannelRequest>,
) -> HttpResponse {
    let request = req_body.into_inner();
    log::info!(
        "(setup_channel_endpoint) Alta de canal @{} para la cuenta {}",
        request.channel_username.trim_start_matches('@'),
        request.account_id
    );

    let credentials = match auth_client.get_bot_credentials(request.account_id).await {
        Ok(credentials) => credentials,
        Err(e) => return credential_error_response(e),
    };

    match validator.setup(&request, &credentials).await {
        Ok(config) => HttpResponse::Created().json(json!({
            "success": true,
            "channel": config,
        })),
        Err(SetupError::AlreadyConfigured) => HttpResponse::Conflict().json(json!({
            "success": false,
            "error": SetupError::AlreadyConfigured.to_string(),
        })),
        Err(SetupError::Gateway(GatewayError::NotFound)) => {
            HttpResponse::NotFound().json(json!({
                "success": false,
                "error": GatewayError::NotFound.to_string(),
            }))
        }
        Err(e @ (SetupError::NotAdministrator | SetupError::MissingPermissions(_))) => {
            HttpResponse::UnprocessableEntity().json(json!({
                "success": false,
                "error": e.to_string(),
            }))
        }
        Err(SetupError::Gateway(gateway_error)) => {
            error!("(setup_channel_endpoint) Gateway falló: {}", gateway_error);
            HttpResponse::BadGateway().json(json!({
                "success": false,
                "error": gateway_error.to_string(),
            }))
        }
        Err(SetupError::Internal(e)) => {
            error!("(setup_channel_endpoint) Error interno: {:?}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Internal error during channel setup",
            }))
        }
    }
}

/// GET /api/channels/status/{account_id}
pub async fn channel_status_endpoint(
    store: web::Data<ChannelStore>,
    validator: web::Data<ChannelValidator>,
    path: web::Path<i64>,
) -> HttpResponse {
    let account_id = path.into_inner();

    match store.get_by_account_id(account_id).await {
        Ok(Some(config)) => {
            let display = permission_policy::format_for_display(
                &config.permissions,
                validator.required_permissions(),
            );
            HttpResponse::Ok().json(json!({
                "success": true,
                "channel": config,
                "permissions_display": display,
            }))
        }
        Ok(None) => channel_not_found(account_id),
        Err(e) => internal_error("channel_status_endpoint", e),
    }
}

/// POST /api/channels/revalidate/{account_id}
pub async fn revalidate_endpoint(
    validator: web::Data<ChannelValidator>,
    auth_client: web::Data<AuthServiceClient>,
    path: web::Path<i64>,
) -> HttpResponse {
    let account_id = path.into_inner();

    let config = match validator.store().get_by_account_id(account_id).await {
        Ok(Some(config)) => config,
        Ok(None) => return channel_not_found(account_id),
        Err(e) => return internal_error("revalidate_endpoint", e),
    };

    let credentials = match auth_client.get_bot_credentials(account_id).await {
        Ok(credentials) => credentials,
        Err(e) => return credential_error_response(e),
    };

    match validator.revalidate(&config, &credentials).await {
        Ok(outcome) => HttpResponse::Ok().json(json!({
            "success": true,
            "validation": outcome,
        })),
        Err(e) => internal_error("revalidate_endpoint", e),
    }
}

/// PUT /api/channels/permissions/{account_id}
pub async fn update_permissions_endpoint(
    validator: web::Data<ChannelValidator>,
    path: web::Path<i64>,
    req_body: web::Json<UpdatePermissionsRequest>,
) -> HttpResponse {
    let account_id = path.into_inner();
    let proposed = req_body.into_inner().permissions;

    let config = match validator.store().get_by_account_id(account_id).await {
        Ok(Some(config)) => config,
        Ok(None) => return channel_not_found(account_id),
        Err(e) => return internal_error("update_permissions_endpoint", e),
    };

    match validator.update_permissions(&config, &proposed).await {
        Ok(validation) if validation.valid => HttpResponse::Ok().json(json!({
            "success": true,
            "validation": validation,
        })),
        Ok(validation) => HttpResponse::UnprocessableEntity().json(json!({
            "success": false,
            "error": validation.error,
            "validation": validation,
        })),
        Err(e) => internal_error("update_permissions_endpoint", e),
    }
}

/// GET /api/channels/history/{account_id}
pub async fn channel_history_endpoint(
    store: web::Data<ChannelStore>,
    path: web::Path<i64>,
    query: web::Query<HistoryQuery>,
) -> HttpResponse {
    let account_id = path.into_inner();
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let config = match store.get_by_account_id(account_id).await {
        Ok(Some(config)) => config,
        Ok(None) => return channel_not_found(account_id),
        Err(e) => return internal_error("channel_history_endpoint", e),
    };

    match store.list_history(&config.id, limit).await {
        Ok(history) => HttpResponse::Ok().json(json!({
            "success": true,
            "history": history,
        })),
        Err(e) => internal_error("channel_history_endpoint", e),
    }
}

/// DELETE /api/channels/{account_id}
pub async fn delete_channel_endpoint(
    store: web::Data<ChannelStore>,
    path: web::Path<i64>,
) -> HttpResponse {
    let account_id = path.into_inner();

    match store.delete_by_account_id(account_id).await {
        Ok(true) => {
            log::info!("(delete_channel_endpoint) Canal de la cuenta {} eliminado", account_id);
            HttpResponse::Ok().json(json!({ "success": true }))
        }
        Ok(false) => channel_not_found(account_id),
        Err(e) => internal_error("delete_channel_endpoint", e),
    }
}

fn channel_not_found(account_id: i64) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "error": format!("No channel configured for account {}", account_id),
    }))
}

fn credential_error_response(error: CredentialError) -> HttpResponse {
    match error {
        CredentialError::AccountNotFound(_) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": error.to_string(),
        })),
        CredentialError::ServiceUnavailable(_) => {
            log::error!("(credential_error_response) {}", error);
            HttpResponse::ServiceUnavailable().json(json!({
                "success": false,
                "error": error.to_string(),
            }))
        }
    }
}

fn internal_error(endpoint: &str, e: anyhow::Error) -> HttpResponse {
    error!("({}) Error interno: {:?}", endpoint, e);
    HttpResponse::InternalServerError().json(json!({
        "success": false,
        "error": "Internal error",
    }))
}
