//! tests/channel_validator_tests.rs

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::models::channel_config::SetupChannelRequest;
use crate::models::permissions::Permission;
use crate::models::validation_history::ValidationType;
use crate::services::channel_validator::{ChannelValidator, SetupError};
use crate::services::credentials::BotCredentials;
use crate::services::telegram_gateway::{GatewayError, TelegramGateway};
use crate::tests::{memory_store, required, sample_channel};

const TOKEN: &str = "token123";
const BOT_ID: i64 = 555;
const CHANNEL_ID: i64 = -1001234;

fn credentials() -> BotCredentials {
    BotCredentials {
        bot_token: TOKEN.to_string(),
        bot_id: BOT_ID,
    }
}

async fn validator_for(server: &MockServer) -> ChannelValidator {
    let (store, _pool) = memory_store().await;
    let gateway = TelegramGateway::new(server.uri(), 2);
    ChannelValidator::new(gateway, store, required())
}

async fn mount_get_chat(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/bot{}/getChat", TOKEN)))
        .and(query_param("chat_id", "@mi_canal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {
                "id": CHANNEL_ID,
                "title": "Mi Canal",
                "username": "mi_canal",
                "type": "channel",
                "members_count": 150
            }
        })))
        .mount(server)
        .await;
}

async fn mount_member(server: &MockServer, status: &str, body: serde_json::Value) {
    let mut result = json!({ "status": status });
    if let (Some(result_map), Some(extra)) = (result.as_object_mut(), body.as_object()) {
        for (key, value) in extra {
            result_map.insert(key.clone(), value.clone());
        }
    }

    Mock::given(method("GET"))
        .and(path(format!("/bot{}/getChatMember", TOKEN)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": result
        })))
        .mount(server)
        .await;
}

#[actix_rt::test]
async fn setup_creates_validated_config() {
    let server = MockServer::start().await;
    mount_get_chat(&server).await;
    mount_member(
        &server,
        "administrator",
        json!({ "can_post_messages": true, "can_edit_messages": true }),
    )
    .await;

    let validator = validator_for(&server).await;
    let request = SetupChannelRequest {
        account_id: 1,
        channel_username: "mi_canal".to_string(),
    };

    let config = validator.setup(&request, &credentials()).await.unwrap();
    assert_eq!(config.account_id, 1);
    assert_eq!(config.channel_id, Some(CHANNEL_ID));
    assert_eq!(config.channel_username, "mi_canal");
    assert_eq!(config.channel_title.as_str(), "Mi Canal");
    assert_eq!(config.channel_member_count, 150);
    assert!(config.is_validated);
    assert!(config.permissions.can_post_messages);

    let history = validator.store().list_history(&config.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].validation_type, ValidationType::Setup.as_str());
}

#[actix_rt::test]
async fn setup_rejects_non_administrator_without_persisting() {
    let server = MockServer::start().await;
    mount_get_chat(&server).await;
    mount_member(&server, "member", json!({})).await;

    let validator = validator_for(&server).await;
    let request = SetupChannelRequest {
        account_id: 1,
        channel_username: "mi_canal".to_string(),
    };

    let result = validator.setup(&request, &credentials()).await;
    assert!(matches!(result, Err(SetupError::NotAdministrator)));
    assert!(validator.store().get_by_account_id(1).await.unwrap().is_none());
}

#[actix_rt::test]
async fn setup_rejects_missing_required_permissions() {
    let server = MockServer::start().await;
    mount_get_chat(&server).await;
    mount_member(&server, "administrator", json!({ "can_post_messages": true })).await;

    let validator = validator_for(&server).await;
    let request = SetupChannelRequest {
        account_id: 1,
        channel_username: "mi_canal".to_string(),
    };

    match validator.setup(&request, &credentials()).await {
        Err(SetupError::MissingPermissions(missing)) => {
            assert_eq!(missing, vec![Permission::CanEditMessages]);
        }
        other => panic!("Esperaba MissingPermissions, llegó {:?}", other.map(|c| c.id)),
    }
    assert!(validator.store().get_by_account_id(1).await.unwrap().is_none());
}

#[actix_rt::test]
async fn setup_rejects_unknown_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/bot{}/getChat", TOKEN)))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let validator = validator_for(&server).await;
    let request = SetupChannelRequest {
        account_id: 1,
        channel_username: "inexistente".to_string(),
    };

    let result = validator.setup(&request, &credentials()).await;
    assert!(matches!(result, Err(SetupError::Gateway(GatewayError::NotFound))));
}

#[actix_rt::test]
async fn setup_rejects_duplicate_account() {
    let server = MockServer::start().await;
    mount_get_chat(&server).await;
    mount_member(
        &server,
        "administrator",
        json!({ "can_post_messages": true, "can_edit_messages": true }),
    )
    .await;

    let validator = validator_for(&server).await;
    let request = SetupChannelRequest {
        account_id: 1,
        channel_username: "mi_canal".to_string(),
    };

    validator.setup(&request, &credentials()).await.unwrap();
    let result = validator.setup(&request, &credentials()).await;
    assert!(matches!(result, Err(SetupError::AlreadyConfigured)));
}

#[actix_rt::test]
async fn validate_marks_invalid_when_required_permission_lost() {
    let server = MockServer::start().await;
    mount_member(
        &server,
        "administrator",
        json!({ "can_edit_messages": true, "can_send_media_messages": true,
                "can_delete_messages": true, "can_pin_messages": true }),
    )
    .await;

    let validator = validator_for(&server).await;
    let config = validator
        .store()
        .create_config(&sample_channel(1))
        .await
        .unwrap();

    let outcome = validator
        .validate(&config, &credentials(), ValidationType::Periodic)
        .await
        .unwrap();

    assert!(!outcome.valid);
    assert!(outcome.error.unwrap().contains("can_post_messages"));
    assert!(outcome.permissions_changed);
    assert_eq!(outcome.diff.lost, vec![Permission::CanPostMessages]);
    assert_eq!(outcome.diff.lost_required, vec![Permission::CanPostMessages]);
    assert_eq!(outcome.missing_permissions, vec![Permission::CanPostMessages]);

    let updated = validator.store().get_by_account_id(1).await.unwrap().unwrap();
    assert!(!updated.is_validated);
    assert!(!updated.permissions.can_post_messages);

    let history = validator.store().list_history(&config.id, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].validation_type, ValidationType::Periodic.as_str());
}

#[actix_rt::test]
async fn validate_marks_invalid_when_demoted() {
    let server = MockServer::start().await;
    // Telegram no incluye los flags can_* para un miembro raso
    mount_member(&server, "member", json!({})).await;

    let validator = validator_for(&server).await;
    let config = validator
        .store()
        .create_config(&sample_channel(1))
        .await
        .unwrap();

    let outcome = validator
        .validate(&config, &credentials(), ValidationType::Periodic)
        .await
        .unwrap();

    assert!(!outcome.valid);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Bot is no longer an administrator in the channel")
    );
    assert!(!outcome.permissions_changed);
}

#[actix_rt::test]
async fn demotion_preserves_stored_snapshot() {
    let server = MockServer::start().await;
    mount_member(&server, "member", json!({})).await;

    let validator = validator_for(&server).await;
    let config = validator
        .store()
        .create_config(&sample_channel(1))
        .await
        .unwrap();

    validator
        .validate(&config, &credentials(), ValidationType::Periodic)
        .await
        .unwrap();

    let updated = validator.store().get_by_account_id(1).await.unwrap().unwrap();
    assert!(!updated.is_validated);
    // La degradación no pisa el último snapshot bueno con ceros
    assert!(updated.permissions.can_post_messages);
    assert!(updated.permissions.can_edit_messages);

    let history = validator.store().list_history(&config.id, 1).await.unwrap();
    assert!(!history[0].validation_result);
    assert!(history[0].permissions_snapshot.is_none());
}

#[actix_rt::test]
async fn validate_succeeds_and_refreshes_timestamp() {
    let server = MockServer::start().await;
    mount_member(
        &server,
        "administrator",
        json!({ "can_post_messages": true, "can_edit_messages": true,
                "can_send_media_messages": true, "can_delete_messages": true,
                "can_pin_messages": true }),
    )
    .await;

    let validator = validator_for(&server).await;
    let config = validator
        .store()
        .create_config(&sample_channel(1))
        .await
        .unwrap();

    let outcome = validator
        .validate(&config, &credentials(), ValidationType::PermissionCheck)
        .await
        .unwrap();

    assert!(outcome.valid);
    assert!(outcome.error.is_none());
    assert!(!outcome.permissions_changed);

    let updated = validator.store().get_by_account_id(1).await.unwrap().unwrap();
    assert!(updated.is_validated);
    assert!(updated.validation_error.is_none());
}

#[actix_rt::test]
async fn gateway_failure_preserves_stored_snapshot() {
    // Sin servidor: error de red
    let (store, _pool) = memory_store().await;
    let gateway = TelegramGateway::new("http://127.0.0.1:1".to_string(), 1);
    let validator = ChannelValidator::new(gateway, store, required());

    let config = validator
        .store()
        .create_config(&sample_channel(1))
        .await
        .unwrap();

    let outcome = validator
        .validate(&config, &credentials(), ValidationType::Periodic)
        .await
        .unwrap();

    assert!(!outcome.valid);
    assert!(!outcome.permissions_changed);

    let updated = validator.store().get_by_account_id(1).await.unwrap().unwrap();
    assert!(!updated.is_validated);
    // Los flags almacenados no se pisan con ceros
    assert!(updated.permissions.can_post_messages);
    assert!(updated.validation_error.is_some());

    let history = validator.store().list_history(&config.id, 1).await.unwrap();
    assert!(history[0].permissions_snapshot.is_none());
    assert!(!history[0].validation_result);
}

#[actix_rt::test]
async fn update_permissions_persists_only_valid_proposals() {
    let server = MockServer::start().await;
    let validator = validator_for(&server).await;
    let config = validator
        .store()
        .create_config(&sample_channel(1))
        .await
        .unwrap();

    // Propuesta inválida: pierde un requerido
    let mut invalid = config.permissions;
    invalid.can_post_messages = false;
    let validation = validator.update_permissions(&config, &invalid).await.unwrap();
    assert!(!validation.valid);
    assert!(validation.warning.is_some());

    let unchanged = validator.store().get_by_account_id(1).await.unwrap().unwrap();
    assert!(unchanged.permissions.can_post_messages);

    // Propuesta válida: sólo suelta un opcional
    let mut valid = config.permissions;
    valid.can_pin_messages = false;
    let validation = validator.update_permissions(&config, &valid).await.unwrap();
    assert!(validation.valid);

    let updated = validator.store().get_by_account_id(1).await.unwrap().unwrap();
    assert!(!updated.permissions.can_pin_messages);
}
