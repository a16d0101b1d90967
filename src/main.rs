use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

use crate::config::settings::Settings;
use crate::logger::init_logger;
use crate::services::channel_store::ChannelStore;
use crate::services::channel_validator::ChannelValidator;
use crate::services::credentials::AuthServiceClient;
use crate::services::scheduler::ValidationScheduler;
use crate::services::telegram_gateway::TelegramGateway;

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database(database_path: &str) -> Pool<Sqlite> {
    // 1) Crear el directorio contenedor si hace falta
    if let Some(parent) = std::path::Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).expect("No se pudo crear el directorio de datos");
        }
    }

    let db_url = format!("sqlite:{}", database_path);
    log::info!("Conectando a SQLite en {}", db_url);

    // 2) Conectarnos con SQLx, creando el archivo si no existe
    let options = SqliteConnectOptions::from_str(&db_url)
        .expect("URL de base de datos inválida")
        .create_if_missing(true);

    Pool::<Sqlite>::connect_with(options)
        .await
        .expect("No se pudo conectar a la base de datos SQLite.")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let settings = Settings::from_env();

    // Conectarnos a la DB
    let db_pool = setup_database(&settings.database_path).await;

    // ChannelStore + migraciones
    let store = ChannelStore::new(db_pool.clone());
    if let Err(e) = store.run_migrations().await {
        panic!("Fallo en migraciones de 'channel_configs': {:?}", e);
    }

    // Gateway de Telegram y cliente de credenciales
    let gateway = TelegramGateway::new(
        settings.telegram_api_base.clone(),
        settings.validation_timeout_secs,
    );
    let auth_client = AuthServiceClient::new(
        settings.auth_service_url.clone(),
        settings.validation_timeout_secs,
    );

    // Validador
    let validator = ChannelValidator::new(
        gateway,
        store.clone(),
        settings.required_permissions.clone(),
    );

    // Scheduler de reconciliación periódica
    let scheduler = ValidationScheduler::new(
        store.clone(),
        validator.clone(),
        auth_client.clone(),
        &settings,
    );
    scheduler.start();

    // Levantar servidor
    let bind_address = ("0.0.0.0", settings.service_port);
    log::info!("Levantando servidor en {}:{}", bind_address.0, bind_address.1);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(validator.clone()))
            .app_data(web::Data::new(auth_client.clone()))
            .app_data(web::Data::new(scheduler.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind(bind_address)?
    .run()
    .await
}
