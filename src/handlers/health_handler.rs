//! handlers/health_handler.rs
//! Health check: verifica que la base de datos responda.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::{Pool, Sqlite};

pub async fn health_endpoint(db_pool: web::Data<Pool<Sqlite>>) -> HttpResponse {
    match db_pool.acquire().await {
        Ok(_) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "service": "channel-service",
            "timestamp": Utc::now().to_rfc3339(),
        })),
        Err(e) => {
            log::error!("(health_endpoint) Base de datos no responde: {:?}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "service": "channel-service",
                "error": "database unavailable",
            }))
        }
    }
}
