//! handlers/scheduler_handler.rs
//! Endpoints de control del scheduler de reconciliación.

use actix_web::{web, HttpResponse};
use chrono::{Duration as ChronoDuration, Utc};
use log::error;
use serde::Deserialize;
use serde_json::json;

use crate::services::channel_store::ChannelStore;
use crate::services::credentials::AuthServiceClient;
use crate::services::scheduler::ValidationScheduler;

#[derive(Debug, Deserialize)]
pub struct SetIntervalRequest {
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct TriggerValidationRequest {
    pub account_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub days: Option<i64>,
}

/// GET /api/validation/status
pub async fn validation_status_endpoint(
    scheduler: web::Data<ValidationScheduler<AuthServiceClient>>,
) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "scheduler": scheduler.status(),
    }))
}

/// POST /api/validation/trigger
/// Fuerza un barrido ignorando la ventana de staleness. El body es
/// opcional: `{"account_id": N}` limita el barrido a esa cuenta.
pub async fn trigger_validation_endpoint(
    scheduler: web::Data<ValidationScheduler<AuthServiceClient>>,
    req_body: Option<web::Json<TriggerValidationRequest>>,
) -> HttpResponse {
    let account_id = req_body.and_then(|body| body.account_id);

    match scheduler.trigger_sweep(account_id).await {
        Ok(Some(summary)) => {
            if let Some(account_id) = account_id {
                if summary.checked == 0 {
                    return HttpResponse::NotFound().json(json!({
                        "success": false,
                        "error": format!("No channel configured for account {}", account_id),
                    }));
                }
            }
            HttpResponse::Ok().json(json!({
                "success": true,
                "sweep": summary,
            }))
        }
        Ok(None) => HttpResponse::Conflict().json(json!({
            "success": false,
            "error": "A validation sweep is already running",
        })),
        Err(e) => {
            error!("(trigger_validation_endpoint) Barrido forzado falló: {:?}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Validation sweep failed",
            }))
        }
    }
}

/// PUT /api/validation/interval
pub async fn set_interval_endpoint(
    scheduler: web::Data<ValidationScheduler<AuthServiceClient>>,
    req_body: web::Json<SetIntervalRequest>,
) -> HttpResponse {
    match scheduler.set_interval(req_body.interval_seconds) {
        Ok(()) => HttpResponse::Ok().json(json!({
            "success": true,
            "scheduler": scheduler.status(),
        })),
        Err(e) => HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": e.to_string(),
        })),
    }
}

/// GET /api/validation/statistics
pub async fn validation_statistics_endpoint(
    store: web::Data<ChannelStore>,
    query: web::Query<StatisticsQuery>,
) -> HttpResponse {
    let days = query.days.unwrap_or(30).clamp(1, 365);
    let since = Utc::now() - ChronoDuration::days(days);

    match store.validation_statistics(since).await {
        Ok(statistics) => HttpResponse::Ok().json(json!({
            "success": true,
            "period_days": days,
            "statistics": statistics,
        })),
        Err(e) => {
            error!("(validation_statistics_endpoint) Error interno: {:?}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Internal error",
            }))
        }
    }
}
