//! app.rs
use crate::handlers::{channel_handler, health_handler, scheduler_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_handler::health_endpoint));

    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/channels")
                    .route(
                        "/setup",
                        web::post().to(channel_handler::setup_channel_endpoint),
                    )
                    .route(
                        "/status/{account_id}",
                        web::get().to(channel_handler::channel_status_endpoint),
                    )
                    .route(
                        "/revalidate/{account_id}",
                        web::post().to(channel_handler::revalidate_endpoint),
                    )
                    .route(
                        "/permissions/{account_id}",
                        web::put().to(channel_handler::update_permissions_endpoint),
                    )
                    .route(
                        "/history/{account_id}",
                        web::get().to(channel_handler::channel_history_endpoint),
                    )
                    .route(
                        "/{account_id}",
                        web::delete().to(channel_handler::delete_channel_endpoint),
                    ),
            )
            .service(
                web::scope("/validation")
                    .route(
                        "/status",
                        web::get().to(scheduler_handler::validation_status_endpoint),
                    )
                    .route(
                        "/trigger",
                        web::post().to(scheduler_handler::trigger_validation_endpoint),
                    )
                    .route(
                        "/interval",
                        web::put().to(scheduler_handler::set_interval_endpoint),
                    )
                    .route(
                        "/statistics",
                        web::get().to(scheduler_handler::validation_statistics_endpoint),
                    ),
            ),
    );
}
