// ============================================================================
// HTTP API - actix-web routes over the order service
// ============================================================================
//
// JSON bodies are camelCase and successful responses are wrapped as
// `{"data": ...}`. `/health` and `/metrics` sit outside the `/api` scope.
//
// ============================================================================

mod error;
mod handlers;

use std::sync::Arc;

use actix::Addr;
use actix_web::web;

use crate::actors::HealthMonitorActor;
use crate::domain::order::OrderService;
use crate::metrics::Metrics;

pub use error::ApiError;
pub use handlers::{OPERATOR_ID_HEADER, OPERATOR_NAME_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub service: OrderService,
    pub health: Addr<HealthMonitorActor>,
    pub metrics: Arc<Metrics>,
}

/// Malformed JSON bodies answer with the same `{message}` shape as every
/// other client error.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/health", web::get().to(handlers::health))
        .route("/metrics", web::get().to(handlers::metrics))
        .service(
            web::scope("/api")
                .route("/orders", web::post().to(handlers::create_order))
                .route("/orders", web::get().to(handlers::list_orders))
                // Registered before `/orders/{id}` so it is not taken for an id.
                .route("/orders/stream", web::get().to(handlers::stream_orders))
                .route("/orders/{id}", web::get().to(handlers::get_order))
                .route("/orders/{id}/status", web::patch().to(handlers::update_status))
                .route("/catalog/{id}", web::delete().to(handlers::delete_catalog_item)),
        );
}
