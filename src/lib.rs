pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod storage;

use actix_web::{web, HttpResponse};
use serde_json::json;

/// Registers the whole API surface on a service config.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    routes::auth::configure(cfg);
    routes::catalog::configure(cfg);
    routes::appointments::configure(cfg);
    routes::reviews::configure(cfg);
}

/// Maps JSON deserialization failures to the same 400 body shape the
/// handlers produce.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        actix_web::error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(json!({ "message": "Invalid request data" })),
        )
        .into()
    })
}
