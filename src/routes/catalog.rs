use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
struct ServiceFilter {
    category: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/services").route(web::get().to(list_services)))
        .service(web::resource("/api/services/{id}").route(web::get().to(get_service)))
        .service(web::resource("/api/barbers").route(web::get().to(list_barbers)))
        .service(web::resource("/api/barbers/{id}").route(web::get().to(get_barber)));
}

async fn list_services(
    state: web::Data<AppState>,
    query: web::Query<ServiceFilter>,
) -> Result<HttpResponse, ApiError> {
    let services = match query.category.as_deref() {
        Some(category) => state.storage.services_by_category(category).await?,
        None => state.storage.all_services().await?,
    };
    Ok(HttpResponse::Ok().json(services))
}

async fn get_service(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let service = state
        .storage
        .get_service(path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Service not found"))?;
    Ok(HttpResponse::Ok().json(service))
}

async fn list_barbers(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let barbers = state.storage.all_barbers().await?;
    Ok(HttpResponse::Ok().json(barbers))
}

async fn get_barber(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let barber = state
        .storage
        .get_barber(path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("Barber not found"))?;
    Ok(HttpResponse::Ok().json(barber))
}
