use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

use crate::{
    auth::{bearer_validator, AuthUser},
    error::ApiError,
    models::{Appointment, NewAppointment, ROLE_ADMIN, ROLE_BARBER, ROLE_CUSTOMER},
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct DateFilter {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/appointments")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .route(web::post().to(create_appointment)),
    )
    .service(
        web::resource("/api/appointments/{id}/status")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .route(web::patch().to(update_status)),
    )
    .service(
        web::resource("/api/users/{user_id}/appointments")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .route(web::get().to(list_user_appointments)),
    )
    .service(
        web::resource("/api/barbers/{barber_id}/appointments")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .route(web::get().to(list_barber_appointments)),
    );
}

async fn create_appointment(
    state: web::Data<AppState>,
    payload: web::Json<NewAppointment>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    // Customers book for themselves; barbers and admins may book on a
    // customer's behalf. The date and price are stored as submitted.
    if auth.role == ROLE_CUSTOMER && payload.customer_id != auth.id {
        return Err(ApiError::Forbidden);
    }

    let appointment = state.storage.create_appointment(payload).await?;
    Ok(HttpResponse::Created().json(appointment))
}

async fn list_user_appointments(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    if auth.id != user_id && auth.role != ROLE_ADMIN {
        return Err(ApiError::Forbidden);
    }

    let appointments = state.storage.user_appointments(user_id).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

async fn list_barber_appointments(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<DateFilter>,
) -> Result<HttpResponse, ApiError> {
    let barber_id = path.into_inner();
    let date = match query.date.as_deref() {
        Some(raw) => Some(parse_date_filter(raw)?),
        None => None,
    };

    let appointments = state.storage.barber_appointments(barber_id, date).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<StatusPayload>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let status = payload
        .into_inner()
        .status
        .filter(|status| !status.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Status is required".to_string()))?;

    let id = path.into_inner();
    let appointment = state
        .storage
        .get_appointment(id)
        .await?
        .ok_or(ApiError::NotFound("Appointment not found"))?;
    if !may_manage(&state, &appointment, &auth).await? {
        return Err(ApiError::Forbidden);
    }

    let appointment = state
        .storage
        .update_appointment_status(id, &status)
        .await?
        .ok_or(ApiError::NotFound("Appointment not found"))?;
    Ok(HttpResponse::Ok().json(appointment))
}

/// An appointment's status is managed by its customer, the barber it is
/// booked with, or an admin. The overwrite itself stays unguarded; only who
/// may perform it is checked.
async fn may_manage(
    state: &web::Data<AppState>,
    appointment: &Appointment,
    auth: &AuthUser,
) -> Result<bool, ApiError> {
    if auth.role == ROLE_ADMIN || appointment.customer_id == auth.id {
        return Ok(true);
    }
    if auth.role == ROLE_BARBER {
        if let Some(barber) = state.storage.get_barber(appointment.barber_id).await? {
            return Ok(barber.barber.user_id == auth.id);
        }
    }
    Ok(false)
}

/// Accepts a plain calendar date or a full timestamp, of which only the date
/// component is kept.
fn parse_date_filter(raw: &str) -> Result<NaiveDate, ApiError> {
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::<FixedOffset>::parse_from_rfc3339(raw) {
        return Ok(timestamp.date_naive());
    }
    Err(ApiError::BadRequest("Invalid date filter".to_string()))
}
