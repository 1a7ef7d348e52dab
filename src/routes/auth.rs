use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{hash_password, issue_token, verify_password},
    error::ApiError,
    models::{NewUser, UserProfile, ROLE_CUSTOMER},
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/auth/register").route(web::post().to(register)))
        .service(web::resource("/api/auth/login").route(web::post().to(login)));
}

async fn register(
    state: web::Data<AppState>,
    payload: web::Json<NewUser>,
) -> Result<HttpResponse, ApiError> {
    let mut payload = payload.into_inner();
    if payload.email.trim().is_empty() || !payload.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid request data".to_string()));
    }
    if payload.password.len() < 6 {
        return Err(ApiError::BadRequest("Invalid request data".to_string()));
    }
    // Self-registration always yields a customer account. Barber and admin
    // accounts are provisioned through seeding.
    payload.role = Some(ROLE_CUSTOMER.to_string());

    // Duplicate check lives here, at the caller; the storage unique
    // constraint is the backstop.
    if state
        .storage
        .get_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateEmail);
    }

    payload.password =
        hash_password(&payload.password).map_err(|_| ApiError::Internal)?;
    let user = state.storage.create_user(payload).await?;
    let token = issue_token(&user, &state.jwt_secret).map_err(|_| ApiError::Internal)?;

    Ok(HttpResponse::Created().json(json!({
        "user": UserProfile::from(&user),
        "token": token,
    })))
}

async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginPayload>,
) -> Result<HttpResponse, ApiError> {
    if payload.email.trim().is_empty() || payload.password.len() < 6 {
        return Err(ApiError::BadRequest("Invalid request data".to_string()));
    }

    let user = state
        .storage
        .get_user_by_email(&payload.email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !verify_password(&payload.password, &user.password) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = issue_token(&user, &state.jwt_secret).map_err(|_| ApiError::Internal)?;

    Ok(HttpResponse::Ok().json(json!({
        "user": UserProfile::from(&user),
        "token": token,
    })))
}
