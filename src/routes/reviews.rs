use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;

use crate::{
    auth::{bearer_validator, AuthUser},
    error::ApiError,
    models::{NewReview, ROLE_CUSTOMER},
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/reviews")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .route(web::post().to(create_review)),
    )
    .service(
        web::resource("/api/barbers/{barber_id}/reviews")
            .route(web::get().to(list_barber_reviews)),
    );
}

async fn create_review(
    state: web::Data<AppState>,
    payload: web::Json<NewReview>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    if !(1..=5).contains(&payload.rating) {
        return Err(ApiError::BadRequest(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    if auth.role == ROLE_CUSTOMER && payload.customer_id != auth.id {
        return Err(ApiError::Forbidden);
    }

    let review = state.storage.create_review(payload).await?;
    Ok(HttpResponse::Created().json(review))
}

async fn list_barber_reviews(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let reviews = state.storage.barber_reviews(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reviews))
}
