use std::sync::Arc;

use actix_web::{
    dev::{Service, ServiceResponse},
    http::StatusCode,
    middleware, test, web, App, Error,
};
use serde_json::{json, Value};

use barberpro::{configure_api, json_config, state::AppState, storage::MemStorage};

const TEST_SECRET: &str = "test-secret";

async fn spawn_app() -> impl Service<actix_http::Request, Response = ServiceResponse, Error = Error> {
    let storage = Arc::new(MemStorage::with_demo_data().unwrap());
    let state = AppState::new(storage, TEST_SECRET);
    test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .app_data(json_config())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_api),
    )
    .await
}

async fn register(
    app: &impl Service<actix_http::Request, Response = ServiceResponse, Error = Error>,
    email: &str,
) -> (i64, String) {
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "firstName": "John",
            "lastName": "Doe",
            "email": email,
            "password": "secret1"
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    (
        body["user"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

#[actix_web::test]
async fn register_login_book_and_list_round_trip() {
    let app = spawn_app().await;
    let (user_id, _) = register(&app, "john@x.com").await;

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "john@x.com", "password": "secret1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["user"]["email"], "john@x.com");
    assert!(body["user"].get("password").is_none());

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "customerId": user_id,
            "barberId": 1,
            "serviceId": 1,
            "appointmentDate": "2025-01-10T14:00:00Z",
            "totalPrice": "25.00",
            "status": "scheduled"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let appointment: Value = test::read_body_json(resp).await;
    let appointment_id = appointment["id"].as_i64().unwrap();
    assert_eq!(appointment["status"], "scheduled");

    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{user_id}/appointments"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let listed: Value = test::read_body_json(resp).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"].as_i64().unwrap(), appointment_id);
    assert_eq!(listed[0]["totalPrice"], "25.00");
    assert_eq!(listed[0]["customer"]["email"], "john@x.com");
    assert_eq!(listed[0]["barber"]["user"]["firstName"], "Mike");
    assert_eq!(listed[0]["service"]["name"], "Classic Cut");
}

#[actix_web::test]
async fn duplicate_registration_conflicts() {
    let app = spawn_app().await;
    register(&app, "john@x.com").await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "email": "john@x.com",
            "password": "secret2"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // The first account still authenticates.
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "john@x.com", "password": "secret1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn login_rejects_bad_credentials() {
    let app = spawn_app().await;
    register(&app, "john@x.com").await;

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "john@x.com", "password": "wrong-password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "nobody@x.com", "password": "secret1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn catalog_is_public_and_filters_by_category() {
    let app = spawn_app().await;

    let req = test::TestRequest::get().uri("/api/services").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let services: Value = test::read_body_json(resp).await;
    assert_eq!(services.as_array().unwrap().len(), 6);

    let req = test::TestRequest::get()
        .uri("/api/services?category=styling")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let styling: Value = test::read_body_json(resp).await;
    let styling = styling.as_array().unwrap();
    assert_eq!(styling.len(), 3);
    assert!(styling.iter().all(|service| service["category"] == "styling"));

    let req = test::TestRequest::get().uri("/api/services/999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri("/api/barbers").to_request();
    let resp = test::call_service(&app, req).await;
    let barbers: Value = test::read_body_json(resp).await;
    let barbers = barbers.as_array().unwrap();
    assert_eq!(barbers.len(), 3);
    assert_eq!(barbers[0]["user"]["firstName"], "Mike");
    assert!(barbers[0]["user"].get("password").is_none());

    let req = test::TestRequest::get().uri("/api/barbers/999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn booking_requires_a_token() {
    let app = spawn_app().await;
    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(json!({
            "customerId": 1,
            "barberId": 1,
            "serviceId": 1,
            "appointmentDate": "2025-01-10T14:00:00Z",
            "totalPrice": "25.00"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn customers_cannot_act_for_other_customers() {
    let app = spawn_app().await;
    let (user_id, token) = register(&app, "john@x.com").await;
    let (other_id, _) = register(&app, "jane@x.com").await;

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "customerId": other_id,
            "barberId": 1,
            "serviceId": 1,
            "appointmentDate": "2025-01-10T14:00:00Z",
            "totalPrice": "25.00"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{other_id}/appointments"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    assert_ne!(user_id, other_id);
}

#[actix_web::test]
async fn registration_cannot_claim_an_elevated_role() {
    let app = spawn_app().await;
    let (victim_id, _) = register(&app, "victim@x.com").await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "firstName": "Eve",
            "lastName": "Mallory",
            "email": "eve@x.com",
            "password": "secret1",
            "role": "admin"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["role"], "customer");
    let token = body["token"].as_str().unwrap().to_string();

    // The downgraded token must not pass the admin exemption on
    // user-scoped reads.
    let req = test::TestRequest::get()
        .uri(&format!("/api/users/{victim_id}/appointments"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn status_update_is_scoped_to_the_appointment_parties() {
    let app = spawn_app().await;
    let (owner_id, owner_token) = register(&app, "owner@x.com").await;
    let (_, stranger_token) = register(&app, "stranger@x.com").await;

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .insert_header(("Authorization", format!("Bearer {owner_token}")))
        .set_json(json!({
            "customerId": owner_id,
            "barberId": 1,
            "serviceId": 1,
            "appointmentDate": "2025-01-10T14:00:00Z",
            "totalPrice": "25.00"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let appointment: Value = test::read_body_json(resp).await;
    let id = appointment["id"].as_i64().unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/appointments/{id}/status"))
        .insert_header(("Authorization", format!("Bearer {stranger_token}")))
        .set_json(json!({ "status": "cancelled" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Untouched by the rejected write, and still manageable by its owner.
    let req = test::TestRequest::patch()
        .uri(&format!("/api/appointments/{id}/status"))
        .insert_header(("Authorization", format!("Bearer {owner_token}")))
        .set_json(json!({ "status": "cancelled" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = test::read_body_json(resp).await;
    assert_eq!(updated["status"], "cancelled");
}

#[actix_web::test]
async fn status_update_overwrites_and_404s_for_missing() {
    let app = spawn_app().await;
    let (user_id, token) = register(&app, "john@x.com").await;

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "customerId": user_id,
            "barberId": 1,
            "serviceId": 1,
            "appointmentDate": "2025-01-10T14:00:00Z",
            "totalPrice": "25.00"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let appointment: Value = test::read_body_json(resp).await;
    let id = appointment["id"].as_i64().unwrap();

    for status in ["completed", "scheduled"] {
        let req = test::TestRequest::patch()
            .uri(&format!("/api/appointments/{id}/status"))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({ "status": status }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let updated: Value = test::read_body_json(resp).await;
        assert_eq!(updated["status"], status);
    }

    let req = test::TestRequest::patch()
        .uri(&format!("/api/appointments/{id}/status"))
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::patch()
        .uri("/api/appointments/999/status")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "status": "cancelled" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn reviews_drive_the_barber_rating() {
    let app = spawn_app().await;
    let (user_id, token) = register(&app, "john@x.com").await;

    for rating in [5, 3] {
        let req = test::TestRequest::post()
            .uri("/api/reviews")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({
                "appointmentId": 1,
                "customerId": user_id,
                "barberId": 1,
                "rating": rating
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get().uri("/api/barbers/1").to_request();
    let resp = test::call_service(&app, req).await;
    let barber: Value = test::read_body_json(resp).await;
    assert_eq!(barber["rating"], "4.0");
    assert_eq!(barber["reviewCount"].as_i64().unwrap(), 2);

    let req = test::TestRequest::get()
        .uri("/api/barbers/1/reviews")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let reviews: Value = test::read_body_json(resp).await;
    let reviews = reviews.as_array().unwrap();
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[0]["customer"]["email"], "john@x.com");
}

#[actix_web::test]
async fn out_of_range_rating_is_rejected() {
    let app = spawn_app().await;
    let (user_id, token) = register(&app, "john@x.com").await;

    for rating in [0, 6] {
        let req = test::TestRequest::post()
            .uri("/api/reviews")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({
                "appointmentId": 1,
                "customerId": user_id,
                "barberId": 1,
                "rating": rating
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

#[actix_web::test]
async fn malformed_json_payloads_get_a_uniform_400() {
    let app = spawn_app().await;
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "firstName": "John" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid request data");
}

#[actix_web::test]
async fn barber_day_filter_limits_results() {
    let app = spawn_app().await;
    let (user_id, token) = register(&app, "john@x.com").await;

    for date in [
        "2025-01-10T09:00:00Z",
        "2025-01-10T16:00:00Z",
        "2025-01-12T09:00:00Z",
    ] {
        let req = test::TestRequest::post()
            .uri("/api/appointments")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({
                "customerId": user_id,
                "barberId": 1,
                "serviceId": 1,
                "appointmentDate": date,
                "totalPrice": "25.00"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/api/barbers/1/appointments?date=2025-01-10")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let filtered: Value = test::read_body_json(resp).await;
    assert_eq!(filtered.as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/barbers/1/appointments")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let all: Value = test::read_body_json(resp).await;
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 3);
    // Ascending for the barber view.
    assert!(all[0]["appointmentDate"].as_str().unwrap() < all[2]["appointmentDate"].as_str().unwrap());
}
