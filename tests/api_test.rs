mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bigdecimal::BigDecimal;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use cinema_booking_core::{create_app, AppState};
use common::*;

fn app(pool: &PgPool) -> Router {
    let state = AppState::new(
        pool.clone(),
        &test_config(),
        Arc::new(RecordingScheduler::default()),
        Arc::new(RecordingNotifier::default()),
    );
    create_app(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn amount(value: &Value) -> BigDecimal {
    BigDecimal::from_str(value.as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_booking_and_payment_over_http() {
    let (pool, _container) = setup_db().await;
    let screening = seed_screening(&pool, 10, "75000").await;
    let app = app(&pool);

    let (status, body) = send(
        &app,
        "POST",
        "/bookings",
        Some(json!({
            "user_id": screening.user_id,
            "schedule_id": screening.schedule_id,
            "seat_numbers": [1, 2, 3],
            "payment_method": "credit_card"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["payment_status"], "pending");
    assert_eq!(amount(&body["total_amount"]), money("225000"));
    assert_eq!(amount(&body["discount_amount"]), money("0"));
    let tx_id = body["transaction_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/bookings",
        Some(json!({
            "user_id": screening.user_id,
            "schedule_id": screening.schedule_id,
            "seat_numbers": [3, 4],
            "payment_method": "credit_card"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SEATS_ALREADY_BOOKED");
    assert_eq!(body["seats"], json!([3]));

    let uri = format!("/admin/transactions/{}/payment-status", tx_id);
    let (status, body) = send(&app, "POST", &uri, Some(json!({ "status": "success" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction_id"], tx_id.as_str());
    assert_eq!(body["payment_status"], "success");

    let (status, body) = send(&app, "POST", &uri, Some(json!({ "status": "failed" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE_TRANSITION");

    let (status, body) = send(&app, "GET", &format!("/bookings/{}", tx_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let tickets = body["tickets"].as_array().unwrap();
    assert_eq!(tickets.len(), 3);
    assert!(tickets.iter().all(|t| t["status"] == "active"));

    let ticket_id = tickets[0]["id"].as_str().unwrap();
    let (status, body) = send(&app, "POST", &format!("/tickets/{}/redeem", ticket_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "used");

    let (status, body) = send(
        &app,
        "GET",
        &format!("/users/{}/bookings?limit=5", screening.user_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_responses() {
    let (pool, _container) = setup_db().await;
    let screening = seed_screening(&pool, 4, "75000").await;
    let app = app(&pool);

    let (status, body) = send(&app, "GET", &format!("/bookings/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TRANSACTION_NOT_FOUND");
    assert_eq!(body["status"], 404);

    let (status, body) = send(
        &app,
        "POST",
        "/bookings",
        Some(json!({
            "user_id": screening.user_id,
            "schedule_id": screening.schedule_id,
            "seat_numbers": [5],
            "payment_method": "credit_card"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_SEAT_NUMBER");

    let (status, body) = send(
        &app,
        "POST",
        "/bookings",
        Some(json!({
            "user_id": screening.user_id,
            "schedule_id": screening.schedule_id,
            "seat_numbers": [1],
            "payment_method": "cash"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        "POST",
        "/bookings",
        Some(json!({
            "user_id": screening.user_id,
            "schedule_id": screening.schedule_id,
            "seat_numbers": [1],
            "payment_method": "credit_card",
            "promo_code": "nope"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/admin/transactions/{}/payment-status", Uuid::new_v4()),
        Some(json!({ "status": "success" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TRANSACTION_NOT_FOUND");

    assert_eq!(count_rows(&pool, "transactions").await, 0);
}

#[tokio::test]
async fn test_promo_preview() {
    let (pool, _container) = setup_db().await;
    insert_promo(
        &pool,
        PromoFixture {
            code: "HALFOFF",
            value: "50",
            max_discount: Some("50000"),
            ..Default::default()
        },
    )
    .await;
    let app = app(&pool);

    let (status, body) = send(
        &app,
        "POST",
        "/promos/validate",
        Some(json!({
            "code": "halfoff",
            "ticket_count": 2,
            "total_amount": "200000"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(amount(&body["discount_amount"]), money("50000"));
    assert_eq!(amount(&body["final_amount"]), money("150000"));

    let (status, body) = send(
        &app,
        "POST",
        "/promos/validate",
        Some(json!({
            "code": "MISSING",
            "ticket_count": 2,
            "total_amount": "200000"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "promo code not found");

    // Previews never consume the promo.
    let usage_count: i32 = sqlx::query_scalar("SELECT usage_count FROM promos WHERE code = 'HALFOFF'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(usage_count, 0);
}

#[tokio::test]
async fn test_schedule_endpoints() {
    let (pool, _container) = setup_db().await;
    let movie = insert_movie(&pool, "Night Train", 90).await;
    let studio = insert_studio(&pool, 30).await;
    let app = app(&pool);

    let (status, body) = send(
        &app,
        "POST",
        "/schedules",
        Some(json!({
            "movie_id": movie,
            "studio_id": studio,
            "start_time": "2030-05-01T18:00:00Z",
            "price": "50000"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["end_time"], "2030-05-01T20:00:00Z");
    let schedule_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/schedules",
        Some(json!({
            "movie_id": movie,
            "studio_id": studio,
            "start_time": "2030-05-01T19:00:00Z",
            "price": "50000"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SCHEDULE_CONFLICT");
    assert_eq!(body["conflicting"], json!([schedule_id]));

    let (status, body) = send(
        &app,
        "POST",
        "/schedules/conflicts",
        Some(json!({
            "studio_id": studio,
            "start_time": "2030-05-01T20:00:00Z",
            "end_time": "2030-05-01T21:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_conflict"], false);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/schedules/{}", schedule_id),
        Some(json!({ "start_time": "2030-05-01T18:30:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["end_time"], "2030-05-01T20:30:00Z");

    let (status, body) = send(&app, "GET", &format!("/schedules/{}/seats", schedule_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seat_capacity"], 30);
    assert_eq!(body["available_count"], 30);
}

#[tokio::test]
async fn test_health_and_openapi() {
    let (pool, _container) = setup_db().await;
    let app = app(&pool);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dependencies"]["postgres"]["status"], "healthy");
    assert_ne!(body["status"], "unhealthy");

    let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/bookings"].is_object());
}
