use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{PaymentStatus, Transaction};
use crate::error::AppError;
use crate::handlers::Pagination;
use crate::services::{BookingDetails, CreateBooking};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    pub seat_numbers: Vec<i32>,
    pub payment_method: String,
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingCreated {
    pub transaction_id: Uuid,
    #[schema(value_type = String)]
    pub total_amount: BigDecimal,
    #[schema(value_type = String)]
    pub original_amount: BigDecimal,
    #[schema(value_type = String)]
    pub discount_amount: BigDecimal,
    pub payment_status: PaymentStatus,
}

impl From<Transaction> for BookingCreated {
    fn from(tx: Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            total_amount: tx.total_amount,
            original_amount: tx.original_amount,
            discount_amount: tx.discount_amount,
            payment_status: tx.payment_status,
        }
    }
}

#[utoipa::path(
    post,
    path = "/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created, payment pending", body = BookingCreated),
        (status = 400, description = "Malformed seat selection or payment method"),
        (status = 404, description = "Schedule or user not found"),
        (status = 409, description = "One or more seats are already booked"),
        (status = 422, description = "Capacity exceeded, bad seat number or promo rejected")
    ),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = state
        .bookings
        .create_transaction(CreateBooking {
            user_id: payload.user_id,
            schedule_id: payload.schedule_id,
            seat_numbers: payload.seat_numbers,
            payment_method: payload.payment_method,
            promo_code: payload.promo_code,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(BookingCreated::from(transaction))))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}",
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction with its tickets", body = BookingDetails),
        (status = 404, description = "Transaction not found")
    ),
    tag = "Bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetails>, AppError> {
    Ok(Json(state.bookings.get_booking(id).await?))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/bookings",
    params(
        ("user_id" = Uuid, Path, description = "Owning user"),
        ("limit" = Option<i64>, Query, description = "Page size, at most 100"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses((status = 200, description = "Newest transactions first", body = [Transaction])),
    tag = "Bookings"
)]
pub async fn list_user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = state
        .bookings
        .list_user_transactions(user_id, pagination.limit(), pagination.offset())
        .await?;

    Ok(Json(transactions))
}
