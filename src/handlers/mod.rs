pub mod bookings;
pub mod payments;
pub mod promos;
pub mod schedules;
pub mod tickets;

use crate::db::models::{PaymentStatus, Schedule, Ticket, TicketStatus, Transaction};
use crate::health::{self, HealthResponse, PostgresChecker, RedisChecker};
use crate::services::{BookingDetails, PromoEvaluation, SeatMap};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use utoipa::OpenApi;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        bookings::create_booking,
        bookings::get_booking,
        bookings::list_user_bookings,
        payments::set_payment_status,
        promos::validate_promo,
        schedules::create_schedule,
        schedules::reschedule,
        schedules::seat_map,
        schedules::check_conflicts,
        tickets::redeem_ticket,
    ),
    components(schemas(
        HealthResponse,
        PaymentStatus,
        TicketStatus,
        Transaction,
        Ticket,
        Schedule,
        BookingDetails,
        PromoEvaluation,
        SeatMap,
        bookings::CreateBookingRequest,
        bookings::BookingCreated,
        payments::SetPaymentStatusRequest,
        payments::PaymentStatusChanged,
        promos::ValidatePromoRequest,
        schedules::CreateScheduleRequest,
        schedules::RescheduleRequest,
        schedules::ConflictCheckRequest,
        schedules::ConflictCheckResponse,
    )),
    tags(
        (name = "Health", description = "Liveness and dependency checks"),
        (name = "Bookings", description = "Seat booking and transactions"),
        (name = "Payments", description = "Payment result handling"),
        (name = "Promos", description = "Promo code previews"),
        (name = "Schedules", description = "Screening schedules and seat maps"),
        (name = "Tickets", description = "Ticket redemption")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy or degraded", body = HealthResponse),
        (status = 503, description = "Database is unreachable", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = health::check_health(
        PostgresChecker::new(state.db.clone()),
        RedisChecker::new(state.redis_url.clone()),
        state.start_time,
    )
    .await;

    // Only a database outage takes the service down.
    let status_code = if response.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}
