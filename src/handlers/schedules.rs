use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::Schedule;
use crate::error::AppError;
use crate::services::SeatMap;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateScheduleRequest {
    pub movie_id: Uuid,
    pub studio_id: Uuid,
    pub start_time: DateTime<Utc>,
    #[schema(value_type = String)]
    pub price: BigDecimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleRequest {
    pub start_time: DateTime<Utc>,
    #[schema(value_type = Option<String>)]
    pub price: Option<BigDecimal>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConflictCheckRequest {
    pub studio_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Schedule to ignore, used when checking a move of an existing one.
    pub exclude_schedule_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting: Vec<Schedule>,
}

#[utoipa::path(
    post,
    path = "/schedules",
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, description = "Schedule created with derived end time", body = Schedule),
        (status = 404, description = "Movie or studio not found"),
        (status = 409, description = "Overlaps another screening in the studio")
    ),
    tag = "Schedules"
)]
pub async fn create_schedule(
    State(state): State<AppState>,
    Json(payload): Json<CreateScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let schedule = state
        .schedules
        .create(payload.movie_id, payload.studio_id, payload.start_time, payload.price)
        .await?;

    Ok((StatusCode::CREATED, Json(schedule)))
}

#[utoipa::path(
    put,
    path = "/schedules/{id}",
    params(("id" = Uuid, Path, description = "Schedule id")),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Schedule moved", body = Schedule),
        (status = 404, description = "Schedule not found"),
        (status = 409, description = "New slot overlaps another screening")
    ),
    tag = "Schedules"
)]
pub async fn reschedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RescheduleRequest>,
) -> Result<Json<Schedule>, AppError> {
    let schedule = state
        .schedules
        .reschedule(id, payload.start_time, payload.price)
        .await?;

    Ok(Json(schedule))
}

#[utoipa::path(
    get,
    path = "/schedules/{id}/seats",
    params(("id" = Uuid, Path, description = "Schedule id")),
    responses(
        (status = 200, description = "Taken seats and remaining capacity", body = SeatMap),
        (status = 404, description = "Schedule not found")
    ),
    tag = "Schedules"
)]
pub async fn seat_map(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SeatMap>, AppError> {
    Ok(Json(state.schedules.seat_map(id).await?))
}

#[utoipa::path(
    post,
    path = "/schedules/conflicts",
    request_body = ConflictCheckRequest,
    responses(
        (status = 200, description = "Overlapping schedules, if any", body = ConflictCheckResponse),
        (status = 400, description = "End time is not after start time")
    ),
    tag = "Schedules"
)]
pub async fn check_conflicts(
    State(state): State<AppState>,
    Json(payload): Json<ConflictCheckRequest>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    let conflicting = state
        .schedules
        .find_conflicts(
            payload.studio_id,
            payload.start_time,
            payload.end_time,
            payload.exclude_schedule_id,
        )
        .await?;

    Ok(Json(ConflictCheckResponse {
        has_conflict: !conflicting.is_empty(),
        conflicting,
    }))
}
