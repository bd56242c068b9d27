use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::PaymentStatus;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("Schedule {0} not found")]
    ScheduleNotFound(Uuid),

    #[error("Transaction {0} not found")]
    TransactionNotFound(Uuid),

    #[error("Ticket {0} not found")]
    TicketNotFound(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Requested {requested} seats but the studio only has {capacity}")]
    CapacityExceeded { requested: usize, capacity: i32 },

    #[error("Seat {seat} is outside the studio range 1..={capacity}")]
    InvalidSeatNumber { seat: i32, capacity: i32 },

    #[error("Seats already booked: {}", format_seats(.0))]
    SeatsAlreadyBooked(Vec<i32>),

    #[error("Cannot move payment from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Promo rejected: {0}")]
    PromoRejected(String),

    #[error("Schedule overlaps {} existing schedule(s) in this studio", .conflicting.len())]
    ScheduleConflict { conflicting: Vec<Uuid> },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

fn format_seats(seats: &[i32]) -> String {
    seats
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl AppError {
    pub fn invalid_payment_transition(from: PaymentStatus, to: PaymentStatus) -> Self {
        AppError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Queue(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ScheduleNotFound(_)
            | AppError::TransactionNotFound(_)
            | AppError::TicketNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::CapacityExceeded { .. }
            | AppError::InvalidSeatNumber { .. }
            | AppError::PromoRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SeatsAlreadyBooked(_)
            | AppError::InvalidStateTransition { .. }
            | AppError::ScheduleConflict { .. } => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Queue(_) => "QUEUE_ERROR",
            AppError::ScheduleNotFound(_) => "SCHEDULE_NOT_FOUND",
            AppError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            AppError::TicketNotFound(_) => "TICKET_NOT_FOUND",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            AppError::InvalidSeatNumber { .. } => "INVALID_SEAT_NUMBER",
            AppError::SeatsAlreadyBooked(_) => "SEATS_ALREADY_BOOKED",
            AppError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            AppError::PromoRejected(_) => "PROMO_REJECTED",
            AppError::ScheduleConflict { .. } => "SCHEDULE_CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to API clients.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Queue(_) => "A queue error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let mut body = json!({
            "error": self.public_message(),
            "code": self.code(),
            "status": status.as_u16(),
        });
        match &self {
            AppError::SeatsAlreadyBooked(seats) => body["seats"] = json!(seats),
            AppError::ScheduleConflict { conflicting } => body["conflicting"] = json!(conflicting),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_errors_map_to_404() {
        let id = Uuid::new_v4();
        assert_eq!(AppError::ScheduleNotFound(id).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::TransactionNotFound(id).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::TicketNotFound(id).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_seat_errors_are_client_errors() {
        let capacity = AppError::CapacityExceeded {
            requested: 12,
            capacity: 10,
        };
        assert_eq!(capacity.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(capacity.code(), "CAPACITY_EXCEEDED");

        let booked = AppError::SeatsAlreadyBooked(vec![3, 4]);
        assert_eq!(booked.status_code(), StatusCode::CONFLICT);
        assert_eq!(booked.to_string(), "Seats already booked: 3, 4");
    }

    #[test]
    fn test_invalid_transition_message() {
        let error = AppError::invalid_payment_transition(PaymentStatus::Success, PaymentStatus::Failed);
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.to_string(), "Cannot move payment from success to failed");
    }

    #[test]
    fn test_database_error_status_code() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "A database error occurred");
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let error = AppError::Validation("seat_numbers must not be empty".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_conflict_error_response() {
        let error = AppError::ScheduleConflict {
            conflicting: vec![Uuid::new_v4()],
        };
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
