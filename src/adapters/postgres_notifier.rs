//! In-app notification inbox backed by Postgres.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::Notification;
use crate::db::queries;
use crate::error::AppError;
use crate::ports::{BookingConfirmed, BookingNotifier};

pub const KIND_BOOKING_CONFIRMED: &str = "booking_confirmed";

#[derive(Clone)]
pub struct PostgresNotifier {
    pool: PgPool,
}

impl PostgresNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn confirmation_notification(event: &BookingConfirmed) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        user_id: event.user_id,
        kind: KIND_BOOKING_CONFIRMED.to_string(),
        title: "Booking confirmed".to_string(),
        message: format!(
            "Your tickets for {} are confirmed. Total paid: {}",
            event.movie_title, event.total_amount
        ),
        transaction_id: Some(event.transaction_id),
        is_read: false,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl BookingNotifier for PostgresNotifier {
    async fn notify_booking_confirmed(&self, event: BookingConfirmed) -> Result<(), AppError> {
        let notification = confirmation_notification(&event);
        queries::insert_notification(&self.pool, &notification).await?;

        tracing::debug!(
            user_id = %event.user_id,
            transaction_id = %event.transaction_id,
            "Booking confirmation stored"
        );
        Ok(())
    }
}
