//! Out-of-process collaborators the booking core depends on.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;

/// Delayed job queue that later delivers the payment timeout for a
/// transaction to a worker, at least once.
#[async_trait]
pub trait PaymentTimeoutScheduler: Send + Sync {
    async fn schedule_payment_timeout(&self, transaction_id: Uuid, delay: Duration) -> Result<(), AppError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfirmed {
    pub user_id: Uuid,
    pub transaction_id: Uuid,
    pub movie_title: String,
    pub total_amount: BigDecimal,
}

/// Fire-and-forget sink for booking confirmations.
#[async_trait]
pub trait BookingNotifier: Send + Sync {
    async fn notify_booking_confirmed(&self, event: BookingConfirmed) -> Result<(), AppError>;
}
