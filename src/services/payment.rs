//! Payment state machine.
//!
//! `pending` moves to `success` or `failed` exactly once. Two actors drive
//! it: an explicit payment result (strict, rejects anything but `pending`)
//! and the timeout job (idempotent, treats missing or resolved transactions
//! as already handled).

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{PaymentStatus, TicketStatus, Transaction};
use crate::db::{queries, UnitOfWork};
use crate::error::AppError;
use crate::ports::{BookingConfirmed, BookingNotifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "status", rename_all = "snake_case")]
pub enum TimeoutOutcome {
    /// The transaction no longer exists.
    NotFound,
    /// A payment result arrived before the timer fired.
    AlreadyResolved(PaymentStatus),
    /// The transaction was force-failed and its tickets cancelled.
    Expired,
}

#[derive(Clone)]
pub struct PaymentService {
    pool: PgPool,
    notifier: Arc<dyn BookingNotifier>,
}

impl PaymentService {
    pub fn new(pool: PgPool, notifier: Arc<dyn BookingNotifier>) -> Self {
        Self { pool, notifier }
    }

    /// Applies an explicit payment result. Only legal from `pending`.
    pub async fn set_payment_status(
        &self,
        transaction_id: Uuid,
        target: PaymentStatus,
    ) -> Result<Transaction, AppError> {
        let mut uow = self.pool.begin().await?;

        let current = queries::lock_transaction(&mut uow, transaction_id)
            .await?
            .ok_or(AppError::TransactionNotFound(transaction_id))?;
        if !current.payment_status.can_transition_to(target) {
            tracing::warn!(
                transaction_id = %transaction_id,
                from = %current.payment_status,
                to = %target,
                "Rejected payment status change"
            );
            return Err(AppError::invalid_payment_transition(current.payment_status, target));
        }

        let updated = apply_transition(&mut uow, transaction_id, target).await?;

        let confirmation = if target == PaymentStatus::Success {
            let movie_title = queries::movie_title_for_transaction(&mut *uow, transaction_id)
                .await?
                .unwrap_or_default();
            Some(BookingConfirmed {
                user_id: updated.user_id,
                transaction_id,
                movie_title,
                total_amount: updated.total_amount.clone(),
            })
        } else {
            None
        };

        uow.commit().await?;

        tracing::info!(
            transaction_id = %transaction_id,
            payment_status = %updated.payment_status,
            "Payment status updated"
        );

        if let Some(event) = confirmation {
            self.dispatch_confirmation(event);
        }

        Ok(updated)
    }

    /// Handles a delivered payment-timeout job. Safe to call any number of
    /// times for the same transaction.
    pub async fn expire_payment(&self, transaction_id: Uuid) -> Result<TimeoutOutcome, AppError> {
        let mut uow = self.pool.begin().await?;

        let Some(current) = queries::lock_transaction(&mut uow, transaction_id).await? else {
            tracing::debug!(transaction_id = %transaction_id, "Timeout for unknown transaction ignored");
            return Ok(TimeoutOutcome::NotFound);
        };
        if current.payment_status.is_terminal() {
            tracing::debug!(
                transaction_id = %transaction_id,
                payment_status = %current.payment_status,
                "Timeout for resolved transaction ignored"
            );
            return Ok(TimeoutOutcome::AlreadyResolved(current.payment_status));
        }

        apply_transition(&mut uow, transaction_id, PaymentStatus::Failed).await?;
        uow.commit().await?;

        tracing::info!(transaction_id = %transaction_id, "Payment window expired, booking released");
        Ok(TimeoutOutcome::Expired)
    }

    /// Fails pending transactions older than `older_than`. Catches bookings
    /// whose timeout job was never enqueued.
    pub async fn sweep_stale_pending(
        &self,
        older_than: chrono::Duration,
        limit: i64,
    ) -> Result<Vec<Uuid>, AppError> {
        let cutoff = Utc::now() - older_than;
        let mut uow = self.pool.begin().await?;

        let stale = queries::lock_stale_pending_transactions(&mut uow, cutoff, limit).await?;
        for id in &stale {
            apply_transition(&mut uow, *id, PaymentStatus::Failed).await?;
        }
        uow.commit().await?;

        if !stale.is_empty() {
            tracing::warn!(count = stale.len(), cutoff = %cutoff, "Expired stale pending transactions");
        }
        Ok(stale)
    }

    fn dispatch_confirmation(&self, event: BookingConfirmed) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let transaction_id = event.transaction_id;
            if let Err(e) = notifier.notify_booking_confirmed(event).await {
                tracing::error!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Failed to send booking confirmation"
                );
            }
        });
    }
}

/// Writes the new payment status and moves the pending tickets with it.
async fn apply_transition(
    uow: &mut UnitOfWork<'_>,
    transaction_id: Uuid,
    target: PaymentStatus,
) -> Result<Transaction, AppError> {
    let updated = queries::update_payment_status(uow, transaction_id, target).await?;
    let moved = queries::cascade_ticket_status(
        uow,
        transaction_id,
        TicketStatus::Pending,
        target.ticket_status(),
    )
    .await?;

    tracing::debug!(
        transaction_id = %transaction_id,
        status = %target,
        tickets = moved,
        "Ticket statuses cascaded"
    );
    Ok(updated)
}
