//! Booking engine: turns a seat request into a pending transaction and its
//! tickets inside one unit of work.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{Promo, PromoUsage, ScheduleDetails, Ticket, Transaction};
use crate::db::{queries, UnitOfWork};
use crate::error::AppError;
use crate::ports::PaymentTimeoutScheduler;
use crate::services::promo::{self, PromoRejection, PromoRequest};
use crate::validation::{normalize_payment_method, normalize_promo_code, validate_seat_selection};

/// Name of the partial unique index guarding live seats.
const ACTIVE_SEAT_INDEX: &str = "tickets_active_seat_key";

#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    pub seat_numbers: Vec<i32>,
    pub payment_method: String,
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingDetails {
    pub transaction: Transaction,
    pub tickets: Vec<Ticket>,
}

/// Rejects seat requests that cannot fit the studio.
pub fn check_seats_against_capacity(seat_numbers: &[i32], capacity: i32) -> Result<(), AppError> {
    if seat_numbers.len() > capacity.max(0) as usize {
        return Err(AppError::CapacityExceeded {
            requested: seat_numbers.len(),
            capacity,
        });
    }

    if let Some(&seat) = seat_numbers.iter().find(|&&seat| seat < 1 || seat > capacity) {
        return Err(AppError::InvalidSeatNumber { seat, capacity });
    }

    Ok(())
}

/// `seat_count × price`, the amount before any discount.
pub fn original_amount(seat_count: usize, price: &BigDecimal) -> BigDecimal {
    BigDecimal::from(seat_count as u64) * price
}

#[derive(Clone)]
pub struct BookingService {
    pool: PgPool,
    timeouts: Arc<dyn PaymentTimeoutScheduler>,
    payment_timeout: Duration,
}

impl BookingService {
    pub fn new(pool: PgPool, timeouts: Arc<dyn PaymentTimeoutScheduler>, payment_timeout: Duration) -> Self {
        Self {
            pool,
            timeouts,
            payment_timeout,
        }
    }

    pub async fn create_transaction(&self, input: CreateBooking) -> Result<Transaction, AppError> {
        validate_seat_selection(&input.seat_numbers)?;
        let payment_method = normalize_payment_method(&input.payment_method)?;
        let promo_code = input
            .promo_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
            .map(normalize_promo_code)
            .transpose()?;

        let mut uow = self.pool.begin().await?;

        let schedule = queries::lock_schedule_details(&mut uow, input.schedule_id)
            .await?
            .ok_or(AppError::ScheduleNotFound(input.schedule_id))?;
        check_seats_against_capacity(&input.seat_numbers, schedule.seat_capacity)?;

        let taken = queries::find_taken_seats(&mut *uow, schedule.id, &input.seat_numbers).await?;
        if !taken.is_empty() {
            return Err(AppError::SeatsAlreadyBooked(taken));
        }

        let original = original_amount(input.seat_numbers.len(), &schedule.price);
        let applied_promo = match &promo_code {
            Some(code) => Some(
                self.resolve_promo(&mut uow, code, &schedule, input.seat_numbers.len(), &original)
                    .await?,
            ),
            None => None,
        };
        let discount = applied_promo
            .as_ref()
            .map(|(_, discount)| discount.clone())
            .unwrap_or_else(|| BigDecimal::from(0));

        let transaction = Transaction::new(
            input.user_id,
            original,
            discount,
            payment_method,
            applied_promo.as_ref().map(|(promo, _)| promo.id),
        );
        let user_id = transaction.user_id;
        let transaction = queries::insert_transaction(&mut uow, &transaction)
            .await
            .map_err(|e| map_unknown_user(e, user_id))?;

        for &seat in &input.seat_numbers {
            let ticket = Ticket::pending(transaction.id, schedule.id, seat, schedule.price.clone());
            queries::insert_ticket(&mut uow, &ticket)
                .await
                .map_err(|e| map_seat_conflict(e, seat))?;
        }

        if let Some((promo, discount)) = &applied_promo {
            record_promo_usage(&mut uow, promo, &transaction, discount).await?;
        }

        uow.commit().await?;

        tracing::info!(
            transaction_id = %transaction.id,
            schedule_id = %schedule.id,
            user_id = %transaction.user_id,
            seats = ?input.seat_numbers,
            total_amount = %transaction.total_amount,
            "Booking created"
        );

        // The booking stands even if the safety-net timer cannot be registered.
        if let Err(e) = self
            .timeouts
            .schedule_payment_timeout(transaction.id, self.payment_timeout)
            .await
        {
            tracing::error!(
                transaction_id = %transaction.id,
                error = %e,
                "Failed to schedule payment timeout"
            );
        }

        Ok(transaction)
    }

    async fn resolve_promo(
        &self,
        uow: &mut UnitOfWork<'_>,
        code: &str,
        schedule: &ScheduleDetails,
        ticket_count: usize,
        original: &BigDecimal,
    ) -> Result<(Promo, BigDecimal), AppError> {
        let promo = queries::lock_promo_by_code(uow, code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Promo {} not found", code)))?;
        let eligible_movies = queries::promo_movie_ids(&mut **uow, promo.id).await?;

        let movie_ids = [schedule.movie_id];
        let request = PromoRequest {
            ticket_count,
            total_amount: original,
            movie_ids: &movie_ids,
        };
        let discount = promo::evaluate(&promo, &eligible_movies, &request, Utc::now())?;
        Ok((promo, discount))
    }

    pub async fn get_booking(&self, transaction_id: Uuid) -> Result<BookingDetails, AppError> {
        let transaction = queries::get_transaction(&self.pool, transaction_id)
            .await?
            .ok_or(AppError::TransactionNotFound(transaction_id))?;
        let tickets = queries::list_tickets_for_transaction(&self.pool, transaction_id).await?;

        Ok(BookingDetails { transaction, tickets })
    }

    pub async fn list_user_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(queries::list_transactions_for_user(&self.pool, user_id, limit, offset).await?)
    }
}

async fn record_promo_usage(
    uow: &mut UnitOfWork<'_>,
    promo: &Promo,
    transaction: &Transaction,
    discount: &BigDecimal,
) -> Result<(), AppError> {
    if !queries::increment_promo_usage(uow, promo.id).await? {
        return Err(PromoRejection::UsageLimitReached.into());
    }

    let usage = PromoUsage {
        id: Uuid::new_v4(),
        promo_id: promo.id,
        user_id: transaction.user_id,
        transaction_id: transaction.id,
        discount_amount: discount.clone(),
        used_at: Utc::now(),
    };
    queries::insert_promo_usage(uow, &usage).await?;

    tracing::debug!(
        promo_id = %promo.id,
        transaction_id = %transaction.id,
        discount = %discount,
        "Promo applied"
    );
    Ok(())
}

/// A unique violation on the live-seat index means a concurrent booking won
/// the seat between our check and insert.
fn map_seat_conflict(err: sqlx::Error, seat: i32) -> AppError {
    match &err {
        sqlx::Error::Database(db_err)
            if db_err.is_unique_violation() && db_err.constraint() == Some(ACTIVE_SEAT_INDEX) =>
        {
            AppError::SeatsAlreadyBooked(vec![seat])
        }
        _ => AppError::Database(err),
    }
}

fn map_unknown_user(err: sqlx::Error, user_id: Uuid) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            AppError::NotFound(format!("User {} not found", user_id))
        }
        _ => AppError::Database(err),
    }
}
