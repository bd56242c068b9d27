use chrono::{DateTime, Utc};
use sqlx::postgres::PgExecutor;
use sqlx::{PgPool, Result};
use uuid::Uuid;

use crate::db::models::{
    Movie, Notification, PaymentStatus, Promo, PromoUsage, Schedule, ScheduleDetails, Studio,
    Ticket, TicketStatus, Transaction,
};
use crate::db::UnitOfWork;

const SCHEDULE_DETAILS_SELECT: &str = r#"
    SELECT s.id, s.movie_id, m.title AS movie_title, s.studio_id, st.seat_capacity,
           s.start_time, s.end_time, s.price
    FROM schedules s
    JOIN movies m ON m.id = s.movie_id
    JOIN studios st ON st.id = s.studio_id
    WHERE s.id = $1
"#;

// --- Catalog lookups ---

pub async fn get_movie<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Movie>> {
    sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Locks the studio row so schedule writes for one studio serialize.
pub async fn lock_studio(executor: &mut UnitOfWork<'_>, id: Uuid) -> Result<Option<Studio>> {
    sqlx::query_as::<_, Studio>("SELECT * FROM studios WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

// --- Schedule queries ---

pub async fn get_schedule_details<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<ScheduleDetails>> {
    sqlx::query_as::<_, ScheduleDetails>(SCHEDULE_DETAILS_SELECT)
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Loads the schedule with its capacity and holds a row lock on it until the
/// unit of work ends, serializing concurrent bookings of one screening.
pub async fn lock_schedule_details(
    executor: &mut UnitOfWork<'_>,
    id: Uuid,
) -> Result<Option<ScheduleDetails>> {
    let sql = format!("{} FOR UPDATE OF s", SCHEDULE_DETAILS_SELECT);
    sqlx::query_as::<_, ScheduleDetails>(&sql)
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn lock_schedule(executor: &mut UnitOfWork<'_>, id: Uuid) -> Result<Option<Schedule>> {
    sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

/// Schedules in `studio_id` whose `[start_time, end_time)` overlaps `[start, end)`.
pub async fn find_overlapping_schedules<'e, E: PgExecutor<'e>>(
    executor: E,
    studio_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Result<Vec<Schedule>> {
    sqlx::query_as::<_, Schedule>(
        r#"
        SELECT * FROM schedules
        WHERE studio_id = $1
        AND start_time < $3
        AND end_time > $2
        AND ($4::uuid IS NULL OR id <> $4)
        ORDER BY start_time
        "#,
    )
    .bind(studio_id)
    .bind(start)
    .bind(end)
    .bind(exclude)
    .fetch_all(executor)
    .await
}

pub async fn insert_schedule(executor: &mut UnitOfWork<'_>, schedule: &Schedule) -> Result<Schedule> {
    sqlx::query_as::<_, Schedule>(
        r#"
        INSERT INTO schedules (
            id, movie_id, studio_id, start_time, end_time, show_date, price, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(schedule.id)
    .bind(schedule.movie_id)
    .bind(schedule.studio_id)
    .bind(schedule.start_time)
    .bind(schedule.end_time)
    .bind(schedule.show_date)
    .bind(&schedule.price)
    .bind(schedule.created_at)
    .bind(schedule.updated_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn update_schedule(executor: &mut UnitOfWork<'_>, schedule: &Schedule) -> Result<Schedule> {
    sqlx::query_as::<_, Schedule>(
        r#"
        UPDATE schedules
        SET start_time = $2, end_time = $3, show_date = $4, price = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(schedule.id)
    .bind(schedule.start_time)
    .bind(schedule.end_time)
    .bind(schedule.show_date)
    .bind(&schedule.price)
    .fetch_one(&mut **executor)
    .await
}

// --- Seat ledger ---

/// Requested seats that already hold a live ticket for the schedule.
pub async fn find_taken_seats<'e, E: PgExecutor<'e>>(
    executor: E,
    schedule_id: Uuid,
    seat_numbers: &[i32],
) -> Result<Vec<i32>> {
    sqlx::query_scalar::<_, i32>(
        r#"
        SELECT seat_number FROM tickets
        WHERE schedule_id = $1
        AND seat_number = ANY($2)
        AND status <> 'cancelled'
        ORDER BY seat_number
        "#,
    )
    .bind(schedule_id)
    .bind(seat_numbers)
    .fetch_all(executor)
    .await
}

pub async fn list_taken_seats<'e, E: PgExecutor<'e>>(executor: E, schedule_id: Uuid) -> Result<Vec<i32>> {
    sqlx::query_scalar::<_, i32>(
        "SELECT seat_number FROM tickets WHERE schedule_id = $1 AND status <> 'cancelled' ORDER BY seat_number",
    )
    .bind(schedule_id)
    .fetch_all(executor)
    .await
}

pub async fn insert_ticket(executor: &mut UnitOfWork<'_>, ticket: &Ticket) -> Result<Ticket> {
    sqlx::query_as::<_, Ticket>(
        r#"
        INSERT INTO tickets (
            id, transaction_id, schedule_id, seat_number, status, price, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(ticket.id)
    .bind(ticket.transaction_id)
    .bind(ticket.schedule_id)
    .bind(ticket.seat_number)
    .bind(ticket.status)
    .bind(&ticket.price)
    .bind(ticket.created_at)
    .bind(ticket.updated_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn list_tickets_for_transaction<'e, E: PgExecutor<'e>>(
    executor: E,
    transaction_id: Uuid,
) -> Result<Vec<Ticket>> {
    sqlx::query_as::<_, Ticket>(
        "SELECT * FROM tickets WHERE transaction_id = $1 ORDER BY seat_number",
    )
    .bind(transaction_id)
    .fetch_all(executor)
    .await
}

/// Moves every ticket of a transaction currently in `from` to `to`.
pub async fn cascade_ticket_status(
    executor: &mut UnitOfWork<'_>,
    transaction_id: Uuid,
    from: TicketStatus,
    to: TicketStatus,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE tickets SET status = $3, updated_at = NOW() WHERE transaction_id = $1 AND status = $2",
    )
    .bind(transaction_id)
    .bind(from)
    .bind(to)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn lock_ticket(executor: &mut UnitOfWork<'_>, id: Uuid) -> Result<Option<Ticket>> {
    sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn update_ticket_status(
    executor: &mut UnitOfWork<'_>,
    id: Uuid,
    status: TicketStatus,
) -> Result<Ticket> {
    sqlx::query_as::<_, Ticket>(
        "UPDATE tickets SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(&mut **executor)
    .await
}

// --- Transaction queries ---

pub async fn insert_transaction(executor: &mut UnitOfWork<'_>, tx: &Transaction) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, user_id, total_amount, original_amount, discount_amount,
            payment_method, payment_status, promo_id, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(&tx.total_amount)
    .bind(&tx.original_amount)
    .bind(&tx.discount_amount)
    .bind(&tx.payment_method)
    .bind(tx.payment_status)
    .bind(tx.promo_id)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn get_transaction<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn lock_transaction(executor: &mut UnitOfWork<'_>, id: Uuid) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn update_payment_status(
    executor: &mut UnitOfWork<'_>,
    id: Uuid,
    status: PaymentStatus,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        "UPDATE transactions SET payment_status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_one(&mut **executor)
    .await
}

pub async fn list_transactions_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Pending transactions created before `cutoff`. Rows locked by another
/// worker are skipped rather than waited on.
pub async fn lock_stale_pending_transactions(
    executor: &mut UnitOfWork<'_>,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM transactions
        WHERE payment_status = 'pending'
        AND created_at < $1
        ORDER BY created_at ASC
        LIMIT $2
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(&mut **executor)
    .await
}

/// Title of the movie the transaction's tickets were booked for.
pub async fn movie_title_for_transaction<'e, E: PgExecutor<'e>>(
    executor: E,
    transaction_id: Uuid,
) -> Result<Option<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT m.title FROM tickets t
        JOIN schedules s ON s.id = t.schedule_id
        JOIN movies m ON m.id = s.movie_id
        WHERE t.transaction_id = $1
        LIMIT 1
        "#,
    )
    .bind(transaction_id)
    .fetch_optional(executor)
    .await
}

// --- Promo queries ---

pub async fn get_promo_by_code<'e, E: PgExecutor<'e>>(executor: E, code: &str) -> Result<Option<Promo>> {
    sqlx::query_as::<_, Promo>("SELECT * FROM promos WHERE code = $1")
        .bind(code)
        .fetch_optional(executor)
        .await
}

pub async fn lock_promo_by_code(executor: &mut UnitOfWork<'_>, code: &str) -> Result<Option<Promo>> {
    sqlx::query_as::<_, Promo>("SELECT * FROM promos WHERE code = $1 FOR UPDATE")
        .bind(code)
        .fetch_optional(&mut **executor)
        .await
}

/// Movies a promo is restricted to. Empty means unrestricted.
pub async fn promo_movie_ids<'e, E: PgExecutor<'e>>(executor: E, promo_id: Uuid) -> Result<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>("SELECT movie_id FROM promo_movies WHERE promo_id = $1")
        .bind(promo_id)
        .fetch_all(executor)
        .await
}

/// Increments `usage_count` unless the limit is already reached. Returns
/// `false` when the guard rejected the increment.
pub async fn increment_promo_usage(executor: &mut UnitOfWork<'_>, promo_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE promos SET usage_count = usage_count + 1, updated_at = NOW()
        WHERE id = $1
        AND (usage_limit IS NULL OR usage_count < usage_limit)
        "#,
    )
    .bind(promo_id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn insert_promo_usage(executor: &mut UnitOfWork<'_>, usage: &PromoUsage) -> Result<PromoUsage> {
    sqlx::query_as::<_, PromoUsage>(
        r#"
        INSERT INTO promo_usages (id, promo_id, user_id, transaction_id, discount_amount, used_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(usage.id)
    .bind(usage.promo_id)
    .bind(usage.user_id)
    .bind(usage.transaction_id)
    .bind(&usage.discount_amount)
    .bind(usage.used_at)
    .fetch_one(&mut **executor)
    .await
}

// --- Notification queries ---

pub async fn insert_notification(pool: &PgPool, notification: &Notification) -> Result<Notification> {
    sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (id, user_id, kind, title, message, transaction_id, is_read, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(notification.id)
    .bind(notification.user_id)
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.transaction_id)
    .bind(notification.is_read)
    .bind(notification.created_at)
    .fetch_one(pool)
    .await
}
