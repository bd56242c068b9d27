use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::Schedule;
use crate::db::queries;
use crate::error::AppError;
use crate::validation::validate_non_negative_amount;

/// Half-open interval overlap: `[a_start, a_end)` against `[b_start, b_end)`.
/// Intervals that only touch at an endpoint do not overlap.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn compute_end_time(start: DateTime<Utc>, duration_minutes: i32, buffer: Duration) -> DateTime<Utc> {
    start + Duration::minutes(i64::from(duration_minutes)) + buffer
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SeatMap {
    pub schedule_id: Uuid,
    pub seat_capacity: i32,
    pub taken_seats: Vec<i32>,
    pub available_count: i32,
}

#[derive(Clone)]
pub struct ScheduleService {
    pool: PgPool,
    buffer: Duration,
}

impl ScheduleService {
    pub fn new(pool: PgPool, buffer: Duration) -> Self {
        Self { pool, buffer }
    }

    /// Existing schedules in the studio that overlap the proposed interval.
    pub async fn find_conflicts(
        &self,
        studio_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Schedule>, AppError> {
        if end <= start {
            return Err(AppError::Validation("end_time must be after start_time".to_string()));
        }
        Ok(queries::find_overlapping_schedules(&self.pool, studio_id, start, end, exclude).await?)
    }

    /// Creates a screening. The end time is derived from the movie duration
    /// plus the buffer and must not overlap another screening in the studio.
    pub async fn create(
        &self,
        movie_id: Uuid,
        studio_id: Uuid,
        start_time: DateTime<Utc>,
        price: BigDecimal,
    ) -> Result<Schedule, AppError> {
        validate_non_negative_amount("price", &price)?;

        let mut uow = self.pool.begin().await?;

        let movie = queries::get_movie(&mut *uow, movie_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", movie_id)))?;
        queries::lock_studio(&mut uow, studio_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Studio {} not found", studio_id)))?;

        let end_time = compute_end_time(start_time, movie.duration_minutes, self.buffer);
        let conflicts =
            queries::find_overlapping_schedules(&mut *uow, studio_id, start_time, end_time, None).await?;
        if !conflicts.is_empty() {
            return Err(AppError::ScheduleConflict {
                conflicting: conflicts.iter().map(|s| s.id).collect(),
            });
        }

        let now = Utc::now();
        let schedule = Schedule {
            id: Uuid::new_v4(),
            movie_id,
            studio_id,
            start_time,
            end_time,
            show_date: start_time.date_naive(),
            price,
            created_at: now,
            updated_at: now,
        };
        let saved = queries::insert_schedule(&mut uow, &schedule).await?;
        uow.commit().await?;

        tracing::info!(
            schedule_id = %saved.id,
            studio_id = %studio_id,
            start_time = %saved.start_time,
            end_time = %saved.end_time,
            "Schedule created"
        );
        Ok(saved)
    }

    /// Moves a screening to a new start time, optionally repricing it.
    pub async fn reschedule(
        &self,
        schedule_id: Uuid,
        start_time: DateTime<Utc>,
        price: Option<BigDecimal>,
    ) -> Result<Schedule, AppError> {
        if let Some(price) = &price {
            validate_non_negative_amount("price", price)?;
        }

        let mut uow = self.pool.begin().await?;

        let mut schedule = queries::lock_schedule(&mut uow, schedule_id)
            .await?
            .ok_or(AppError::ScheduleNotFound(schedule_id))?;
        queries::lock_studio(&mut uow, schedule.studio_id).await?;
        let movie = queries::get_movie(&mut *uow, schedule.movie_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", schedule.movie_id)))?;

        let end_time = compute_end_time(start_time, movie.duration_minutes, self.buffer);
        let conflicts = queries::find_overlapping_schedules(
            &mut *uow,
            schedule.studio_id,
            start_time,
            end_time,
            Some(schedule_id),
        )
        .await?;
        if !conflicts.is_empty() {
            return Err(AppError::ScheduleConflict {
                conflicting: conflicts.iter().map(|s| s.id).collect(),
            });
        }

        schedule.start_time = start_time;
        schedule.end_time = end_time;
        schedule.show_date = start_time.date_naive();
        if let Some(price) = price {
            schedule.price = price;
        }
        let saved = queries::update_schedule(&mut uow, &schedule).await?;
        uow.commit().await?;

        tracing::info!(schedule_id = %saved.id, start_time = %saved.start_time, "Schedule moved");
        Ok(saved)
    }

    pub async fn seat_map(&self, schedule_id: Uuid) -> Result<SeatMap, AppError> {
        let details = queries::get_schedule_details(&self.pool, schedule_id)
            .await?
            .ok_or(AppError::ScheduleNotFound(schedule_id))?;
        let taken_seats = queries::list_taken_seats(&self.pool, schedule_id).await?;

        Ok(SeatMap {
            schedule_id,
            seat_capacity: details.seat_capacity,
            available_count: details.seat_capacity - taken_seats.len() as i32,
            taken_seats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn overlapping_intervals_conflict() {
        assert!(intervals_overlap(at(10, 0), at(12, 0), at(11, 0), at(13, 0)));
        assert!(intervals_overlap(at(11, 0), at(13, 0), at(10, 0), at(12, 0)));
        assert!(intervals_overlap(at(10, 0), at(14, 0), at(11, 0), at(12, 0)));
        assert!(intervals_overlap(at(10, 0), at(12, 0), at(10, 0), at(12, 0)));
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        assert!(!intervals_overlap(at(10, 0), at(12, 0), at(12, 0), at(14, 0)));
        assert!(!intervals_overlap(at(12, 0), at(14, 0), at(10, 0), at(12, 0)));
    }

    #[test]
    fn disjoint_intervals_do_not_conflict() {
        assert!(!intervals_overlap(at(9, 0), at(10, 0), at(11, 0), at(12, 0)));
    }

    #[test]
    fn end_time_adds_duration_and_buffer() {
        let end = compute_end_time(at(19, 0), 125, Duration::minutes(30));
        assert_eq!(end, at(21, 35));
    }
}
