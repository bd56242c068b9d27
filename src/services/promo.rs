//! Promo discount rules.
//!
//! [`evaluate`] is pure: it looks only at the promo, its movie restriction,
//! the order and the clock. Recording usage is the booking engine's job.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{DiscountType, Promo};
use crate::db::queries;
use crate::error::AppError;
use crate::validation::normalize_promo_code;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoRejection {
    NotFound,
    Inactive,
    OutsideValidityWindow,
    BelowMinimumTickets(i32),
    UsageLimitReached,
    NotApplicableToMovies,
}

impl fmt::Display for PromoRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromoRejection::NotFound => f.write_str("promo code not found"),
            PromoRejection::Inactive => f.write_str("promo code is not active"),
            PromoRejection::OutsideValidityWindow => f.write_str("promo code expired or not yet active"),
            PromoRejection::BelowMinimumTickets(min) => write!(f, "minimum {} tickets required", min),
            PromoRejection::UsageLimitReached => f.write_str("promo code usage limit exceeded"),
            PromoRejection::NotApplicableToMovies => {
                f.write_str("promo code not applicable for selected movies")
            }
        }
    }
}

impl From<PromoRejection> for AppError {
    fn from(rejection: PromoRejection) -> Self {
        AppError::PromoRejected(rejection.to_string())
    }
}

/// What the booking asks a promo to discount.
#[derive(Debug, Clone)]
pub struct PromoRequest<'a> {
    pub ticket_count: usize,
    pub total_amount: &'a BigDecimal,
    pub movie_ids: &'a [Uuid],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PromoEvaluation {
    pub valid: bool,
    #[schema(value_type = String)]
    pub discount_amount: BigDecimal,
    #[schema(value_type = String)]
    pub final_amount: BigDecimal,
    pub reason: Option<String>,
}

impl PromoEvaluation {
    pub fn from_outcome(total_amount: &BigDecimal, outcome: Result<BigDecimal, PromoRejection>) -> Self {
        match outcome {
            Ok(discount) => Self {
                valid: true,
                final_amount: total_amount - &discount,
                discount_amount: discount,
                reason: None,
            },
            Err(rejection) => Self {
                valid: false,
                discount_amount: BigDecimal::from(0),
                final_amount: total_amount.clone(),
                reason: Some(rejection.to_string()),
            },
        }
    }
}

/// Checks eligibility in a fixed order (first failure wins) and returns the
/// discount. The discount never exceeds the order total.
pub fn evaluate(
    promo: &Promo,
    eligible_movies: &[Uuid],
    request: &PromoRequest<'_>,
    now: DateTime<Utc>,
) -> Result<BigDecimal, PromoRejection> {
    if !promo.is_active {
        return Err(PromoRejection::Inactive);
    }

    if now < promo.valid_from || now > promo.valid_until {
        return Err(PromoRejection::OutsideValidityWindow);
    }

    if (request.ticket_count as i64) < i64::from(promo.min_tickets) {
        return Err(PromoRejection::BelowMinimumTickets(promo.min_tickets));
    }

    if let Some(limit) = promo.usage_limit {
        if promo.usage_count >= limit {
            return Err(PromoRejection::UsageLimitReached);
        }
    }

    if !eligible_movies.is_empty()
        && !request
            .movie_ids
            .iter()
            .any(|movie_id| eligible_movies.contains(movie_id))
    {
        return Err(PromoRejection::NotApplicableToMovies);
    }

    Ok(compute_discount(promo, request.total_amount))
}

pub fn compute_discount(promo: &Promo, total_amount: &BigDecimal) -> BigDecimal {
    let discount = match promo.discount_type {
        DiscountType::Percentage => {
            let raw = (total_amount * &promo.discount_value / BigDecimal::from(100)).round(2);
            match &promo.max_discount {
                Some(cap) if &raw > cap => cap.clone(),
                _ => raw,
            }
        }
        DiscountType::FixedAmount => promo.discount_value.clone(),
    };

    if &discount > total_amount {
        total_amount.clone()
    } else {
        discount
    }
}

/// Read-only promo preview over persisted state.
#[derive(Clone)]
pub struct PromoService {
    pool: PgPool,
}

impl PromoService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn validate(
        &self,
        code: &str,
        ticket_count: usize,
        total_amount: &BigDecimal,
        movie_ids: &[Uuid],
    ) -> Result<PromoEvaluation, AppError> {
        let code = normalize_promo_code(code)?;
        let Some(promo) = queries::get_promo_by_code(&self.pool, &code).await? else {
            return Ok(PromoEvaluation::from_outcome(
                total_amount,
                Err(PromoRejection::NotFound),
            ));
        };
        let eligible_movies = queries::promo_movie_ids(&self.pool, promo.id).await?;

        let request = PromoRequest {
            ticket_count,
            total_amount,
            movie_ids,
        };
        let outcome = evaluate(&promo, &eligible_movies, &request, Utc::now());
        Ok(PromoEvaluation::from_outcome(total_amount, outcome))
    }
}
