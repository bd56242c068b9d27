use axum::{extract::State, Json};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::PromoEvaluation;
use crate::validation::validate_non_negative_amount;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidatePromoRequest {
    pub code: String,
    pub ticket_count: usize,
    #[schema(value_type = String)]
    pub total_amount: BigDecimal,
    #[serde(default)]
    pub movie_ids: Vec<Uuid>,
}

/// Previews a promo without consuming it. An ineligible code is a normal
/// response with `valid: false`, not an error.
#[utoipa::path(
    post,
    path = "/promos/validate",
    request_body = ValidatePromoRequest,
    responses(
        (status = 200, description = "Eligibility and computed discount", body = PromoEvaluation),
        (status = 400, description = "Malformed code or amount")
    ),
    tag = "Promos"
)]
pub async fn validate_promo(
    State(state): State<AppState>,
    Json(payload): Json<ValidatePromoRequest>,
) -> Result<Json<PromoEvaluation>, AppError> {
    validate_non_negative_amount("total_amount", &payload.total_amount)?;

    let evaluation = state
        .promos
        .validate(
            &payload.code,
            payload.ticket_count,
            &payload.total_amount,
            &payload.movie_ids,
        )
        .await?;

    Ok(Json(evaluation))
}
