use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::PaymentStatus;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPaymentStatusRequest {
    pub status: PaymentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusChanged {
    pub transaction_id: Uuid,
    pub payment_status: PaymentStatus,
}

#[utoipa::path(
    post,
    path = "/admin/transactions/{id}/payment-status",
    params(("id" = Uuid, Path, description = "Transaction id")),
    request_body = SetPaymentStatusRequest,
    responses(
        (status = 200, description = "Payment result applied", body = PaymentStatusChanged),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Transaction is no longer pending, or target is pending")
    ),
    tag = "Payments"
)]
pub async fn set_payment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetPaymentStatusRequest>,
) -> Result<Json<PaymentStatusChanged>, AppError> {
    let transaction = state.payments.set_payment_status(id, payload.status).await?;

    Ok(Json(PaymentStatusChanged {
        transaction_id: transaction.id,
        payment_status: transaction.payment_status,
    }))
}
