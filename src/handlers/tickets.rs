use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::db::models::Ticket;
use crate::error::AppError;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/tickets/{id}/redeem",
    params(("id" = Uuid, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Ticket marked as used", body = Ticket),
        (status = 404, description = "Ticket not found"),
        (status = 409, description = "Ticket is pending or cancelled")
    ),
    tag = "Tickets"
)]
pub async fn redeem_ticket(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    Ok(Json(state.tickets.redeem(id).await?))
}
