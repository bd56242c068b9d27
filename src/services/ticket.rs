use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Ticket, TicketStatus};
use crate::db::queries;
use crate::error::AppError;

#[derive(Clone)]
pub struct TicketService {
    pool: PgPool,
}

impl TicketService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Marks a scanned ticket as used. Scanning a used ticket again is a
    /// no-op; pending or cancelled tickets cannot be redeemed.
    pub async fn redeem(&self, ticket_id: Uuid) -> Result<Ticket, AppError> {
        let mut uow = self.pool.begin().await?;

        let ticket = queries::lock_ticket(&mut uow, ticket_id)
            .await?
            .ok_or(AppError::TicketNotFound(ticket_id))?;
        if !ticket.status.can_transition_to(TicketStatus::Used) {
            return Err(AppError::InvalidStateTransition {
                from: ticket.status.to_string(),
                to: TicketStatus::Used.to_string(),
            });
        }
        if ticket.status == TicketStatus::Used {
            return Ok(ticket);
        }

        let ticket = queries::update_ticket_status(&mut uow, ticket_id, TicketStatus::Used).await?;
        uow.commit().await?;

        tracing::info!(ticket_id = %ticket_id, seat = ticket.seat_number, "Ticket redeemed");
        Ok(ticket)
    }
}
