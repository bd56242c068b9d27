use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// `pending` is the only state with outgoing edges.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Success)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }

    /// Ticket status that follows a payment result.
    pub fn ticket_status(&self) -> TicketStatus {
        match self {
            PaymentStatus::Pending => TicketStatus::Pending,
            PaymentStatus::Success => TicketStatus::Active,
            PaymentStatus::Failed => TicketStatus::Cancelled,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    Active,
    Used,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Active => "active",
            TicketStatus::Used => "used",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Pending, TicketStatus::Active)
                | (TicketStatus::Pending, TicketStatus::Cancelled)
                | (TicketStatus::Active, TicketStatus::Used)
                | (TicketStatus::Used, TicketStatus::Used)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub duration_minutes: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Studio {
    pub id: Uuid,
    pub name: String,
    pub seat_capacity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Schedule {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub studio_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub show_date: NaiveDate,
    #[schema(value_type = String)]
    pub price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A schedule joined with what booking needs from its movie and studio.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScheduleDetails {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub movie_title: String,
    pub studio_id: Uuid,
    pub seat_capacity: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = String)]
    pub total_amount: BigDecimal,
    #[schema(value_type = String)]
    pub original_amount: BigDecimal,
    #[schema(value_type = String)]
    pub discount_amount: BigDecimal,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub promo_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        original_amount: BigDecimal,
        discount_amount: BigDecimal,
        payment_method: String,
        promo_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            total_amount: &original_amount - &discount_amount,
            original_amount,
            discount_amount,
            payment_method,
            payment_status: PaymentStatus::Pending,
            promo_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Ticket {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub schedule_id: Uuid,
    pub seat_number: i32,
    pub status: TicketStatus,
    #[schema(value_type = String)]
    pub price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn pending(transaction_id: Uuid, schedule_id: Uuid, seat_number: i32, price: BigDecimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            schedule_id,
            seat_number,
            status: TicketStatus::Pending,
            price,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Promo {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: BigDecimal,
    pub min_tickets: i32,
    pub max_discount: Option<BigDecimal>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub is_active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PromoUsage {
    pub id: Uuid,
    pub promo_id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: Uuid,
    pub discount_amount: BigDecimal,
    pub used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub transaction_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
