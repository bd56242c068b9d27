pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

use crate::adapters::PostgresNotifier;
use crate::config::Config;
use crate::ports::{BookingNotifier, PaymentTimeoutScheduler};
use crate::services::{BookingService, PaymentService, PromoService, ScheduleService, TicketService};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub redis_url: String,
    pub bookings: BookingService,
    pub payments: PaymentService,
    pub promos: PromoService,
    pub schedules: ScheduleService,
    pub tickets: TicketService,
    pub start_time: Instant,
}

impl AppState {
    /// Wires the services over one pool with the given collaborators.
    pub fn new(
        db: sqlx::PgPool,
        config: &Config,
        timeouts: Arc<dyn PaymentTimeoutScheduler>,
        notifier: Arc<dyn BookingNotifier>,
    ) -> Self {
        Self {
            bookings: BookingService::new(db.clone(), timeouts, config.payment_timeout()),
            payments: PaymentService::new(db.clone(), notifier),
            promos: PromoService::new(db.clone()),
            schedules: ScheduleService::new(db.clone(), config.schedule_buffer()),
            tickets: TicketService::new(db.clone()),
            redis_url: config.redis_url.clone(),
            start_time: Instant::now(),
            db,
        }
    }

    /// Production wiring: Redis delayed queue and the notifications table.
    pub fn from_config(db: sqlx::PgPool, config: &Config) -> anyhow::Result<Self> {
        let queue = adapters::RedisTimeoutQueue::new(&config.redis_url)?;
        let notifier = PostgresNotifier::new(db.clone());
        Ok(Self::new(db, config, Arc::new(queue), Arc::new(notifier)))
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/bookings", post(handlers::bookings::create_booking))
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .route("/users/:user_id/bookings", get(handlers::bookings::list_user_bookings))
        .route(
            "/admin/transactions/:id/payment-status",
            post(handlers::payments::set_payment_status),
        )
        .route("/promos/validate", post(handlers::promos::validate_promo))
        .route("/schedules", post(handlers::schedules::create_schedule))
        .route(
            "/schedules/:id",
            axum::routing::put(handlers::schedules::reschedule),
        )
        .route("/schedules/:id/seats", get(handlers::schedules::seat_map))
        .route("/schedules/conflicts", post(handlers::schedules::check_conflicts))
        .route("/tickets/:id/redeem", post(handlers::tickets::redeem_ticket))
        .route("/api-docs/openapi.json", get(handlers::openapi_json))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .with_state(state)
}
