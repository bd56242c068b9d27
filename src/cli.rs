use clap::{Parser, Subcommand, ValueEnum};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::PostgresNotifier;
use crate::config::Config;
use crate::db::models::PaymentStatus;
use crate::services::{PaymentService, TimeoutOutcome};

#[derive(Parser)]
#[command(name = "cinema-booking-core")]
#[command(about = "Cinema Booking Core - seat booking and payment lifecycle service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Run the payment timeout worker
    Worker,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Apply a payment result to a pending transaction
    SetStatus {
        /// Transaction UUID
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,

        #[arg(value_enum, value_name = "STATUS")]
        status: PaymentResult,
    },

    /// Run the timeout handler for a transaction by hand
    Expire {
        /// Transaction UUID
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PaymentResult {
    Success,
    Failed,
}

impl From<PaymentResult> for PaymentStatus {
    fn from(result: PaymentResult) -> Self {
        match result {
            PaymentResult::Success => PaymentStatus::Success,
            PaymentResult::Failed => PaymentStatus::Failed,
        }
    }
}

fn payment_service(pool: &PgPool) -> PaymentService {
    PaymentService::new(pool.clone(), Arc::new(PostgresNotifier::new(pool.clone())))
}

pub async fn handle_tx_set_status(pool: &PgPool, tx_id: Uuid, result: PaymentResult) -> anyhow::Result<()> {
    let transaction = payment_service(pool)
        .set_payment_status(tx_id, result.into())
        .await?;

    tracing::info!("Transaction {} marked as {}", tx_id, transaction.payment_status);
    println!("✓ Transaction {} marked as {}", tx_id, transaction.payment_status);
    Ok(())
}

pub async fn handle_tx_expire(pool: &PgPool, tx_id: Uuid) -> anyhow::Result<()> {
    match payment_service(pool).expire_payment(tx_id).await? {
        TimeoutOutcome::Expired => println!("✓ Transaction {} expired, seats released", tx_id),
        TimeoutOutcome::AlreadyResolved(status) => {
            println!("✓ Transaction {} already {}, nothing to do", tx_id, status)
        }
        TimeoutOutcome::NotFound => {
            tracing::warn!("Transaction {} not found", tx_id);
            anyhow::bail!("Transaction {} not found", tx_id)
        }
    }
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    tracing::info!("Database migrations completed");
    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Redis URL: {}", mask_password(&config.redis_url));
    println!("  Payment Timeout: {}s", config.payment_timeout_secs);
    println!("  Schedule Buffer: {}min", config.schedule_buffer_minutes);
    println!(
        "  Worker: poll {}ms, batch {}, sweep every {}s",
        config.worker_poll_interval_ms, config.worker_batch_size, config.stale_sweep_interval_secs
    );
    println!("  Log Format: {:?}", config.log_format);

    let pool = crate::db::create_pool(config).await?;
    let report = crate::startup::validate_environment(config, &pool).await;
    println!("{}", report);
    if !report.is_valid() {
        anyhow::bail!("Configuration validation failed");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
