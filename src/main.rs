use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_booking_core::adapters::{PostgresNotifier, RedisTimeoutQueue};
use cinema_booking_core::cli::{self, Cli, Commands, DbCommands, TxCommands};
use cinema_booking_core::config::{cors::create_cors_layer, Config, LogFormat};
use cinema_booking_core::services::{run_timeout_worker, PaymentService, WorkerSettings};
use cinema_booking_core::{create_app, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Worker => worker(config).await,
        Commands::Tx(TxCommands::SetStatus { tx_id, status }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_tx_set_status(&pool, tx_id, status).await
        }
        Commands::Tx(TxCommands::Expire { tx_id }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_tx_expire(&pool, tx_id).await
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let report = startup::validate_environment(&config, &pool).await;
    println!("{}", report);
    if !report.can_serve() {
        anyhow::bail!("Startup validation failed");
    }
    if !report.passed(startup::REDIS_CHECK) {
        tracing::warn!("Redis unavailable, payment timeouts will not be scheduled until it recovers");
    }

    let state = AppState::from_config(pool, &config)?;
    let app = create_app(state).layer(create_cors_layer(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn worker(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    let queue = RedisTimeoutQueue::new(&config.redis_url)?;
    queue.ping().await?;

    let payments = PaymentService::new(
        pool.clone(),
        std::sync::Arc::new(PostgresNotifier::new(pool)),
    );
    let settings = WorkerSettings::from_config(&config);

    tokio::select! {
        _ = run_timeout_worker(payments, queue, settings) => {}
        _ = shutdown_signal() => tracing::info!("Payment timeout worker stopping"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
