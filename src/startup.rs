use std::fmt;

use sqlx::PgPool;

use crate::adapters::RedisTimeoutQueue;
use crate::config::Config;
use crate::db;

pub const CONFIG_CHECK: &str = "configuration";
pub const POSTGRES_CHECK: &str = "postgres";
pub const REDIS_CHECK: &str = "redis";

#[derive(Debug, Clone)]
pub struct StartupCheck {
    pub name: &'static str,
    /// The HTTP server refuses to start when a required check fails.
    pub required: bool,
    pub problems: Vec<String>,
}

impl StartupCheck {
    fn new(name: &'static str, required: bool, problems: Vec<String>) -> Self {
        Self {
            name,
            required,
            problems,
        }
    }

    pub fn passed(&self) -> bool {
        self.problems.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub checks: Vec<StartupCheck>,
}

impl ValidationReport {
    /// Every check passed, optional ones included.
    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(StartupCheck::passed)
    }

    /// Every required check passed; optional failures only degrade the service.
    pub fn can_serve(&self) -> bool {
        self.checks.iter().filter(|check| check.required).all(StartupCheck::passed)
    }

    pub fn passed(&self, name: &str) -> bool {
        self.checks
            .iter()
            .find(|check| check.name == name)
            .map_or(false, StartupCheck::passed)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Startup checks:")?;
        for check in &self.checks {
            let verdict = match (check.passed(), check.required) {
                (true, _) => "ok",
                (false, true) => "FAILED",
                (false, false) => "degraded",
            };
            writeln!(f, "  {:<14} {}", check.name, verdict)?;
            for problem in &check.problems {
                writeln!(f, "    - {}", problem)?;
            }
        }
        Ok(())
    }
}

/// Runs every startup check and collects the outcome. Never fails itself;
/// problems end up in the report.
pub async fn validate_environment(config: &Config, pool: &PgPool) -> ValidationReport {
    let checks = vec![
        StartupCheck::new(CONFIG_CHECK, true, config_problems(config)),
        StartupCheck::new(POSTGRES_CHECK, true, postgres_problems(pool).await),
        StartupCheck::new(REDIS_CHECK, false, redis_problems(&config.redis_url).await),
    ];

    for check in checks.iter().filter(|check| !check.passed()) {
        tracing::warn!(check = check.name, problems = ?check.problems, "Startup check failed");
    }

    ValidationReport { checks }
}

fn config_problems(config: &Config) -> Vec<String> {
    let rules = [
        (config.database_url.trim().is_empty(), "DATABASE_URL is empty"),
        (config.redis_url.trim().is_empty(), "REDIS_URL is empty"),
        (config.server_port == 0, "SERVER_PORT must be greater than 0"),
        (config.payment_timeout_secs == 0, "PAYMENT_TIMEOUT_SECS must be greater than 0"),
        (config.schedule_buffer_minutes < 0, "SCHEDULE_BUFFER_MINUTES must not be negative"),
        (config.worker_batch_size == 0, "WORKER_BATCH_SIZE must be greater than 0"),
        (config.worker_poll_interval_ms == 0, "WORKER_POLL_INTERVAL_MS must be greater than 0"),
    ];

    rules
        .iter()
        .filter(|(broken, _)| *broken)
        .map(|(_, message)| message.to_string())
        .collect()
}

async fn postgres_problems(pool: &PgPool) -> Vec<String> {
    if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
        return vec![format!("unreachable: {}", e)];
    }

    match db::pending_migrations(pool).await {
        Ok(pending) if pending.is_empty() => Vec::new(),
        Ok(pending) => vec![format!("unapplied migrations: {:?}", pending)],
        Err(e) => vec![format!("cannot read migration state: {:#}", e)],
    }
}

async fn redis_problems(redis_url: &str) -> Vec<String> {
    let ping = match RedisTimeoutQueue::new(redis_url) {
        Ok(queue) => queue.ping().await,
        Err(e) => Err(e),
    };

    match ping {
        Ok(()) => Vec::new(),
        Err(e) => vec![e.to_string()],
    }
}
