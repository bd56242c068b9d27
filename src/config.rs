use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub mod cors;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub payment_timeout_secs: u64,
    pub schedule_buffer_minutes: i64,
    pub worker_poll_interval_ms: u64,
    pub worker_batch_size: usize,
    pub stale_sweep_interval_secs: u64,
    pub cors_allowed_origins: Option<String>,
    pub log_format: LogFormat,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format '{}', expected 'text' or 'json'", other),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: parse_var("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            redis_url: env::var("REDIS_URL").context("REDIS_URL must be set")?,
            payment_timeout_secs: parse_var("PAYMENT_TIMEOUT_SECS", 120)?,
            schedule_buffer_minutes: parse_var("SCHEDULE_BUFFER_MINUTES", 30)?,
            worker_poll_interval_ms: parse_var("WORKER_POLL_INTERVAL_MS", 1000)?,
            worker_batch_size: parse_var("WORKER_BATCH_SIZE", 50)?,
            stale_sweep_interval_secs: parse_var("STALE_SWEEP_INTERVAL_SECS", 60)?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            log_format: parse_var("LOG_FORMAT", LogFormat::Text)?,
        })
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs)
    }

    pub fn schedule_buffer(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.schedule_buffer_minutes)
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        _ => Ok(default),
    }
}
