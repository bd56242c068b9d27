//! Delayed payment-timeout jobs kept in a Redis sorted set.
//!
//! Each member is a transaction id scored by the unix-millis instant it
//! becomes due. Workers claim due members with `ZREM`, so a job removed by
//! one worker is never handed to another; a worker that fails to handle a
//! claimed job puts it back with [`RedisTimeoutQueue::requeue`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;
use crate::ports::PaymentTimeoutScheduler;

pub const DEFAULT_QUEUE_KEY: &str = "booking:payment_timeouts";

#[derive(Clone)]
pub struct RedisTimeoutQueue {
    client: redis::Client,
    key: String,
}

impl RedisTimeoutQueue {
    pub fn new(redis_url: &str) -> Result<Self, AppError> {
        Self::with_key(redis_url, DEFAULT_QUEUE_KEY)
    }

    pub fn with_key(redis_url: &str, key: impl Into<String>) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            key: key.into(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn enqueue(&self, transaction_id: Uuid, due_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn
            .zadd(&self.key, transaction_id.to_string(), due_at.timestamp_millis())
            .await?;
        Ok(())
    }

    /// Puts a claimed job back so it is delivered again at `due_at`.
    pub async fn requeue(&self, transaction_id: Uuid, due_at: DateTime<Utc>) -> Result<(), AppError> {
        self.enqueue(transaction_id, due_at).await
    }

    /// Removes and returns up to `limit` jobs due at or before `now`.
    pub async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Uuid>, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let candidates: Vec<String> = conn
            .zrangebyscore_limit(&self.key, "-inf", now.timestamp_millis(), 0, limit as isize)
            .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for member in candidates {
            let removed: i64 = conn.zrem(&self.key, &member).await?;
            if removed != 1 {
                // Another worker got there first.
                continue;
            }
            match Uuid::parse_str(&member) {
                Ok(id) => claimed.push(id),
                Err(e) => tracing::warn!(member = %member, error = %e, "Dropping malformed timeout job"),
            }
        }

        Ok(claimed)
    }

    pub async fn pending_jobs(&self) -> Result<usize, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let count: usize = conn.zcard(&self.key).await?;
        Ok(count)
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentTimeoutScheduler for RedisTimeoutQueue {
    async fn schedule_payment_timeout(&self, transaction_id: Uuid, delay: Duration) -> Result<(), AppError> {
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| AppError::Internal(format!("invalid timeout delay: {}", e)))?;
        self.enqueue(transaction_id, Utc::now() + delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_url() {
        assert!(RedisTimeoutQueue::new("not a url").is_err());
    }

    #[test]
    fn test_custom_key() {
        let queue = RedisTimeoutQueue::with_key("redis://127.0.0.1:6379", "test:timeouts").unwrap();
        assert_eq!(queue.key(), "test:timeouts");
    }
}
