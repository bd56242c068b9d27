use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::adapters::RedisTimeoutQueue;
use crate::config::Config;
use crate::services::payment::{PaymentService, TimeoutOutcome};

/// Delay before a job whose handler failed is delivered again.
const REDELIVERY_DELAY_SECS: i64 = 5;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub sweep_interval: Duration,
    /// Pending transactions older than this are failed by the sweep.
    pub payment_timeout: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.worker_poll_interval_ms),
            batch_size: config.worker_batch_size,
            sweep_interval: Duration::from_secs(config.stale_sweep_interval_secs),
            payment_timeout: config.payment_timeout(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub expired: usize,
    pub skipped: usize,
    pub requeued: usize,
    /// Failed jobs that could not be put back; left to the stale sweep.
    pub lost: usize,
}

/// Runs the payment-timeout worker until the task is dropped. Intended to
/// run in its own process next to the HTTP server.
pub async fn run_timeout_worker(payments: PaymentService, queue: RedisTimeoutQueue, settings: WorkerSettings) {
    info!(
        poll_ms = settings.poll_interval.as_millis() as u64,
        batch_size = settings.batch_size,
        "Payment timeout worker started"
    );

    let mut last_sweep = Instant::now();
    loop {
        match process_due_jobs(&payments, &queue, settings.batch_size).await {
            Ok(report) if report != BatchReport::default() => info!(?report, "Processed timeout jobs"),
            Ok(_) => {}
            Err(e) => error!("Timeout worker batch error: {}", e),
        }

        if last_sweep.elapsed() >= settings.sweep_interval {
            last_sweep = Instant::now();
            if let Err(e) = sweep(&payments, settings.payment_timeout, settings.batch_size).await {
                error!("Stale pending sweep failed: {}", e);
            }
        }

        sleep(settings.poll_interval).await;
    }
}

/// Claims due jobs and expires their transactions. A job whose handler hits
/// an infrastructure error goes back on the queue. Every claimed job is
/// handled even when putting one back fails.
pub async fn process_due_jobs(
    payments: &PaymentService,
    queue: &RedisTimeoutQueue,
    batch_size: usize,
) -> anyhow::Result<BatchReport> {
    let due = queue.claim_due(Utc::now(), batch_size).await?;
    if due.is_empty() {
        return Ok(BatchReport::default());
    }

    debug!("Handling {} due payment timeout(s)", due.len());

    let mut report = BatchReport::default();
    let mut failed = Vec::new();
    for transaction_id in due {
        match payments.expire_payment(transaction_id).await {
            Ok(TimeoutOutcome::Expired) => report.expired += 1,
            Ok(TimeoutOutcome::NotFound) | Ok(TimeoutOutcome::AlreadyResolved(_)) => report.skipped += 1,
            Err(e) => {
                warn!(transaction_id = %transaction_id, error = %e, "Timeout handling failed, requeueing");
                failed.push(transaction_id);
            }
        }
    }

    let retry_at = Utc::now() + chrono::Duration::seconds(REDELIVERY_DELAY_SECS);
    for transaction_id in failed {
        match queue.requeue(transaction_id, retry_at).await {
            Ok(()) => report.requeued += 1,
            Err(e) => {
                error!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Failed to requeue timeout job, leaving it to the stale sweep"
                );
                report.lost += 1;
            }
        }
    }

    Ok(report)
}

async fn sweep(payments: &PaymentService, payment_timeout: Duration, limit: usize) -> anyhow::Result<()> {
    // Grace period so the sweep never races a job that is about to fire.
    let older_than = chrono::Duration::from_std(payment_timeout * 2)?;
    payments.sweep_stale_pending(older_than, limit as i64).await?;
    Ok(())
}
