mod common;

use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::redis::Redis;
use uuid::Uuid;

use cinema_booking_core::adapters::RedisTimeoutQueue;
use cinema_booking_core::db::models::PaymentStatus;
use cinema_booking_core::ports::PaymentTimeoutScheduler;
use cinema_booking_core::services::{process_due_jobs, BookingService, CreateBooking, PaymentService};
use common::*;

async fn setup_queue() -> (RedisTimeoutQueue, ContainerAsync<Redis>) {
    let container = Redis::default().start().await.unwrap();
    let host_port = container.get_host_port_ipv4(6379).await.unwrap();
    let url = format!("redis://127.0.0.1:{}", host_port);

    let queue = RedisTimeoutQueue::with_key(&url, format!("test:timeouts:{}", Uuid::new_v4())).unwrap();
    queue.ping().await.unwrap();
    (queue, container)
}

#[tokio::test]
async fn test_claim_due_returns_only_due_jobs() {
    let (queue, _container) = setup_queue().await;
    let due = Uuid::new_v4();
    let later = Uuid::new_v4();

    queue.enqueue(due, Utc::now() - Duration::seconds(1)).await.unwrap();
    queue.enqueue(later, Utc::now() + Duration::minutes(2)).await.unwrap();
    assert_eq!(queue.pending_jobs().await.unwrap(), 2);

    let claimed = queue.claim_due(Utc::now(), 10).await.unwrap();
    assert_eq!(claimed, vec![due]);
    assert_eq!(queue.pending_jobs().await.unwrap(), 1);

    // A claimed job is gone for every other worker.
    assert!(queue.claim_due(Utc::now(), 10).await.unwrap().is_empty());

    let claimed = queue
        .claim_due(Utc::now() + Duration::minutes(3), 10)
        .await
        .unwrap();
    assert_eq!(claimed, vec![later]);
}

#[tokio::test]
async fn test_schedule_payment_timeout_uses_delay() {
    let (queue, _container) = setup_queue().await;
    let tx_id = Uuid::new_v4();

    queue
        .schedule_payment_timeout(tx_id, std::time::Duration::from_secs(120))
        .await
        .unwrap();

    assert!(queue.claim_due(Utc::now(), 10).await.unwrap().is_empty());
    let claimed = queue
        .claim_due(Utc::now() + Duration::seconds(121), 10)
        .await
        .unwrap();
    assert_eq!(claimed, vec![tx_id]);
}

#[tokio::test]
async fn test_requeue_redelivers() {
    let (queue, _container) = setup_queue().await;
    let tx_id = Uuid::new_v4();

    queue.enqueue(tx_id, Utc::now()).await.unwrap();
    let claimed = queue.claim_due(Utc::now(), 10).await.unwrap();
    assert_eq!(claimed, vec![tx_id]);

    queue.requeue(tx_id, Utc::now()).await.unwrap();
    assert_eq!(queue.claim_due(Utc::now(), 10).await.unwrap(), vec![tx_id]);
}

#[tokio::test]
async fn test_worker_expires_abandoned_booking() {
    let (pool, _pg) = setup_db().await;
    let (queue, _redis) = setup_queue().await;
    let screening = seed_screening(&pool, 10, "75000").await;

    let queue = Arc::new(queue);
    let bookings = BookingService::new(pool.clone(), queue.clone(), std::time::Duration::ZERO);
    let payments = PaymentService::new(pool.clone(), Arc::new(RecordingNotifier::default()));

    let abandoned = bookings
        .create_transaction(CreateBooking {
            user_id: screening.user_id,
            schedule_id: screening.schedule_id,
            seat_numbers: vec![1, 2],
            payment_method: "debit_card".to_string(),
            promo_code: None,
        })
        .await
        .unwrap();
    let paid = bookings
        .create_transaction(CreateBooking {
            user_id: screening.user_id,
            schedule_id: screening.schedule_id,
            seat_numbers: vec![3],
            payment_method: "debit_card".to_string(),
            promo_code: None,
        })
        .await
        .unwrap();
    payments
        .set_payment_status(paid.id, PaymentStatus::Success)
        .await
        .unwrap();

    let report = process_due_jobs(&payments, &queue, 10).await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.requeued, 0);
    assert_eq!(report.lost, 0);

    assert_eq!(ticket_statuses(&pool, abandoned.id).await, vec!["cancelled"; 2]);
    assert_eq!(ticket_statuses(&pool, paid.id).await, vec!["active"]);
    assert_eq!(queue.pending_jobs().await.unwrap(), 0);

    // Redelivery of an already handled job changes nothing.
    queue.requeue(abandoned.id, Utc::now()).await.unwrap();
    let report = process_due_jobs(&payments, &queue, 10).await.unwrap();
    assert_eq!(report.expired, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(ticket_statuses(&pool, abandoned.id).await, vec!["cancelled"; 2]);
}

#[tokio::test]
async fn test_failed_jobs_are_all_requeued() {
    let (queue, _redis) = setup_queue().await;
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://cinema@127.0.0.1:1/booking")
        .unwrap();
    pool.close().await;
    let payments = PaymentService::new(pool, Arc::new(RecordingNotifier::default()));

    let jobs = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    for id in jobs {
        queue.enqueue(id, Utc::now() - Duration::seconds(1)).await.unwrap();
    }

    let report = process_due_jobs(&payments, &queue, 10).await.unwrap();
    assert_eq!(report.expired, 0);
    assert_eq!(report.requeued, 3);
    assert_eq!(report.lost, 0);

    // Redelivery is delayed, so nothing is due right away.
    assert!(queue.claim_due(Utc::now(), 10).await.unwrap().is_empty());
    let mut redelivered = queue
        .claim_due(Utc::now() + Duration::seconds(10), 10)
        .await
        .unwrap();
    redelivered.sort();
    let mut expected = jobs.to_vec();
    expected.sort();
    assert_eq!(redelivered, expected);
}
