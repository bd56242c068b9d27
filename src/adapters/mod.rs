pub mod postgres_notifier;
pub mod redis_timeout_queue;

pub use postgres_notifier::PostgresNotifier;
pub use redis_timeout_queue::RedisTimeoutQueue;
