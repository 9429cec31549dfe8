//! Storage seam between the queue machinery and the shared key-value store.
//!
//! Everything the queue and scheduler persist goes through [`JobStore`], so
//! multiple service instances coordinate purely through the store and tests
//! can run against the in-memory backend.

mod memory_store;
mod redis_store;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::job::Job;
use crate::scheduler::ScheduledJob;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;

/// Persistence operations for job records, the two ranking sets, and
/// recurring-job templates.
///
/// Every mutation must be atomic at the store level: `pop_ready` hands each
/// ranked id to exactly one caller, and `claim_due_delayed` returns an id to
/// exactly one instance, even with several dispatchers sharing the store.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn put_job(&self, job: &Job) -> Result<()>;
    async fn get_job(&self, id: &str) -> Result<Option<Job>>;
    /// Returns false when no record existed, so callers can report
    /// idempotent removal.
    async fn delete_job(&self, id: &str) -> Result<bool>;
    /// Full scan of all persisted job records, in no particular order.
    async fn all_jobs(&self) -> Result<Vec<Job>>;

    /// Rank a job as ready to run. Re-pushing an id updates its priority.
    async fn push_ready(&self, id: &str, priority: i64) -> Result<()>;
    /// Atomically pop the highest-priority ready id, waiting up to `wait`
    /// for one to appear. Ties are resolved by the store's member ordering,
    /// not insertion order.
    async fn pop_ready(&self, wait: Duration) -> Result<Option<String>>;
    async fn remove_ready(&self, id: &str) -> Result<()>;

    /// Rank a job by its absolute eligibility time in epoch milliseconds.
    async fn push_delayed(&self, id: &str, eligible_at_ms: i64) -> Result<()>;
    /// Remove and return every delayed id due at `now_ms`. Each id is
    /// claimed by exactly one caller across instances.
    async fn claim_due_delayed(&self, now_ms: i64) -> Result<Vec<String>>;
    async fn remove_delayed(&self, id: &str) -> Result<()>;

    async fn put_scheduled(&self, template: &ScheduledJob) -> Result<()>;
    async fn delete_scheduled(&self, id: &str) -> Result<bool>;
    async fn all_scheduled(&self) -> Result<Vec<ScheduledJob>>;
}
