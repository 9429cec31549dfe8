use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::warn;

use crate::job::Job;
use crate::scheduler::ScheduledJob;
use crate::store::JobStore;
use crate::utils::constants::{
    DELAYED_JOBS_KEY, PREFIX_JOB, READY_QUEUE_KEY, SCHEDULED_JOBS_KEY,
};

/// Redis backend.
///
/// Key layout, shared by every instance on the same store:
/// - `job:<id>` hash of serialized job fields
/// - `job_queue` sorted set, member = id, score = priority
/// - `delayed_jobs` sorted set, member = id, score = epoch-ms eligibility
/// - `scheduled_jobs` hash, field = template id, value = JSON template
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

fn job_key(id: &str) -> String {
    format!("{PREFIX_JOB}:{id}")
}

impl RedisStore {
    /// Client::open handles rediss:// too since the TLS feature is enabled.
    pub fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .with_context(|| format!("invalid redis url '{url}'"))?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("failed to get redis connection")
    }
}

#[async_trait]
impl JobStore for RedisStore {
    async fn put_job(&self, job: &Job) -> Result<()> {
        let fields = job.to_fields()?;
        let mut conn = self.conn().await?;
        conn.hset_multiple::<_, _, _, ()>(job_key(&job.id), &fields)
            .await?;
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, String> = conn.hgetall(job_key(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Job::from_fields(&fields)?))
    }

    async fn delete_job(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(job_key(id)).await?;
        Ok(removed > 0)
    }

    async fn all_jobs(&self) -> Result<Vec<Job>> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = conn.keys(format!("{PREFIX_JOB}:*")).await?;
        let mut jobs = Vec::with_capacity(keys.len());
        for key in keys {
            let fields: HashMap<String, String> = conn.hgetall(&key).await?;
            if fields.is_empty() {
                continue;
            }
            match Job::from_fields(&fields) {
                Ok(job) => jobs.push(job),
                Err(err) => warn!("Skipping unreadable job record {key}: {err:?}"),
            }
        }
        Ok(jobs)
    }

    async fn push_ready(&self, id: &str, priority: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.zadd::<_, _, _, ()>(READY_QUEUE_KEY, id, priority).await?;
        Ok(())
    }

    async fn pop_ready(&self, wait: Duration) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        if wait.is_zero() {
            // BZPOPMAX treats a zero timeout as "block forever", so take the
            // non-blocking variant for an immediate poll.
            let popped: Vec<(String, f64)> = conn.zpopmax(READY_QUEUE_KEY, 1).await?;
            return Ok(popped.into_iter().next().map(|(id, _)| id));
        }
        let popped: Option<(String, String, f64)> = conn
            .bzpopmax(READY_QUEUE_KEY, wait.as_secs_f64())
            .await?;
        Ok(popped.map(|(_, id, _)| id))
    }

    async fn remove_ready(&self, id: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.zrem::<_, _, ()>(READY_QUEUE_KEY, id).await?;
        Ok(())
    }

    async fn push_delayed(&self, id: &str, eligible_at_ms: i64) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.zadd::<_, _, _, ()>(DELAYED_JOBS_KEY, id, eligible_at_ms)
            .await?;
        Ok(())
    }

    async fn claim_due_delayed(&self, now_ms: i64) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let due: Vec<String> = conn.zrangebyscore(DELAYED_JOBS_KEY, 0, now_ms).await?;
        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            // ZREM returning 0 means another instance claimed this id first.
            let removed: i64 = conn.zrem(DELAYED_JOBS_KEY, &id).await?;
            if removed > 0 {
                claimed.push(id);
            }
        }
        Ok(claimed)
    }

    async fn remove_delayed(&self, id: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.zrem::<_, _, ()>(DELAYED_JOBS_KEY, id).await?;
        Ok(())
    }

    async fn put_scheduled(&self, template: &ScheduledJob) -> Result<()> {
        let mut conn = self.conn().await?;
        let raw = serde_json::to_string(template)?;
        conn.hset::<_, _, _, ()>(SCHEDULED_JOBS_KEY, &template.id, raw)
            .await?;
        Ok(())
    }

    async fn delete_scheduled(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.hdel(SCHEDULED_JOBS_KEY, id).await?;
        Ok(removed > 0)
    }

    async fn all_scheduled(&self) -> Result<Vec<ScheduledJob>> {
        let mut conn = self.conn().await?;
        let raw: HashMap<String, String> = conn.hgetall(SCHEDULED_JOBS_KEY).await?;
        let mut templates = Vec::with_capacity(raw.len());
        for (id, value) in raw {
            match serde_json::from_str(&value) {
                Ok(template) => templates.push(template),
                Err(err) => warn!("Skipping unreadable scheduled job {id}: {err:?}"),
            }
        }
        Ok(templates)
    }
}
