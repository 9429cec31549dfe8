use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::job::Job;
use crate::scheduler::ScheduledJob;
use crate::store::JobStore;

/// In-memory backend for tests and single-process deployments.
///
/// The ranking sets mirror the sorted-set semantics of the Redis backend:
/// members are unique, re-pushing updates the score, and pops take the
/// highest score with ties resolved by the lexically greatest id.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    ready_wake: Notify,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, Job>,
    ready: BTreeSet<(i64, String)>,
    delayed: BTreeSet<(i64, String)>,
    scheduled: HashMap<String, ScheduledJob>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_pop_ready(&self) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.ready.pop_last().map(|(_, id)| id)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn put_job(&self, job: &Job) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.jobs.get(id).cloned())
    }

    async fn delete_job(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.jobs.remove(id).is_some())
    }

    async fn all_jobs(&self) -> Result<Vec<Job>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.jobs.values().cloned().collect())
    }

    async fn push_ready(&self, id: &str, priority: i64) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.ready.retain(|(_, member)| member != id);
            inner.ready.insert((priority, id.to_string()));
        }
        self.ready_wake.notify_one();
        Ok(())
    }

    async fn pop_ready(&self, wait: Duration) -> Result<Option<String>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(id) = self.try_pop_ready() {
                return Ok(Some(id));
            }
            let woken =
                tokio::time::timeout_at(deadline, self.ready_wake.notified()).await;
            if woken.is_err() {
                // Deadline hit; one last check so a push racing the timeout
                // is not lost.
                return Ok(self.try_pop_ready());
            }
        }
    }

    async fn remove_ready(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.ready.retain(|(_, member)| member != id);
        Ok(())
    }

    async fn push_delayed(&self, id: &str, eligible_at_ms: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.delayed.retain(|(_, member)| member != id);
        inner.delayed.insert((eligible_at_ms, id.to_string()));
        Ok(())
    }

    async fn claim_due_delayed(&self, now_ms: i64) -> Result<Vec<String>> {
        let mut inner = self.inner.lock().unwrap();
        let due: Vec<(i64, String)> = inner
            .delayed
            .iter()
            .take_while(|(at, _)| *at <= now_ms)
            .cloned()
            .collect();
        for entry in &due {
            inner.delayed.remove(entry);
        }
        Ok(due.into_iter().map(|(_, id)| id).collect())
    }

    async fn remove_delayed(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.delayed.retain(|(_, member)| member != id);
        Ok(())
    }

    async fn put_scheduled(&self, template: &ScheduledJob) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .scheduled
            .insert(template.id.clone(), template.clone());
        Ok(())
    }

    async fn delete_scheduled(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.scheduled.remove(id).is_some())
    }

    async fn all_scheduled(&self) -> Result<Vec<ScheduledJob>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.scheduled.values().cloned().collect())
    }
}
