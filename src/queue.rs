use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::job::{Job, JobOptions, JobStatus};
use crate::processor::Processor;
use crate::registry::Registry;
use crate::store::JobStore;

/// Owns job persistence and every lifecycle transition.
///
/// All state lives in the shared store, so any number of `JobQueue` handles
/// (in this process or others) operate on the same backlog. Cloning is cheap
/// and shares the same registry and pause flag.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    registry: Registry,
    paused: Arc<AtomicBool>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            registry: Registry::new(),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Construct, persist and rank a new job. Returns without waiting for
    /// processing; the outcome is observed by polling `get_job`.
    pub async fn add(&self, name: &str, payload: Value, options: JobOptions) -> Result<Job> {
        if let Some(processor) = self.registry.get(name).await {
            processor.validate_payload(&payload)?;
        }

        let job = Job::new(name, payload, options);
        self.store.put_job(&job).await?;

        if job.options.delay_ms > 0 {
            self.store
                .push_delayed(&job.id, job.eligible_at().timestamp_millis())
                .await?;
            info!(
                "Enqueued job {} ({}) delayed by {}ms",
                job.id, job.name, job.options.delay_ms
            );
        } else {
            self.store
                .push_ready(&job.id, job.options.priority)
                .await?;
            info!(
                "Enqueued job {} ({}) at priority {}",
                job.id, job.name, job.options.priority
            );
        }
        Ok(job)
    }

    /// Register the processor for its job name. A later registration under
    /// the same name replaces the earlier one.
    pub async fn process(&self, processor: Arc<dyn Processor>) {
        self.registry.insert(processor).await;
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        self.store.get_job(id).await
    }

    /// Jobs ordered most-recently-created first, optionally filtered by
    /// status. Scans every record; meant for dashboards, not hot paths.
    pub async fn get_jobs(
        &self,
        status: Option<JobStatus>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Job>> {
        let mut jobs = self.store.all_jobs().await?;
        if let Some(status) = status {
            jobs.retain(|job| job.status == status);
        }
        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    pub async fn count_by_status(&self, status: JobStatus) -> Result<usize> {
        let jobs = self.store.all_jobs().await?;
        Ok(jobs.iter().filter(|job| job.status == status).count())
    }

    /// Delete the record and any ranking entry. Returns false when the job
    /// was already gone, so a second call reports `false`.
    pub async fn remove_job(&self, id: &str) -> Result<bool> {
        self.store.remove_ready(id).await?;
        self.store.remove_delayed(id).await?;
        self.store.delete_job(id).await
    }

    /// Stop a job that has not started yet. Running and terminal jobs are
    /// not cancellable; there is no mid-flight cancellation.
    pub async fn cancel_job(&self, id: &str) -> Result<bool> {
        let Some(mut job) = self.store.get_job(id).await? else {
            return Ok(false);
        };
        if !matches!(job.status, JobStatus::Pending | JobStatus::Retrying) {
            return Ok(false);
        }
        self.store.remove_ready(id).await?;
        self.store.remove_delayed(id).await?;
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        self.store.put_job(&job).await?;
        info!("Cancelled job {} ({})", job.id, job.name);
        Ok(true)
    }

    /// Re-enqueue a terminally failed job as a fresh run: attempts reset,
    /// error cleared, ranked at its normal priority.
    pub async fn retry_job(&self, id: &str) -> Result<bool> {
        let Some(mut job) = self.store.get_job(id).await? else {
            return Ok(false);
        };
        if job.status != JobStatus::Failed {
            return Ok(false);
        }
        job.status = JobStatus::Pending;
        job.attempts = 0;
        job.progress = 0;
        job.error = None;
        job.result = None;
        job.started_at = None;
        job.completed_at = None;
        self.store.put_job(&job).await?;
        self.store
            .push_ready(&job.id, job.options.priority)
            .await?;
        info!("Re-enqueued failed job {} ({})", job.id, job.name);
        Ok(true)
    }

    /// Advisory progress update from a processor, clamped to 100.
    pub async fn update_progress(&self, id: &str, progress: u8) -> Result<bool> {
        let Some(mut job) = self.store.get_job(id).await? else {
            return Ok(false);
        };
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.progress = progress.min(100);
        self.store.put_job(&job).await?;
        Ok(true)
    }

    /// Stop dispatching without losing persisted state.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Move every due delayed job into the ready set at its priority. A job
    /// promoted here is eligible for this same tick's pop.
    pub(crate) async fn promote_due(&self) -> Result<()> {
        let due = self
            .store
            .claim_due_delayed(Utc::now().timestamp_millis())
            .await?;
        for id in due {
            let Some(mut job) = self.store.get_job(&id).await? else {
                // Record deleted while the id sat in the delayed set.
                debug!("Dropping delayed entry for missing job {id}");
                continue;
            };
            if job.status.is_terminal() {
                continue;
            }
            job.status = JobStatus::Pending;
            self.store.put_job(&job).await?;
            self.store.push_ready(&id, job.options.priority).await?;
            debug!("Promoted delayed job {id} to ready");
        }
        Ok(())
    }

    /// Pop and fully execute at most one ready job, waiting up to `wait` for
    /// one to appear. Returns whether an id was popped.
    pub(crate) async fn dispatch_one(&self, wait: Duration) -> Result<bool> {
        let Some(id) = self.store.pop_ready(wait).await? else {
            return Ok(false);
        };

        let Some(mut job) = self.store.get_job(&id).await? else {
            // Popped an id whose record is gone: already removed, drop it.
            debug!("Dropping ready entry for missing job {id}");
            return Ok(true);
        };

        let Some(processor) = self.registry.get(&job.name).await else {
            // Configuration error, not a runtime one. Terminal, never retried.
            let message = format!("No processor registered for '{}'", job.name);
            error!("Job {} failed: {message}", job.id);
            job.status = JobStatus::Failed;
            job.error = Some(message);
            job.completed_at = Some(Utc::now());
            self.store.put_job(&job).await?;
            self.run_cleanup(JobStatus::Failed, job.options.retention_on_failure)
                .await;
            return Ok(true);
        };

        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        self.store.put_job(&job).await?;
        debug!("Running job {} ({})", job.id, job.name);

        let budget = Duration::from_millis(job.options.timeout_ms);
        let outcome = tokio::time::timeout(budget, processor.process(&job)).await;
        match outcome {
            Ok(Ok(result)) => self.complete_job(job, result).await?,
            Ok(Err(err)) => self.fail_or_retry(job, format!("{err:#}")).await?,
            Err(_) => self.fail_or_retry(job, "Job timeout".to_string()).await?,
        }
        Ok(true)
    }

    async fn complete_job(&self, mut job: Job, result: Value) -> Result<()> {
        job.status = JobStatus::Completed;
        job.progress = 100;
        job.result = Some(result);
        job.completed_at = Some(Utc::now());
        self.store.put_job(&job).await?;
        info!("Job {} ({}) completed", job.id, job.name);
        self.run_cleanup(JobStatus::Completed, job.options.retention_on_success)
            .await;
        Ok(())
    }

    async fn fail_or_retry(&self, mut job: Job, error: String) -> Result<()> {
        job.attempts += 1;
        if job.attempts < job.options.max_attempts {
            let backoff_ms = job.options.backoff.delay_ms(job.attempts);
            job.status = JobStatus::Retrying;
            self.store.put_job(&job).await?;
            self.store
                .push_delayed(
                    &job.id,
                    Utc::now().timestamp_millis() + backoff_ms as i64,
                )
                .await?;
            warn!(
                "Job {} ({}) attempt {}/{} failed: {error}; retrying in {backoff_ms}ms",
                job.id, job.name, job.attempts, job.options.max_attempts
            );
        } else {
            job.status = JobStatus::Failed;
            job.error = Some(error.clone());
            job.completed_at = Some(Utc::now());
            self.store.put_job(&job).await?;
            error!(
                "Job {} ({}) failed after {} attempts: {error}",
                job.id, job.name, job.attempts
            );
            self.run_cleanup(JobStatus::Failed, job.options.retention_on_failure)
                .await;
        }
        Ok(())
    }

    /// Bound the terminal history: keep the `retention` newest records in
    /// `status`, delete the rest. `-1` disables cleanup, `0` keeps none.
    async fn run_cleanup(&self, status: JobStatus, retention: i64) {
        if retention < 0 {
            return;
        }
        if let Err(err) = self.cleanup(status, retention as usize).await {
            warn!("History cleanup for {status} jobs failed: {err:?}");
        }
    }

    async fn cleanup(&self, status: JobStatus, keep: usize) -> Result<()> {
        let mut jobs = self.store.all_jobs().await?;
        jobs.retain(|job| job.status == status);
        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        for job in jobs.iter().skip(keep) {
            self.store.delete_job(&job.id).await?;
            debug!("Cleaned up {} job {}", status, job.id);
        }
        Ok(())
    }
}
