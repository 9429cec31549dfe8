use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::WorkerConfig;
use crate::job::{Job, JobOptions};
use crate::processor::Processor;
use crate::queue::JobQueue;
use crate::runner;
use crate::scheduler::JobScheduler;
use crate::store::{JobStore, RedisStore};
use crate::worker::{JobStats, WorkerManager};

/// Composition root for the worker subsystem.
///
/// Owns the store handle and constructs the queue, manager and scheduler
/// around it. Built once at process start and passed by reference (or cheap
/// clone) to whatever needs `add_job`; the application-facing surface is
/// `add_job` and `job_stats`, everything else is internal wiring.
#[derive(Clone)]
pub struct WorkerService {
    config: WorkerConfig,
    queue: JobQueue,
    manager: WorkerManager,
    scheduler: JobScheduler,
    dispatcher: Arc<Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>>,
}

impl WorkerService {
    /// Connect to the Redis store named by the config.
    pub fn new(config: WorkerConfig) -> Result<Self> {
        let store: Arc<dyn JobStore> = Arc::new(RedisStore::connect(&config.redis_url)?);
        Ok(Self::with_store(store, config))
    }

    /// Build on an explicit store, e.g. `MemoryStore` in tests.
    pub fn with_store(store: Arc<dyn JobStore>, config: WorkerConfig) -> Self {
        let queue = JobQueue::new(store);
        let manager = WorkerManager::new(queue.clone());
        let scheduler = JobScheduler::new(queue.clone(), config.scheduler_interval);
        Self {
            config,
            queue,
            manager,
            scheduler,
            dispatcher: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a processing callback. Call for every job kind before
    /// `start`; jobs under unregistered names fail immediately.
    pub async fn register_processor(&self, processor: Arc<dyn Processor>) {
        self.manager.add_processor(processor).await;
    }

    /// Start the dispatch loop and the cron scheduler. Idempotent.
    pub async fn start(&self) {
        let mut guard = self.dispatcher.lock().await;
        if guard.is_none() {
            let (tx, rx) = watch::channel(false);
            let handle =
                runner::spawn_dispatcher(self.queue.clone(), self.config.poll_interval, rx);
            *guard = Some((tx, handle));
        }
        drop(guard);
        self.manager.start();
        self.scheduler.start().await;
    }

    /// Stop dispatching and scheduling. Waits for an in-flight job to
    /// finish; persisted state is untouched and a later `start` resumes it.
    pub async fn stop(&self) {
        self.manager.stop();
        self.scheduler.stop().await;
        let mut guard = self.dispatcher.lock().await;
        if let Some((tx, handle)) = guard.take() {
            let _ = tx.send(true);
            let _ = handle.await;
        }
    }

    /// Queue a job. Succeeds once the job is persisted and ranked; the
    /// outcome is asynchronous and observed via `queue().get_job` polling.
    pub async fn add_job(
        &self,
        name: &str,
        payload: Value,
        options: Option<JobOptions>,
    ) -> Result<Job> {
        self.queue
            .add(name, payload, options.unwrap_or_default())
            .await
    }

    pub async fn job_stats(&self) -> Result<JobStats> {
        self.manager.get_stats().await
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn manager(&self) -> &WorkerManager {
        &self.manager
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }
}
