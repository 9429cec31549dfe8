use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::job::JobStatus;
use crate::processor::Processor;
use crate::queue::JobQueue;

/// Aggregate job counts per lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobStats {
    /// Currently running.
    pub active: usize,
    /// Pending, eligible or not.
    pub waiting: usize,
    pub completed: usize,
    pub failed: usize,
    /// Waiting on a retry backoff.
    pub delayed: usize,
}

/// Registry and lifecycle façade over the job queue.
///
/// Keeps its own processor map for introspection alongside the queue's
/// dispatch registry, and toggles the queue's dispatch loop on start/stop.
#[derive(Clone)]
pub struct WorkerManager {
    queue: JobQueue,
    running: Arc<AtomicBool>,
    processors: Arc<RwLock<HashMap<String, Arc<dyn Processor>>>>,
}

impl WorkerManager {
    pub fn new(queue: JobQueue) -> Self {
        Self {
            queue,
            running: Arc::new(AtomicBool::new(false)),
            processors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.queue.resume();
        info!("Worker manager started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.queue.pause();
        info!("Worker manager stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn add_processor(&self, processor: Arc<dyn Processor>) {
        let name = processor.name().to_string();
        self.processors
            .write()
            .await
            .insert(name.clone(), processor.clone());
        self.queue.process(processor).await;
        info!("Registered processor '{name}'");
    }

    /// Unregister locally and from the queue, so jobs under this name start
    /// failing as routing errors instead of reaching a stale callback.
    pub async fn remove_processor(&self, name: &str) -> bool {
        let removed = self.processors.write().await.remove(name).is_some();
        self.queue.registry().remove(name).await;
        removed
    }

    pub async fn get_processor(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.processors.read().await.get(name).cloned()
    }

    pub async fn get_processors(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.processors.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Counts every job record per state by querying the queue per status.
    /// Costs a full scan per status; poll it at dashboard frequency only.
    pub async fn get_stats(&self) -> Result<JobStats> {
        Ok(JobStats {
            active: self.queue.count_by_status(JobStatus::Running).await?,
            waiting: self.queue.count_by_status(JobStatus::Pending).await?,
            completed: self.queue.count_by_status(JobStatus::Completed).await?,
            failed: self.queue.count_by_status(JobStatus::Failed).await?,
            delayed: self.queue.count_by_status(JobStatus::Retrying).await?,
        })
    }
}
