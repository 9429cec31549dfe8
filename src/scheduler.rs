use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::cron::CronSchedule;
use crate::job::JobOptions;
use crate::queue::JobQueue;
use crate::store::JobStore;

/// A recurring template. Each due tick synthesizes exactly one new job via
/// the queue; the template's lifetime is independent of the jobs it spawns,
/// so deleting it never retracts jobs already enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    pub name: String,
    /// 5-field cron expression, validated on create and update.
    pub cron: String,
    pub payload: Value,
    /// Options stamped onto every spawned job.
    pub options: JobOptions,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
}

/// Partial update for a scheduled job; unset fields keep their value.
#[derive(Debug, Clone, Default)]
pub struct ScheduledJobUpdate {
    pub cron: Option<String>,
    pub payload: Option<Value>,
    pub options: Option<JobOptions>,
    pub enabled: Option<bool>,
}

/// Cron-driven re-scheduler.
///
/// Templates are persisted in the shared store (the `scheduled_jobs` hash),
/// so definitions survive restarts; each tick reads them back, spawns
/// whatever is due, and writes the advanced `last_run`/`next_run`.
#[derive(Clone)]
pub struct JobScheduler {
    queue: JobQueue,
    store: Arc<dyn JobStore>,
    interval: Duration,
    tick_task: Arc<Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>>,
}

impl JobScheduler {
    pub fn new(queue: JobQueue, interval: Duration) -> Self {
        let store = queue.store().clone();
        Self {
            queue,
            store,
            interval,
            tick_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Create and persist a template, enabled, with `next_run` computed from
    /// now. Rejects invalid cron expressions.
    pub async fn add_scheduled_job(
        &self,
        name: &str,
        cron_expr: &str,
        payload: Value,
        options: JobOptions,
    ) -> Result<ScheduledJob> {
        let schedule = CronSchedule::parse(cron_expr)?;
        let next_run = schedule
            .next_after(Utc::now())
            .ok_or_else(|| anyhow!("cron expression '{cron_expr}' never fires"))?;
        let template = ScheduledJob {
            id: nanoid!(10),
            name: name.to_string(),
            cron: cron_expr.to_string(),
            payload,
            options,
            enabled: true,
            last_run: None,
            next_run,
        };
        self.store.put_scheduled(&template).await?;
        info!(
            "Added scheduled job {} ({}) with cron '{}', next run {}",
            template.id, template.name, template.cron, template.next_run
        );
        Ok(template)
    }

    pub async fn remove_scheduled_job(&self, id: &str) -> Result<bool> {
        self.store.delete_scheduled(id).await
    }

    /// Apply a partial update. A changed cron expression is re-validated and
    /// `next_run` recomputed from now. Returns the stored template, or
    /// `None` for an unknown id.
    pub async fn update_scheduled_job(
        &self,
        id: &str,
        update: ScheduledJobUpdate,
    ) -> Result<Option<ScheduledJob>> {
        let templates = self.store.all_scheduled().await?;
        let Some(mut template) = templates.into_iter().find(|t| t.id == id) else {
            return Ok(None);
        };

        if let Some(cron_expr) = update.cron {
            if cron_expr != template.cron {
                let schedule = CronSchedule::parse(&cron_expr)?;
                template.next_run = schedule
                    .next_after(Utc::now())
                    .ok_or_else(|| anyhow!("cron expression '{cron_expr}' never fires"))?;
                template.cron = cron_expr;
            }
        }
        if let Some(payload) = update.payload {
            template.payload = payload;
        }
        if let Some(options) = update.options {
            template.options = options;
        }
        if let Some(enabled) = update.enabled {
            template.enabled = enabled;
        }

        self.store.put_scheduled(&template).await?;
        Ok(Some(template))
    }

    pub async fn get_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
        let mut templates = self.store.all_scheduled().await?;
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(templates)
    }

    /// Install the tick task. The first tick runs immediately, later ones at
    /// the configured interval.
    pub async fn start(&self) {
        let mut guard = self.tick_task.lock().await;
        if guard.is_some() {
            return;
        }
        let (tx, mut rx) = watch::channel(false);
        let scheduler = self.clone();
        let interval = self.interval;
        let handle = tokio::spawn(async move {
            info!("Job scheduler started (tick interval {interval:?})");
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = scheduler.run_tick().await {
                            error!("Scheduler tick failed: {err:?}");
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Job scheduler stopped");
        });
        *guard = Some((tx, handle));
    }

    pub async fn stop(&self) {
        let mut guard = self.tick_task.lock().await;
        if let Some((tx, handle)) = guard.take() {
            let _ = tx.send(true);
            let _ = handle.await;
        }
    }

    /// One pass over the persisted templates: spawn every enabled, due one
    /// and advance its `last_run`/`next_run`. A failed spawn leaves the
    /// template due, so the next tick retries it.
    pub(crate) async fn run_tick(&self) -> Result<()> {
        let templates = self.store.all_scheduled().await?;
        let now = Utc::now();

        for mut template in templates {
            if !template.enabled || template.next_run > now {
                continue;
            }

            let schedule = match CronSchedule::parse(&template.cron) {
                Ok(schedule) => schedule,
                Err(err) => {
                    warn!(
                        "Scheduled job {} has an unusable cron '{}': {err}; skipping",
                        template.id, template.cron
                    );
                    continue;
                }
            };

            let spawned = self
                .queue
                .add(&template.name, template.payload.clone(), template.options.clone())
                .await;
            match spawned {
                Ok(job) => {
                    info!(
                        "Scheduled job {} ({}) spawned job {}",
                        template.id, template.name, job.id
                    );
                    template.last_run = Some(now);
                    match schedule.next_after(now) {
                        Some(next) => template.next_run = next,
                        None => {
                            warn!(
                                "Scheduled job {} has no future occurrence, disabling",
                                template.id
                            );
                            template.enabled = false;
                        }
                    }
                    self.store.put_scheduled(&template).await?;
                }
                Err(err) => {
                    error!(
                        "Scheduled job {} failed to enqueue, will retry next tick: {err:?}",
                        template.id
                    );
                }
            }
        }
        Ok(())
    }
}
