use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Timelike, Utc};
use nanoid::nanoid;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::config::WorkerConfig;
use crate::job::{Backoff, Job, JobOptions, JobStatus};
use crate::processor::{FnProcessor, Processor};
use crate::queue::JobQueue;
use crate::service::WorkerService;
use crate::scheduler::{JobScheduler, ScheduledJob, ScheduledJobUpdate};
use crate::store::{JobStore, MemoryStore};
use crate::worker::WorkerManager;

fn new_queue() -> JobQueue {
    JobQueue::new(Arc::new(MemoryStore::new()))
}

/// Fails until `succeed_after` calls have happened, then echoes the payload.
struct FlakyProcessor {
    name: String,
    calls: Arc<AtomicUsize>,
    succeed_after: usize,
}

impl FlakyProcessor {
    fn always_ok(name: &str) -> (Arc<Self>, Arc<AtomicUsize>) {
        Self::new(name, 0)
    }

    fn always_failing(name: &str) -> (Arc<Self>, Arc<AtomicUsize>) {
        Self::new(name, usize::MAX)
    }

    fn new(name: &str, succeed_after: usize) -> (Arc<Self>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let processor = Arc::new(Self {
            name: name.to_string(),
            calls: calls.clone(),
            succeed_after,
        });
        (processor, calls)
    }
}

#[async_trait]
impl Processor for FlakyProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, job: &Job) -> anyhow::Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.succeed_after {
            anyhow::bail!("synthetic failure {n}");
        }
        Ok(json!({"echo": job.payload}))
    }
}

struct RecordingProcessor {
    name: String,
    seen: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl Processor for RecordingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, job: &Job) -> anyhow::Result<Value> {
        self.seen.lock().unwrap().push(job.payload.clone());
        Ok(Value::Null)
    }
}

struct ValidatingProcessor;

#[async_trait]
impl Processor for ValidatingProcessor {
    fn name(&self) -> &str {
        "send_message"
    }

    fn validate_payload(&self, payload: &Value) -> anyhow::Result<()> {
        anyhow::ensure!(payload.get("user_id").is_some(), "payload missing user_id");
        Ok(())
    }

    async fn process(&self, _job: &Job) -> anyhow::Result<Value> {
        Ok(json!({"sent": true}))
    }
}

/// Tick the queue by hand until the job satisfies `pred`.
async fn drain_until(
    queue: &JobQueue,
    id: &str,
    pred: impl Fn(&Job) -> bool,
) -> Job {
    for _ in 0..200 {
        queue.promote_due().await.unwrap();
        queue.dispatch_one(Duration::ZERO).await.unwrap();
        if let Some(job) = queue.get_job(id).await.unwrap() {
            if pred(&job) {
                return job;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached the expected state");
}

fn keep_history() -> JobOptions {
    JobOptions::default().with_retention_on_success(-1)
}

#[tokio::test]
async fn add_fills_defaults_and_persists_pending() {
    let queue = new_queue();
    let added = queue
        .add("send_message", json!({"user_id": 1}), JobOptions::default())
        .await
        .unwrap();

    let job = queue.get_job(&added.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.progress, 0);
    assert_eq!(job.options.priority, 5);
    assert_eq!(job.options.max_attempts, 3);
    assert_eq!(job.options.timeout_ms, 30_000);
    assert_eq!(job.options.retention_on_success, 0);
    assert_eq!(job.options.retention_on_failure, 5);
    assert!(job.started_at.is_none());
    assert!(job.result.is_none() && job.error.is_none());
}

#[tokio::test]
async fn dispatch_runs_processor_and_records_result() {
    let queue = new_queue();
    let (processor, calls) = FlakyProcessor::always_ok("greet");
    queue.process(processor).await;

    let job = queue
        .add("greet", json!({"who": "world"}), keep_history())
        .await
        .unwrap();
    let done = drain_until(&queue, &job.id, |j| j.status.is_terminal()).await;

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert_eq!(done.result, Some(json!({"echo": {"who": "world"}})));
    assert!(done.started_at.is_some() && done.completed_at.is_some());
    assert!(done.error.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unregistered_name_fails_terminally_without_retry() {
    let queue = new_queue();
    let job = queue
        .add("nobody_home", json!({}), JobOptions::default())
        .await
        .unwrap();

    queue.promote_due().await.unwrap();
    queue.dispatch_one(Duration::ZERO).await.unwrap();

    let failed = queue.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, 0);
    assert!(failed.error.unwrap().contains("No processor registered"));

    // Nothing left ranked; the failure is not retried.
    assert!(!queue.dispatch_one(Duration::ZERO).await.unwrap());
}

#[tokio::test]
async fn failing_job_is_attempted_exactly_max_attempts_times() {
    let queue = new_queue();
    let (processor, calls) = FlakyProcessor::always_failing("doomed");
    queue.process(processor).await;

    let options = JobOptions::default()
        .with_max_attempts(3)
        .with_backoff(Backoff::Fixed { base_delay_ms: 10 });
    let job = queue.add("doomed", json!({}), options).await.unwrap();

    let failed = drain_until(&queue, &job.id, |j| j.status == JobStatus::Failed).await;
    assert_eq!(failed.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(failed.error.unwrap().contains("synthetic failure"));
}

#[tokio::test]
async fn retry_waits_out_the_backoff_delay() {
    let queue = new_queue();
    let (processor, _) = FlakyProcessor::always_failing("doomed");
    queue.process(processor).await;

    let options = JobOptions::default()
        .with_max_attempts(2)
        .with_backoff(Backoff::Fixed { base_delay_ms: 60 });
    let job = queue.add("doomed", json!({}), options).await.unwrap();

    queue.promote_due().await.unwrap();
    queue.dispatch_one(Duration::ZERO).await.unwrap();
    let retrying = queue.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(retrying.status, JobStatus::Retrying);
    assert_eq!(retrying.attempts, 1);

    // Not yet eligible: the backoff window has not elapsed.
    queue.promote_due().await.unwrap();
    assert!(!queue.dispatch_one(Duration::ZERO).await.unwrap());

    sleep(Duration::from_millis(80)).await;
    let failed = drain_until(&queue, &job.id, |j| j.status == JobStatus::Failed).await;
    assert_eq!(failed.attempts, 2);
}

#[tokio::test]
async fn delayed_job_is_not_eligible_before_its_delay() {
    let queue = new_queue();
    let (processor, calls) = FlakyProcessor::always_ok("later");
    queue.process(processor).await;

    let options = keep_history().with_delay_ms(80);
    let job = queue.add("later", json!({}), options).await.unwrap();

    queue.promote_due().await.unwrap();
    assert!(!queue.dispatch_one(Duration::ZERO).await.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        queue.get_job(&job.id).await.unwrap().unwrap().status,
        JobStatus::Pending
    );

    sleep(Duration::from_millis(100)).await;
    let done = drain_until(&queue, &job.id, |j| j.status.is_terminal()).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dispatch_order_follows_priority() {
    let queue = new_queue();
    let seen = Arc::new(Mutex::new(Vec::new()));
    queue
        .process(Arc::new(RecordingProcessor {
            name: "ranked".to_string(),
            seen: seen.clone(),
        }))
        .await;

    for priority in [1i64, 5, 20] {
        let options = keep_history().with_priority(priority);
        queue
            .add("ranked", json!({"priority": priority}), options)
            .await
            .unwrap();
    }

    for _ in 0..3 {
        assert!(queue.dispatch_one(Duration::ZERO).await.unwrap());
    }

    let order: Vec<i64> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|p| p["priority"].as_i64().unwrap())
        .collect();
    assert_eq!(order, vec![20, 5, 1]);
}

#[tokio::test]
async fn cleanup_keeps_only_newest_completed_records() {
    let queue = new_queue();
    let (processor, _) = FlakyProcessor::always_ok("bulk");
    queue.process(processor).await;

    let mut ids = Vec::new();
    for n in 0..5 {
        let options = JobOptions::default().with_retention_on_success(3);
        let job = queue.add("bulk", json!({"n": n}), options).await.unwrap();
        drain_until(&queue, &job.id, |j| j.status == JobStatus::Completed).await;
        ids.push(job.id);
        sleep(Duration::from_millis(5)).await;
    }

    let kept = queue
        .get_jobs(Some(JobStatus::Completed), 0, 100)
        .await
        .unwrap();
    let kept_ids: Vec<&str> = kept.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(kept_ids, vec![ids[4].as_str(), ids[3].as_str(), ids[2].as_str()]);
}

#[tokio::test]
async fn negative_retention_disables_cleanup() {
    let queue = new_queue();
    let (processor, _) = FlakyProcessor::always_ok("bulk");
    queue.process(processor).await;

    for n in 0..4 {
        let job = queue.add("bulk", json!({"n": n}), keep_history()).await.unwrap();
        drain_until(&queue, &job.id, |j| j.status == JobStatus::Completed).await;
    }

    assert_eq!(
        queue.count_by_status(JobStatus::Completed).await.unwrap(),
        4
    );
}

#[tokio::test]
async fn default_retention_removes_completed_record_immediately() {
    let queue = new_queue();
    let (processor, calls) = FlakyProcessor::always_ok("fire_and_forget");
    queue.process(processor).await;

    let job = queue
        .add("fire_and_forget", json!({}), JobOptions::default())
        .await
        .unwrap();
    queue.promote_due().await.unwrap();
    queue.dispatch_one(Duration::ZERO).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(queue.get_job(&job.id).await.unwrap().is_none());
}

#[tokio::test]
async fn remove_job_is_idempotent() {
    let queue = new_queue();
    let job = queue.add("x", json!({}), JobOptions::default()).await.unwrap();

    assert!(queue.remove_job(&job.id).await.unwrap());
    assert!(!queue.remove_job(&job.id).await.unwrap());
}

#[tokio::test]
async fn cancel_prevents_a_pending_job_from_starting() {
    let queue = new_queue();
    let (processor, calls) = FlakyProcessor::always_ok("cancelme");
    queue.process(processor).await;

    let job = queue.add("cancelme", json!({}), keep_history()).await.unwrap();
    assert!(queue.cancel_job(&job.id).await.unwrap());

    queue.promote_due().await.unwrap();
    assert!(!queue.dispatch_one(Duration::ZERO).await.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let cancelled = queue.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());

    // Terminal: a second cancel is a no-op.
    assert!(!queue.cancel_job(&job.id).await.unwrap());
}

#[tokio::test]
async fn timeout_is_a_retriable_failure() {
    let queue = new_queue();
    queue
        .process(Arc::new(FnProcessor::new("slow", |_job| {
            Box::pin(async {
                sleep(Duration::from_millis(200)).await;
                Ok(Value::Null)
            })
        })))
        .await;

    let options = JobOptions::default()
        .with_timeout_ms(30)
        .with_max_attempts(2)
        .with_backoff(Backoff::Fixed { base_delay_ms: 10 });
    let job = queue.add("slow", json!({}), options).await.unwrap();

    let failed = drain_until(&queue, &job.id, |j| j.status == JobStatus::Failed).await;
    assert_eq!(failed.attempts, 2);
    assert_eq!(failed.error.as_deref(), Some("Job timeout"));
}

#[tokio::test]
async fn progress_updates_clamp_and_stop_at_terminal() {
    let queue = new_queue();
    let (processor, _) = FlakyProcessor::always_ok("steps");
    queue.process(processor).await;

    let job = queue.add("steps", json!({}), keep_history()).await.unwrap();
    assert!(queue.update_progress(&job.id, 150).await.unwrap());
    assert_eq!(queue.get_job(&job.id).await.unwrap().unwrap().progress, 100);

    drain_until(&queue, &job.id, |j| j.status == JobStatus::Completed).await;
    assert!(!queue.update_progress(&job.id, 10).await.unwrap());
}

#[tokio::test]
async fn payload_validation_rejects_bad_jobs_at_add_time() {
    let queue = new_queue();
    queue.process(Arc::new(ValidatingProcessor)).await;

    let err = queue
        .add("send_message", json!({"body": "hi"}), JobOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("user_id"));

    queue
        .add(
            "send_message",
            json!({"user_id": 9, "body": "hi"}),
            JobOptions::default(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn retry_job_gives_a_failed_job_a_fresh_run() {
    let queue = new_queue();
    // First call fails, later ones succeed.
    let (processor, _) = FlakyProcessor::new("eventually", 1);
    queue.process(processor).await;

    let options = keep_history().with_max_attempts(1);
    let job = queue.add("eventually", json!({}), options).await.unwrap();
    let failed = drain_until(&queue, &job.id, |j| j.status == JobStatus::Failed).await;
    assert_eq!(failed.attempts, 1);

    assert!(queue.retry_job(&job.id).await.unwrap());
    let reset = queue.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(reset.status, JobStatus::Pending);
    assert_eq!(reset.attempts, 0);
    assert!(reset.error.is_none());

    let done = drain_until(&queue, &job.id, |j| j.status.is_terminal()).await;
    assert_eq!(done.status, JobStatus::Completed);

    // Only terminally failed jobs are eligible.
    assert!(!queue.retry_job(&job.id).await.unwrap());
}

#[tokio::test]
async fn manager_stats_count_jobs_per_state() {
    let queue = new_queue();
    let manager = WorkerManager::new(queue.clone());
    let (ok_processor, _) = FlakyProcessor::always_ok("fine");
    let (bad_processor, _) = FlakyProcessor::always_failing("broken");
    manager.add_processor(ok_processor).await;
    manager.add_processor(bad_processor).await;

    // One completed record, kept by its retention.
    let done = queue.add("fine", json!({}), keep_history()).await.unwrap();
    drain_until(&queue, &done.id, |j| j.status == JobStatus::Completed).await;

    // One terminal failure, outranking the waiting job below.
    let failing = queue
        .add(
            "broken",
            json!({}),
            JobOptions::default()
                .with_priority(20)
                .with_max_attempts(1),
        )
        .await
        .unwrap();

    // One job left waiting at low priority.
    queue
        .add("fine", json!({}), JobOptions::default().with_priority(1))
        .await
        .unwrap();

    drain_until(&queue, &failing.id, |j| j.status == JobStatus::Failed).await;

    let stats = manager.get_stats().await.unwrap();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.delayed, 0);
}

#[tokio::test]
async fn manager_start_stop_toggles_queue_pause() {
    let queue = new_queue();
    let manager = WorkerManager::new(queue.clone());

    manager.start();
    assert!(manager.is_running());
    assert!(!queue.is_paused());

    manager.stop();
    assert!(!manager.is_running());
    assert!(queue.is_paused());
}

#[tokio::test]
async fn removing_a_processor_also_deregisters_dispatch() {
    let queue = new_queue();
    let manager = WorkerManager::new(queue.clone());
    let (processor, calls) = FlakyProcessor::always_ok("ephemeral");
    manager.add_processor(processor).await;
    assert_eq!(manager.get_processors().await, vec!["ephemeral".to_string()]);

    assert!(manager.remove_processor("ephemeral").await);
    assert!(manager.get_processor("ephemeral").await.is_none());

    let job = queue
        .add("ephemeral", json!({}), JobOptions::default())
        .await
        .unwrap();
    queue.dispatch_one(Duration::ZERO).await.unwrap();

    let failed = queue.get_job(&job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

fn due_template(name: &str, cron: &str, enabled: bool) -> ScheduledJob {
    ScheduledJob {
        id: nanoid!(10),
        name: name.to_string(),
        cron: cron.to_string(),
        payload: json!({"from": "cron"}),
        options: JobOptions::default(),
        enabled,
        last_run: None,
        next_run: Utc::now() - chrono::Duration::seconds(30),
    }
}

#[tokio::test]
async fn scheduler_spawns_exactly_one_job_per_due_template() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let queue = JobQueue::new(store.clone());
    let scheduler = JobScheduler::new(queue.clone(), Duration::from_secs(60));

    let template = due_template("nightly_digest", "0 * * * *", true);
    store.put_scheduled(&template).await.unwrap();

    scheduler.run_tick().await.unwrap();

    let jobs = queue.get_jobs(None, 0, 10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "nightly_digest");
    assert_eq!(jobs[0].payload, json!({"from": "cron"}));

    let stored = scheduler.get_scheduled_jobs().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].last_run.is_some());
    assert!(stored[0].next_run > Utc::now());

    // Already advanced past "now": the next tick spawns nothing new.
    scheduler.run_tick().await.unwrap();
    assert_eq!(queue.get_jobs(None, 0, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn disabled_template_spawns_nothing() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let queue = JobQueue::new(store.clone());
    let scheduler = JobScheduler::new(queue.clone(), Duration::from_secs(60));

    store
        .put_scheduled(&due_template("nightly_digest", "0 * * * *", false))
        .await
        .unwrap();

    scheduler.run_tick().await.unwrap();
    assert!(queue.get_jobs(None, 0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn scheduler_tick_task_runs_and_stops() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let queue = JobQueue::new(store.clone());
    let scheduler = JobScheduler::new(queue.clone(), Duration::from_millis(20));

    store
        .put_scheduled(&due_template("heartbeat", "* * * * *", true))
        .await
        .unwrap();

    scheduler.start().await;
    sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    assert!(!queue.get_jobs(None, 0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn scheduled_definitions_survive_a_restart() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let queue = JobQueue::new(store.clone());

    let first = JobScheduler::new(queue.clone(), Duration::from_secs(60));
    let added = first
        .add_scheduled_job("weekly_report", "0 9 * * 1", json!({}), JobOptions::default())
        .await
        .unwrap();

    // A new scheduler over the same store sees the same definitions.
    let second = JobScheduler::new(queue, Duration::from_secs(60));
    let templates = second.get_scheduled_jobs().await.unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].id, added.id);
    assert_eq!(templates[0].cron, "0 9 * * 1");
    assert!(templates[0].enabled);
}

#[tokio::test]
async fn updating_the_cron_recomputes_next_run() {
    let queue = new_queue();
    let scheduler = JobScheduler::new(queue, Duration::from_secs(60));
    let added = scheduler
        .add_scheduled_job("rollover", "0 * * * *", json!({}), JobOptions::default())
        .await
        .unwrap();

    let updated = scheduler
        .update_scheduled_job(
            &added.id,
            ScheduledJobUpdate {
                cron: Some("0 0 1 * *".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.cron, "0 0 1 * *");
    assert_eq!(updated.next_run.day(), 1);
    assert_eq!(updated.next_run.hour(), 0);
    assert_eq!(updated.next_run.minute(), 0);

    let disabled = scheduler
        .update_scheduled_job(
            &added.id,
            ScheduledJobUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert!(!disabled.enabled);

    // Unknown ids update nothing.
    assert!(scheduler
        .update_scheduled_job("missing", ScheduledJobUpdate::default())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn add_scheduled_job_rejects_bad_cron() {
    let queue = new_queue();
    let scheduler = JobScheduler::new(queue, Duration::from_secs(60));
    assert!(scheduler
        .add_scheduled_job("broken", "whenever", json!({}), JobOptions::default())
        .await
        .is_err());
}

#[tokio::test]
async fn remove_scheduled_job_is_idempotent() {
    let queue = new_queue();
    let scheduler = JobScheduler::new(queue, Duration::from_secs(60));
    let added = scheduler
        .add_scheduled_job("tmp", "0 * * * *", json!({}), JobOptions::default())
        .await
        .unwrap();

    assert!(scheduler.remove_scheduled_job(&added.id).await.unwrap());
    assert!(!scheduler.remove_scheduled_job(&added.id).await.unwrap());
}

#[tokio::test]
async fn memory_store_pop_orders_ties_like_the_redis_backend() {
    let store = MemoryStore::new();
    store.push_ready("alpha", 5).await.unwrap();
    store.push_ready("beta", 5).await.unwrap();

    // Equal scores resolve to the lexically greatest member first.
    assert_eq!(
        store.pop_ready(Duration::ZERO).await.unwrap().as_deref(),
        Some("beta")
    );
    assert_eq!(
        store.pop_ready(Duration::ZERO).await.unwrap().as_deref(),
        Some("alpha")
    );
    assert_eq!(store.pop_ready(Duration::from_millis(20)).await.unwrap(), None);
}

#[tokio::test]
async fn worker_service_runs_jobs_end_to_end() {
    let config = WorkerConfig::default()
        .with_poll_interval(Duration::from_millis(20))
        .with_scheduler_interval(Duration::from_millis(50));
    let service = WorkerService::with_store(Arc::new(MemoryStore::new()), config);
    let (processor, calls) = FlakyProcessor::always_ok("send_message");
    service.register_processor(processor).await;
    service.start().await;

    let job = service
        .add_job("send_message", json!({"user_id": 1}), Some(keep_history()))
        .await
        .unwrap();

    let mut done = None;
    for _ in 0..100 {
        if let Some(current) = service.queue().get_job(&job.id).await.unwrap() {
            if current.status.is_terminal() {
                done = Some(current);
                break;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    let done = done.expect("job never reached a terminal state");
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = service.job_stats().await.unwrap();
    assert_eq!(stats.completed, 1);

    service.stop().await;

    // Stopped: newly added jobs are persisted but stay pending.
    let parked = service
        .add_job("send_message", json!({"user_id": 2}), None)
        .await
        .unwrap();
    sleep(Duration::from_millis(80)).await;
    assert_eq!(
        service.queue().get_job(&parked.id).await.unwrap().unwrap().status,
        JobStatus::Pending
    );
}

#[tokio::test]
async fn get_jobs_returns_newest_first_with_paging() {
    let queue = new_queue();
    let mut ids = Vec::new();
    for n in 0..3 {
        let job = queue.add("x", json!({"n": n}), JobOptions::default()).await.unwrap();
        ids.push(job.id);
        sleep(Duration::from_millis(5)).await;
    }

    let first_page = queue.get_jobs(None, 0, 2).await.unwrap();
    let page_ids: Vec<&str> = first_page.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(page_ids, vec![ids[2].as_str(), ids[1].as_str()]);

    let second_page = queue.get_jobs(None, 2, 2).await.unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, ids[0]);
}
