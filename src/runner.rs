use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

use crate::queue::JobQueue;

/// Spawn the single dispatcher task for this process.
///
/// Each iteration promotes due delayed jobs, then pops and fully executes at
/// most one ready job, blocking on the store for up to `poll_interval` while
/// waiting. One job start per iteration per instance; more throughput means
/// more instances sharing the store.
///
/// Shutdown is checked between iterations, never mid-job, so stopping waits
/// for the current job to finish (bounded by its timeout).
pub fn spawn_dispatcher(
    queue: JobQueue,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Dispatcher started (poll interval {poll_interval:?})");
        while !*shutdown.borrow() {
            tick(&queue, poll_interval).await;
        }
        info!("Dispatcher stopped");
    })
}

/// One dispatch tick. A store failure is logged and the tick skipped;
/// nothing was popped, so affected jobs surface again on the next tick.
async fn tick(queue: &JobQueue, poll_interval: Duration) {
    if queue.is_paused() {
        sleep(poll_interval).await;
        return;
    }

    if let Err(err) = queue.promote_due().await {
        error!("Delayed-job promotion failed, skipping tick: {err:?}");
        sleep(poll_interval).await;
        return;
    }

    match queue.dispatch_one(poll_interval).await {
        Ok(_) => {}
        Err(err) => {
            error!("Dispatch tick failed: {err:?}");
            sleep(poll_interval).await;
        }
    }
}
