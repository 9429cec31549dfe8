// src/processor.rs
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::job::Job;

/// A named callback that executes jobs of one kind.
///
/// Exactly one processor should be registered per distinct job name before
/// the service starts; jobs enqueued under an unregistered name fail
/// immediately and are not retried.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Routing key this processor handles.
    fn name(&self) -> &str;

    /// Reject malformed payloads at enqueue time. The queue calls this from
    /// `add` when a processor is already registered under the job's name.
    fn validate_payload(&self, _payload: &Value) -> anyhow::Result<()> {
        Ok(())
    }

    /// Execute one job. The returned value becomes the job's stored result.
    /// An error (or a timeout) counts as one failed attempt.
    async fn process(&self, job: &Job) -> anyhow::Result<Value>;
}

type ProcessFn = Box<dyn Fn(Job) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Adapter for registering a plain async closure as a processor.
pub struct FnProcessor {
    name: String,
    handler: ProcessFn,
}

impl FnProcessor {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Job) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Box::new(handler),
        }
    }
}

#[async_trait]
impl Processor for FnProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, job: &Job) -> anyhow::Result<Value> {
        (self.handler)(job.clone()).await
    }
}
