// src/job.rs
use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use nanoid::nanoid;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::utils::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_PRIORITY,
    DEFAULT_RETENTION_ON_FAILURE, DEFAULT_RETENTION_ON_SUCCESS, DEFAULT_TIMEOUT_MS,
};

/// Lifecycle state of a job record.
///
/// `Completed` and `Cancelled` are final. `Failed` is final for dispatch but
/// can be re-enqueued explicitly through `JobQueue::retry_job`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Retrying,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Retrying => "retrying",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            "retrying" => Some(JobStatus::Retrying),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay strategy applied between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backoff {
    Fixed { base_delay_ms: u64 },
    Exponential { base_delay_ms: u64 },
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based). Exponential doubles per
    /// attempt: base, base*2, base*4, ...
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        match self {
            Backoff::Fixed { base_delay_ms } => *base_delay_ms,
            Backoff::Exponential { base_delay_ms } => {
                let exp = attempt.saturating_sub(1).min(32);
                base_delay_ms.saturating_mul(1u64 << exp)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            base_delay_ms: DEFAULT_BACKOFF_BASE_MS,
        }
    }
}

/// Per-job tuning knobs. Every field has a default so callers only set what
/// they care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Higher runs sooner.
    pub priority: i64,
    /// Milliseconds before the job first becomes eligible for dispatch.
    pub delay_ms: u64,
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Wall-clock budget for a single processor invocation.
    pub timeout_ms: u64,
    /// Completed records kept after cleanup. `-1` keeps everything, `0` none.
    pub retention_on_success: i64,
    /// Failed records kept after cleanup, for diagnosis.
    pub retention_on_failure: i64,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            delay_ms: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retention_on_success: DEFAULT_RETENTION_ON_SUCCESS,
            retention_on_failure: DEFAULT_RETENTION_ON_FAILURE,
        }
    }
}

impl JobOptions {
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retention_on_success(mut self, retention: i64) -> Self {
        self.retention_on_success = retention;
        self
    }

    pub fn with_retention_on_failure(mut self, retention: i64) -> Self {
        self.retention_on_failure = retention;
        self
    }
}

/// One unit of deferred work, persisted in the shared store for its whole
/// lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Routing key; resolves the processor at dispatch time.
    pub name: String,
    /// Opaque to the queue. Processors decode it with `payload_as`.
    pub payload: Value,
    pub options: JobOptions,
    pub status: JobStatus,
    /// Advisory 0..=100, reported by processors.
    pub progress: u8,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(name: impl Into<String>, payload: Value, options: JobOptions) -> Self {
        Self {
            id: nanoid!(10),
            name: name.into(),
            payload,
            options,
            status: JobStatus::Pending,
            progress: 0,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Earliest instant the first dispatch may pick this job up.
    pub fn eligible_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::milliseconds(self.options.delay_ms as i64)
    }

    /// Decode the payload into a concrete type inside a processor.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone())
            .with_context(|| format!("invalid payload for job '{}'", self.name))
    }

    /// Flatten into the hash-field layout used by the store. Every field is
    /// always written so a rewrite clears stale values.
    pub fn to_fields(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            ("id", self.id.clone()),
            ("name", self.name.clone()),
            ("payload", serde_json::to_string(&self.payload)?),
            ("options", serde_json::to_string(&self.options)?),
            ("status", self.status.as_str().to_string()),
            ("progress", self.progress.to_string()),
            ("attempts", self.attempts.to_string()),
            ("created_at", self.created_at.to_rfc3339()),
            (
                "started_at",
                self.started_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            ),
            (
                "completed_at",
                self.completed_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            ),
            (
                "result",
                self.result
                    .as_ref()
                    .map(|v| serde_json::to_string(v))
                    .transpose()?
                    .unwrap_or_default(),
            ),
            ("error", self.error.clone().unwrap_or_default()),
        ])
    }

    /// Rebuild a job from its stored hash fields.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        fn field<'a>(fields: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
            fields
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| anyhow!("job record missing field '{key}'"))
        }

        fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
            Ok(DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("bad timestamp '{raw}'"))?
                .with_timezone(&Utc))
        }

        fn opt_time(fields: &HashMap<String, String>, key: &str) -> Result<Option<DateTime<Utc>>> {
            match fields.get(key).map(String::as_str) {
                Some("") | None => Ok(None),
                Some(raw) => Ok(Some(parse_time(raw)?)),
            }
        }

        let status_raw = field(fields, "status")?;
        let status = JobStatus::parse(status_raw)
            .ok_or_else(|| anyhow!("unknown job status '{status_raw}'"))?;

        Ok(Self {
            id: field(fields, "id")?.to_string(),
            name: field(fields, "name")?.to_string(),
            payload: serde_json::from_str(field(fields, "payload")?)?,
            options: serde_json::from_str(field(fields, "options")?)?,
            status,
            progress: field(fields, "progress")?.parse()?,
            attempts: field(fields, "attempts")?.parse()?,
            created_at: parse_time(field(fields, "created_at")?)?,
            started_at: opt_time(fields, "started_at")?,
            completed_at: opt_time(fields, "completed_at")?,
            result: match fields.get("result").map(String::as_str) {
                Some("") | None => None,
                Some(raw) => Some(serde_json::from_str(raw)?),
            },
            error: match fields.get("error").map(String::as_str) {
                Some("") | None => None,
                Some(raw) => Some(raw.to_string()),
            },
        })
    }
}
