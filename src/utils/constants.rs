pub const DEFAULT_PRIORITY: i64 = 5;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 2000;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETENTION_ON_SUCCESS: i64 = 0;
pub const DEFAULT_RETENTION_ON_FAILURE: i64 = 5;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;

pub const PREFIX_JOB: &str = "job";
pub const READY_QUEUE_KEY: &str = "job_queue";
pub const DELAYED_JOBS_KEY: &str = "delayed_jobs";
pub const SCHEDULED_JOBS_KEY: &str = "scheduled_jobs";
