use std::env;
use std::time::Duration;

/// Credentials guarding the dashboard routes.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Configuration for one worker service instance.
///
/// Constructed explicitly and handed to `WorkerService::new`; there is no
/// process-wide global to initialize.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis_url: String,
    /// How long a dispatch tick blocks on the store waiting for a ready job.
    pub poll_interval: Duration,
    /// Cadence of the cron scheduler's due check.
    pub scheduler_interval: Duration,
    /// When unset, the dashboard routes are open.
    pub dashboard_auth: Option<BasicAuth>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            poll_interval: Duration::from_secs(1),
            scheduler_interval: Duration::from_secs(60),
            dashboard_auth: None,
        }
    }
}

impl WorkerConfig {
    /// Defaults overridden by `BRIGADE_*` environment variables; unparsable
    /// values fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("BRIGADE_REDIS_URL") {
            config.redis_url = url;
        }
        if let Ok(raw) = env::var("BRIGADE_POLL_INTERVAL_MS") {
            if let Ok(ms) = raw.parse::<u64>() {
                config.poll_interval = Duration::from_millis(ms);
            }
        }
        if let Ok(raw) = env::var("BRIGADE_SCHEDULER_INTERVAL_SECS") {
            if let Ok(secs) = raw.parse::<u64>() {
                config.scheduler_interval = Duration::from_secs(secs);
            }
        }
        if let (Ok(username), Ok(password)) = (
            env::var("BRIGADE_DASHBOARD_USER"),
            env::var("BRIGADE_DASHBOARD_PASSWORD"),
        ) {
            config.dashboard_auth = Some(BasicAuth { username, password });
        }

        config
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_scheduler_interval(mut self, interval: Duration) -> Self {
        self.scheduler_interval = interval;
        self
    }

    pub fn with_dashboard_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.dashboard_auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}
