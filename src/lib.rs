//! Distributed job queue, worker manager and cron scheduler, coordinated
//! through a shared Redis store so multiple service instances share one
//! backlog.
//!
//! The usual wiring:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use brigade::{FnProcessor, WorkerConfig, WorkerService};
//! use serde_json::json;
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let service = WorkerService::new(WorkerConfig::from_env())?;
//! service
//!     .register_processor(Arc::new(FnProcessor::new("send_message", |job| {
//!         Box::pin(async move {
//!             tracing::info!("delivering {}", job.payload);
//!             Ok(json!({"delivered": true}))
//!         })
//!     })))
//!     .await;
//! service.start().await;
//!
//! let job = service.add_job("send_message", json!({"user_id": 7}), None).await?;
//! println!("queued {}", job.id);
//! # Ok(())
//! # }
//! ```

pub mod basic_auth;
pub mod config;
pub mod cron;
pub mod job;
pub mod processor;
pub mod queue;
pub mod registry;
pub mod routes;
pub mod runner;
pub mod scheduler;
pub mod service;
pub mod services;
pub mod store;
pub mod utils;
pub mod worker;

#[cfg(test)]
mod tests;

pub use config::{BasicAuth, WorkerConfig};
pub use job::{Backoff, Job, JobOptions, JobStatus};
pub use processor::{FnProcessor, Processor};
pub use queue::JobQueue;
pub use scheduler::{JobScheduler, ScheduledJob, ScheduledJobUpdate};
pub use service::WorkerService;
pub use store::{JobStore, MemoryStore, RedisStore};
pub use worker::{JobStats, WorkerManager};
