// src/bin/commands/brigade.rs
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::ArgMatches;
use colored::*;

use brigade::{JobQueue, JobScheduler, JobStatus, JobStore, RedisStore};

fn redis_url(matches: &ArgMatches) -> String {
    matches
        .get_one::<String>("redis-url")
        .cloned()
        .or_else(|| env::var("BRIGADE_REDIS_URL").ok())
        .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string())
}

fn open_queue(matches: &ArgMatches) -> Result<JobQueue> {
    let store: Arc<dyn JobStore> = Arc::new(RedisStore::connect(&redis_url(matches))?);
    Ok(JobQueue::new(store))
}

fn colored_status(status: JobStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        JobStatus::Completed => text.green(),
        JobStatus::Failed => text.red(),
        JobStatus::Running => text.cyan(),
        JobStatus::Pending => text.yellow(),
        JobStatus::Retrying => text.yellow(),
        JobStatus::Cancelled => text.normal(),
    }
}

pub async fn stats_command(matches: &ArgMatches) -> Result<()> {
    let queue = open_queue(matches)?;

    println!("{}", "Job counts per state".bold());
    for status in [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Retrying,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ] {
        let count = queue.count_by_status(status).await?;
        println!("  {:<10} {}", colored_status(status), count);
    }
    Ok(())
}

pub async fn jobs_command(matches: &ArgMatches) -> Result<()> {
    let queue = open_queue(matches)?;

    let status = match matches.get_one::<String>("status") {
        Some(raw) => Some(
            JobStatus::parse(raw).ok_or_else(|| anyhow!("unknown status '{raw}'"))?,
        ),
        None => None,
    };
    let limit: usize = matches
        .get_one::<String>("limit")
        .unwrap()
        .parse()
        .unwrap_or(10);

    let jobs = queue.get_jobs(status, 0, limit).await?;
    if jobs.is_empty() {
        println!("{}", "No jobs found.".blue());
        return Ok(());
    }

    for job in jobs {
        println!("• {} {}", "ID:".bold(), job.id.green());
        println!("  Name: {}", job.name);
        println!("  Status: {}", colored_status(job.status));
        println!("  Attempts: {}/{}", job.attempts, job.options.max_attempts);
        println!("  Created: {}", job.created_at.to_rfc3339());
        if let Some(error) = &job.error {
            println!("  Error: {}", error.red());
        }
        println!();
    }
    Ok(())
}

pub async fn retry_command(matches: &ArgMatches) -> Result<()> {
    let queue = open_queue(matches)?;

    if matches.get_flag("all") {
        let failed = queue
            .get_jobs(Some(JobStatus::Failed), 0, usize::MAX)
            .await?;
        let mut retried = 0;
        for job in failed {
            if queue.retry_job(&job.id).await? {
                retried += 1;
            }
        }
        println!("{}", format!("Retried {retried} failed jobs.").green());
        return Ok(());
    }

    let Some(job_id) = matches.get_one::<String>("job_id") else {
        return Err(anyhow!("pass a JOB_ID or --all"));
    };
    if queue.retry_job(job_id).await? {
        println!("{}", format!("Job {job_id} re-enqueued.").green());
    } else {
        println!("{}", "Job not found or not in a failed state.".red());
    }
    Ok(())
}

pub async fn remove_command(matches: &ArgMatches) -> Result<()> {
    let queue = open_queue(matches)?;
    let job_id = matches.get_one::<String>("job_id").unwrap();

    if queue.remove_job(job_id).await? {
        println!("{}", format!("Job {job_id} removed.").green());
    } else {
        println!("{}", "Job not found.".red());
    }
    Ok(())
}

pub async fn scheduled_command(matches: &ArgMatches) -> Result<()> {
    let queue = open_queue(matches)?;
    let scheduler = JobScheduler::new(queue, Duration::from_secs(60));

    let templates = scheduler.get_scheduled_jobs().await?;
    if templates.is_empty() {
        println!("{}", "No scheduled jobs.".blue());
        return Ok(());
    }

    for template in templates {
        let state = if template.enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        println!("• {} {} ({state})", "ID:".bold(), template.id.green());
        println!("  Name: {}", template.name);
        println!("  Cron: {}", template.cron);
        if let Some(last_run) = template.last_run {
            println!("  Last run: {}", last_run.to_rfc3339());
        }
        println!("  Next run: {}", template.next_run.to_rfc3339());
        println!();
    }
    Ok(())
}
