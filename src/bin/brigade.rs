// src/bin/brigade.rs
use std::process;

use anyhow::Result;
use clap::{Arg, Command};

mod commands;
use commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    let app = Command::new("brigade")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Brigade - background job queue CLI")
        .arg(
            Arg::new("redis-url")
                .long("redis-url")
                .value_name("URL")
                .help("Redis connection URL (defaults to BRIGADE_REDIS_URL)")
                .global(true),
        )
        .subcommand(Command::new("stats").about("Show job counts per state"))
        .subcommand(
            Command::new("jobs")
                .about("List jobs, newest first")
                .arg(
                    Arg::new("status")
                        .short('s')
                        .long("status")
                        .value_name("STATUS")
                        .help("pending, running, completed, failed, cancelled or retrying"),
                )
                .arg(
                    Arg::new("limit")
                        .short('n')
                        .long("limit")
                        .value_name("NUMBER")
                        .default_value("10"),
                ),
        )
        .subcommand(
            Command::new("retry")
                .about("Re-enqueue failed jobs")
                .arg(Arg::new("job_id").value_name("JOB_ID"))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(clap::ArgAction::SetTrue)
                        .help("Retry every failed job"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Delete a job record and its queue entries")
                .arg(Arg::new("job_id").value_name("JOB_ID").required(true)),
        )
        .subcommand(Command::new("scheduled").about("List recurring job templates"));

    let matches = app.get_matches();

    match matches.subcommand() {
        Some(("stats", sub)) => stats_command(sub).await,
        Some(("jobs", sub)) => jobs_command(sub).await,
        Some(("retry", sub)) => retry_command(sub).await,
        Some(("remove", sub)) => remove_command(sub).await,
        Some(("scheduled", sub)) => scheduled_command(sub).await,
        _ => {
            eprintln!("No subcommand given. Try 'brigade --help'.");
            process::exit(1);
        }
    }
}
