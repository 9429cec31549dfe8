// src/cron/cron_schedule.rs
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;

/// A recurring schedule in the 5-field cron form:
/// `minute hour day-of-month month day-of-week`.
///
/// Evaluation is delegated to the `cron` crate, so lists, ranges and step
/// values all work; the 5 fields are mapped onto the crate's 6-field syntax
/// with a zero seconds field.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    schedule: Schedule,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields = expr.split_whitespace().count();
        if fields != 5 {
            return Err(anyhow!(
                "invalid cron expression '{expr}': expected 5 fields (minute hour day-of-month month day-of-week), got {fields}"
            ));
        }
        let schedule = Schedule::from_str(&format!("0 {expr}"))
            .with_context(|| format!("invalid cron expression '{expr}'"))?;
        Ok(Self {
            expr: expr.to_string(),
            schedule,
        })
    }

    /// Next occurrence strictly after `from`. `None` only for expressions
    /// that can never fire again (e.g. an impossible date).
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hourly_rolls_to_top_of_next_hour() {
        let schedule = CronSchedule::parse("0 * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2025, 3, 12, 10, 45, 0).unwrap();
        let next = schedule.next_after(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 12, 11, 0, 0).unwrap());
    }

    #[test]
    fn monthly_rolls_to_first_of_next_month() {
        let schedule = CronSchedule::parse("0 0 1 * *").unwrap();
        let from = Utc.with_ymd_and_hms(2025, 1, 15, 12, 30, 0).unwrap();
        let next = schedule.next_after(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn fixed_minute_and_hour() {
        let schedule = CronSchedule::parse("30 9 * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let next = schedule.next_after(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap());
    }

    #[test]
    fn step_values_are_accepted() {
        let schedule = CronSchedule::parse("*/10 * * * *").unwrap();
        let from = Utc.with_ymd_and_hms(2025, 3, 12, 10, 45, 0).unwrap();
        let next = schedule.next_after(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 12, 10, 50, 0).unwrap());
    }

    #[test]
    fn rejects_wrong_field_count_and_garbage() {
        assert!(CronSchedule::parse("* * *").is_err());
        assert!(CronSchedule::parse("0 0 * * * *").is_err());
        assert!(CronSchedule::parse("not a cron at all").is_err());
    }
}
