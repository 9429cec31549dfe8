mod cron_schedule;

pub use cron_schedule::CronSchedule;
