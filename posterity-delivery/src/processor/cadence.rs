//! The recurring trigger's timetable

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::DeliveryError;

/// Parse a six or seven field cron expression (seconds first).
///
/// # Errors
///
/// Returns [`DeliveryError::Schedule`] if the expression is invalid.
pub fn parse_schedule(expression: &str) -> Result<Schedule, DeliveryError> {
    Ok(Schedule::from_str(expression)?)
}

/// The first occurrence of `schedule` strictly after `after`, evaluated in `tz`.
///
/// # Errors
///
/// Returns [`DeliveryError::NoUpcomingRun`] if the schedule never fires again.
pub fn next_run_after(
    schedule: &Schedule,
    after: DateTime<Utc>,
    tz: Tz,
) -> Result<DateTime<Utc>, DeliveryError> {
    schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|at| at.with_timezone(&Utc))
        .ok_or(DeliveryError::NoUpcomingRun)
}
