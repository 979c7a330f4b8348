use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Defines when and how often a cron job (CLI `cron add`) should run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Run exactly once at the given UTC instant.
    Once { at: DateTime<Utc> },
    /// Run repeatedly with a fixed interval in seconds.
    Interval { every_secs: u64 },
    /// Run every day at the given hour and minute (UTC).
    Daily { hour: u8, minute: u8 },
    /// Run on a specific weekday (0 = Monday … 6 = Sunday) at the given time (UTC).
    Weekly { day: u8, hour: u8, minute: u8 },
    /// Run according to a standard 5/6-field cron expression.
    Cron { expression: String },
}

/// Compute the next UTC execution time for `schedule` starting *after* `from`.
///
/// Returns `None` when the schedule is exhausted (a `Once` job whose time has
/// passed) or the expression can't be parsed.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => {
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }

        Schedule::Interval { every_secs } => Some(from + Duration::seconds(*every_secs as i64)),

        Schedule::Daily { hour, minute } => {
            let candidate = Utc
                .with_ymd_and_hms(from.year(), from.month(), from.day(), *hour as u32, *minute as u32, 0)
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(1))
            }
        }

        Schedule::Weekly { day, hour, minute } => {
            let today_dow = from.weekday().num_days_from_monday() as i64;
            let target_dow = (*day as i64).clamp(0, 6);
            let mut days_ahead = target_dow - today_dow;
            let candidate_day = if days_ahead < 0 {
                from + Duration::days(7 + days_ahead)
            } else {
                from + Duration::days(days_ahead)
            };
            let candidate = Utc
                .with_ymd_and_hms(candidate_day.year(), candidate_day.month(), candidate_day.day(), *hour as u32, *minute as u32, 0)
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                days_ahead = if days_ahead <= 0 { 7 } else { 7 - days_ahead };
                Some(candidate + Duration::days(days_ahead))
            }
        }

        Schedule::Cron { expression } => match cron::Schedule::from_str(expression) {
            Ok(parsed) => parsed.after(&from).next(),
            Err(e) => {
                warn!(expression, error = %e, "unparseable cron expression");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_schedule_fires_only_in_future() {
        let now = Utc::now();
        assert!(compute_next_run(&Schedule::Once { at: now - Duration::seconds(1) }, now).is_none());
        assert!(compute_next_run(&Schedule::Once { at: now + Duration::seconds(1) }, now).is_some());
    }

    #[test]
    fn interval_schedule_adds_seconds() {
        let now = Utc::now();
        let next = compute_next_run(&Schedule::Interval { every_secs: 60 }, now).unwrap();
        assert_eq!(next, now + Duration::seconds(60));
    }

    #[test]
    fn cron_schedule_parses_standard_expression() {
        let now = Utc::now();
        let next = compute_next_run(&Schedule::Cron { expression: "0 0 * * * *".to_string() }, now);
        assert!(next.is_some());
    }

    #[test]
    fn cron_schedule_rejects_garbage() {
        let now = Utc::now();
        let next = compute_next_run(&Schedule::Cron { expression: "not a cron".to_string() }, now);
        assert!(next.is_none());
    }
}
