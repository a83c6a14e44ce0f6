use chrono::{DateTime, Datelike, Duration, SecondsFormat, TimeZone, Utc};

use crate::error::{Result, SchedulerError};
use crate::types::Schedule;

/// Reject schedules that can never fire sensibly.
pub fn validate(schedule: &Schedule) -> Result<()> {
    match schedule {
        Schedule::Interval { every_secs: 0 } => Err(SchedulerError::InvalidSchedule(
            "interval must be at least one second".into(),
        )),
        Schedule::Daily { hour, minute } if *hour > 23 || *minute > 59 => Err(
            SchedulerError::InvalidSchedule(format!("invalid time of day {hour:02}:{minute:02}")),
        ),
        _ => Ok(()),
    }
}

/// Compute the next UTC execution time for `schedule` strictly after `from`.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Interval { every_secs } => {
            let secs = i64::try_from(*every_secs).ok()?;
            from.checked_add_signed(Duration::try_seconds(secs)?)
        }

        Schedule::Daily { hour, minute } => {
            let candidate = Utc
                .with_ymd_and_hms(
                    from.year(),
                    from.month(),
                    from.day(),
                    u32::from(*hour),
                    u32::from(*minute),
                    0,
                )
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(1))
            }
        }
    }
}

/// Fixed-width RFC 3339 (millisecond precision, `Z` suffix) so stored
/// timestamps compare correctly as text.
pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
