use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RecurrenceError, Result};

/// Months are a fixed 30 days, not calendar months: a monthly item anchored
/// on Jan 1 is next due Jan 31.
pub const DAYS_PER_MONTH: u64 = 30;
pub const DAYS_PER_WEEK: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Days,
    Weeks,
    Months,
}

impl RecurrenceUnit {
    pub fn days(&self) -> u64 {
        match self {
            RecurrenceUnit::Days => 1,
            RecurrenceUnit::Weeks => DAYS_PER_WEEK,
            RecurrenceUnit::Months => DAYS_PER_MONTH,
        }
    }
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecurrenceUnit::Days => "days",
            RecurrenceUnit::Weeks => "weeks",
            RecurrenceUnit::Months => "months",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RecurrenceUnit {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "days" => Ok(RecurrenceUnit::Days),
            "weeks" => Ok(RecurrenceUnit::Weeks),
            "months" => Ok(RecurrenceUnit::Months),
            other => Err(RecurrenceError::InvalidRecurrenceUnit(other.to_string())),
        }
    }
}

/// How often a habit or routine repeats: every `multiplier` `unit`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurrenceRule {
    unit: RecurrenceUnit,
    multiplier: u32,
}

impl RecurrenceRule {
    /// Fails unless `multiplier` is a positive integer that fits in `u32`.
    pub fn new(unit: RecurrenceUnit, multiplier: i64) -> Result<Self> {
        let multiplier = u32::try_from(multiplier)
            .ok()
            .filter(|m| *m > 0)
            .ok_or(RecurrenceError::InvalidRecurrenceMultiplier(multiplier))?;
        Ok(Self { unit, multiplier })
    }

    /// Build a rule from the stored `occurence` / `x_occurence` fields.
    pub fn parse(unit: &str, multiplier: i64) -> Result<Self> {
        Self::new(unit.parse()?, multiplier)
    }

    pub fn unit(&self) -> RecurrenceUnit {
        self.unit
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Length of one period in days.
    pub fn span_days(&self) -> u64 {
        self.unit.days() * u64::from(self.multiplier)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} {}", self.multiplier, self.unit)
    }
}

/// Next occurrence after `anchor`: `anchor + span` with no further
/// adjustment (no "due the day before" shift).
pub fn next_due(anchor: NaiveDate, rule: &RecurrenceRule) -> Result<NaiveDate> {
    let days = rule.span_days();
    anchor
        .checked_add_days(Days::new(days))
        .ok_or(RecurrenceError::DateOutOfRange { anchor, days })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(unit: &str, n: i64) -> RecurrenceRule {
        RecurrenceRule::parse(unit, n).unwrap()
    }

    #[test]
    fn days_add_plain_days() {
        assert_eq!(next_due(ymd(2025, 1, 1), &rule("days", 3)).unwrap(), ymd(2025, 1, 4));
    }

    #[test]
    fn weeks_are_seven_days() {
        assert_eq!(next_due(ymd(2025, 1, 1), &rule("weeks", 2)).unwrap(), ymd(2025, 1, 15));
    }

    #[test]
    fn months_are_thirty_days() {
        assert_eq!(next_due(ymd(2025, 1, 1), &rule("months", 1)).unwrap(), ymd(2025, 1, 31));
        // Crosses February without calendar-month arithmetic.
        assert_eq!(next_due(ymd(2025, 1, 31), &rule("months", 1)).unwrap(), ymd(2025, 3, 2));
    }

    #[test]
    fn crosses_leap_day() {
        assert_eq!(next_due(ymd(2024, 2, 28), &rule("days", 1)).unwrap(), ymd(2024, 2, 29));
    }

    #[test]
    fn deterministic() {
        let anchor = ymd(2025, 6, 15);
        for r in [rule("days", 1), rule("weeks", 3), rule("months", 12)] {
            assert_eq!(next_due(anchor, &r), next_due(anchor, &r));
        }
    }

    #[test]
    fn unknown_unit_rejected() {
        assert_eq!(
            RecurrenceRule::parse("fortnights", 1),
            Err(RecurrenceError::InvalidRecurrenceUnit("fortnights".into()))
        );
        assert!(RecurrenceRule::parse("Days", 1).is_err());
    }

    #[test]
    fn non_positive_multiplier_rejected() {
        assert_eq!(
            RecurrenceRule::parse("days", 0),
            Err(RecurrenceError::InvalidRecurrenceMultiplier(0))
        );
        assert!(RecurrenceRule::parse("weeks", -2).is_err());
        assert!(RecurrenceRule::parse("weeks", i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        let err = next_due(NaiveDate::MAX, &rule("days", 1)).unwrap_err();
        assert!(matches!(err, RecurrenceError::DateOutOfRange { .. }));
    }
}
