//! Calendar-date wire format.
//!
//! Dates are persisted as `DD-MM-YY` (e.g. `05-01-25` for 2025-01-05), which
//! is what every existing record in the store uses. ISO `YYYY-MM-DD` is also
//! accepted on input because API clients send it.

use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serializer};

pub const WIRE_FORMAT: &str = "%d-%m-%y";
pub const ISO_FORMAT: &str = "%Y-%m-%d";

/// Parse a stored or client-supplied date. Returns `None` for anything that
/// is neither `DD-MM-YY` nor `YYYY-MM-DD`.
pub fn parse(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let bytes = s.as_bytes();
    // Length and separator positions pick the format; trying `%Y` first would
    // read "01-02-25" as year 1.
    if bytes.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        NaiveDate::parse_from_str(s, ISO_FORMAT).ok()
    } else if bytes.len() == 8 && bytes[2] == b'-' && bytes[5] == b'-' {
        NaiveDate::parse_from_str(s, WIRE_FORMAT).ok()
    } else {
        None
    }
}

pub fn format(date: &NaiveDate) -> String {
    date.format(WIRE_FORMAT).to_string()
}

/// `#[serde(with = "aura_core::dates")]` adapter.
pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(date))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| {
        de::Error::custom(format!(
            "invalid date {raw:?}: expected DD-MM-YY or YYYY-MM-DD"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_wire_format() {
        assert_eq!(parse("05-01-25"), Some(ymd(2025, 1, 5)));
        assert_eq!(parse("31-12-24"), Some(ymd(2024, 12, 31)));
    }

    #[test]
    fn parses_iso_format() {
        assert_eq!(parse("2025-01-05"), Some(ymd(2025, 1, 5)));
    }

    #[test]
    fn short_form_is_not_read_as_iso_year() {
        assert_eq!(parse("01-02-25"), Some(ymd(2025, 2, 1)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("tomorrow"), None);
        assert_eq!(parse("32-01-25"), None);
        assert_eq!(parse("2025/01/05"), None);
    }

    #[test]
    fn formats_as_wire() {
        assert_eq!(format(&ymd(2025, 1, 5)), "05-01-25");
    }
}
