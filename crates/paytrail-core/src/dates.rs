//! Date-slot parsing.
//!
//! A value is accepted only if it looks like a date (ISO, `DD/MM/YYYY`, or
//! `D Month YYYY`) and names a real calendar day. Booleans and boolean-like
//! strings are rejected outright, never coerced.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::interest::{ScalarValue, is_boolean_literal};

static ISO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:[T ][0-9:.]+(?:Z|[+-]\d{2}:?\d{2})?)?$")
        .expect("iso date pattern")
});

static SLASHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("slashed date pattern"));

static WORDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+)\.?,?\s+(\d{4})$")
        .expect("worded date pattern")
});

/// Parse a field value as a date.
pub fn parse_date_value(value: &ScalarValue) -> Option<NaiveDate> {
    match value {
        ScalarValue::Text(s) => parse_date(s),
        _ => None,
    }
}

/// Parse a date-shaped string.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() || is_boolean_literal(s) {
        return None;
    }

    if let Some(caps) = ISO.captures(s) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = SLASHED.captures(s) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }
    if let Some(caps) = WORDED.captures(s) {
        let month = month_number(&caps[2])?;
        let day: u32 = caps[1].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    None
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Full month name or any prefix of at least three letters ("Sept" included).
fn month_number(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(&name))
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[rstest]
    #[case::iso("2024-03-05", date(2024, 3, 5))]
    #[case::iso_timestamp("2024-03-05T00:00:00", date(2024, 3, 5))]
    #[case::iso_zulu("2024-03-05T10:15:00Z", date(2024, 3, 5))]
    #[case::slashed("05/03/2024", date(2024, 3, 5))]
    #[case::slashed_short("5/3/2024", date(2024, 3, 5))]
    #[case::worded("5 March 2024", date(2024, 3, 5))]
    #[case::worded_abbrev("5 Mar 2024", date(2024, 3, 5))]
    #[case::worded_ordinal("21st September 2023", date(2023, 9, 21))]
    #[case::worded_sept("1 Sept 2023", date(2023, 9, 1))]
    fn accepts_date_shapes(#[case] raw: &str, #[case] expected: Option<NaiveDate>) {
        assert_eq!(parse_date(raw), expected);
    }

    #[rstest]
    #[case::false_literal("false")]
    #[case::true_literal("TRUE")]
    #[case::not_a_day("31/02/2024")]
    #[case::bad_month("2024-13-01")]
    #[case::us_order("12/31/2024")]
    #[case::freeform("sometime in 2024")]
    #[case::unknown_month("5 Smarch 2024")]
    #[case::empty("")]
    fn rejects_non_dates(#[case] raw: &str) {
        assert_eq!(parse_date(raw), None);
    }

    #[test]
    fn boolean_values_are_rejected() {
        assert_eq!(parse_date_value(&ScalarValue::Bool(false)), None);
        assert_eq!(parse_date_value(&ScalarValue::Number(20240305.0)), None);
    }
}
