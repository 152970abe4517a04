//! Currency-string parsing.
//!
//! Register amounts arrive as numbers, as `"£1,234.56"`, as ranges like
//! `"£10,000-£15,000"`, or prefixed with an estimate marker
//! (`"Estimated value £2,500"`). Malformed input is the normal case, so
//! parsing yields `None` instead of an error.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::interest::ScalarValue;

static ESTIMATED_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*estimated\s+value\b.*?(\d[\d,]*(?:\.\d+)?)\s*$")
        .expect("estimated-value pattern")
});

const CURRENCY_SYMBOLS: &[char] = &['£', '$', '€'];

/// Parse a field value into an amount. Numbers pass through unchanged.
pub fn parse_amount(value: &ScalarValue) -> Option<Decimal> {
    match value {
        ScalarValue::Number(n) => Decimal::try_from(*n).ok(),
        ScalarValue::Text(s) => parse_currency(s),
        ScalarValue::Bool(_) | ScalarValue::Other(_) => None,
    }
}

/// Parse a currency string.
///
/// A dash-separated range yields the midpoint of its bounds when both parse.
pub fn parse_currency(raw: &str) -> Option<Decimal> {
    let raw = match ESTIMATED_VALUE.captures(raw) {
        Some(caps) => caps.get(1).map_or(raw, |m| m.as_str()),
        None => raw,
    };

    let cleaned: String = raw
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalised = cleaned.replace(['–', '—'], "-");
    if let Some((low, high)) = normalised.split_once('-')
        && let (Some(low), Some(high)) = (parse_number(low), parse_number(high))
        && let Some(sum) = low.checked_add(high)
    {
        return Some(sum / Decimal::TWO);
    }

    parse_number(&normalised)
}

fn parse_number(s: &str) -> Option<Decimal> {
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
        .or_else(|| {
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(|f| Decimal::try_from(f).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("1500", 1500)]
    #[case::pounds_and_commas("£1,500", 1500)]
    #[case::padded("  £ 2,000  ", 2000)]
    #[case::dollars("$750", 750)]
    #[case::range("£10,000-£15,000", 12500)]
    #[case::range_en_dash("£1,000 – £2,000", 1500)]
    #[case::estimated("Estimated value £2,500", 2500)]
    #[case::estimated_lowercase("estimated value: approx £3,000", 3000)]
    fn parses_whole_amounts(#[case] raw: &str, #[case] expected: i64) {
        assert_eq!(parse_currency(raw), Some(Decimal::from(expected)));
    }

    #[test]
    fn parses_pence() {
        assert_eq!(parse_currency("£12.50"), Some(Decimal::new(1250, 2)));
    }

    #[test]
    fn range_midpoint_can_be_fractional() {
        assert_eq!(parse_currency("1-2"), Some(Decimal::new(15, 1)));
    }

    #[test]
    fn negative_number_is_not_a_range() {
        assert_eq!(parse_currency("-500"), Some(Decimal::from(-500)));
    }

    #[rstest]
    #[case::empty("")]
    #[case::symbol_only("£")]
    #[case::words("unknown")]
    #[case::half_range("£10,000-unknown")]
    #[case::infinity("inf")]
    #[case::overflowing_range("79228162514264337593543950335-79228162514264337593543950335")]
    fn malformed_input_is_none(#[case] raw: &str) {
        assert_eq!(parse_currency(raw), None);
    }

    #[test]
    fn numeric_values_pass_through() {
        assert_eq!(
            parse_amount(&ScalarValue::Number(1234.5)),
            Some(Decimal::new(12345, 1))
        );
    }

    #[test]
    fn boolean_values_are_not_amounts() {
        assert_eq!(parse_amount(&ScalarValue::Bool(true)), None);
    }
}
