//! Decimal price parsing and display.
//!
//! Storefronts report prices as decimal strings in major units (`"499.99"`).
//! They are never treated as integer minor units: `"49999"` means 49 999.00,
//! not 499.99.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::CoreError;

/// Parses a non-negative decimal price string such as `"1299.00"` or `"10"`.
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`CoreError::InvalidPrice`] if the string is not a plain decimal
/// number or the value is negative.
pub fn parse_price(raw: &str) -> Result<Decimal, CoreError> {
    let trimmed = raw.trim();
    let value = Decimal::from_str(trimmed).map_err(|e| CoreError::InvalidPrice {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(CoreError::InvalidPrice {
            raw: raw.to_string(),
            reason: "price must not be negative".to_string(),
        });
    }

    // "-0" parses as a negative zero.
    Ok(if value.is_zero() { Decimal::ZERO } else { value })
}

/// Formats `price` with two decimal places and comma thousands separators,
/// prefixed by `symbol`: `format_price(1299.5, "₹")` → `"₹1,299.50"`.
#[must_use]
pub fn format_price(price: Decimal, symbol: &str) -> String {
    let rounded = price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{symbol}{grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_decimal_string_in_major_units() {
        assert_eq!(parse_price("499.99").unwrap(), dec("499.99"));
    }

    #[test]
    fn integer_string_is_not_cents() {
        assert_eq!(parse_price("49999").unwrap(), dec("49999"));
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(parse_price("  12.50 \n").unwrap(), dec("12.5"));
    }

    #[test]
    fn keeps_full_precision() {
        assert_eq!(parse_price("0.125").unwrap().to_string(), "0.125");
        assert_eq!(parse_price("500.00").unwrap().to_string(), "500.00");
    }

    #[test]
    fn accepts_zero() {
        assert_eq!(parse_price("0.00").unwrap(), Decimal::ZERO);
        assert_eq!(parse_price("-0").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn rejects_negative() {
        let err = parse_price("-1.00").unwrap_err();
        assert!(matches!(err, CoreError::InvalidPrice { .. }), "got: {err:?}");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_price("").is_err());
        assert!(parse_price("abc").is_err());
        assert!(parse_price("12.5.3").is_err());
    }

    #[test]
    fn formats_two_decimals() {
        assert_eq!(format_price(dec("499.99"), "₹"), "₹499.99");
        assert_eq!(format_price(dec("10"), "$"), "$10.00");
        assert_eq!(format_price(dec("0.5"), ""), "0.50");
    }

    #[test]
    fn formats_thousands_separators() {
        assert_eq!(format_price(dec("1299"), "₹"), "₹1,299.00");
        assert_eq!(format_price(dec("1234567.891"), "₹"), "₹1,234,567.89");
        assert_eq!(format_price(dec("100000"), "₹"), "₹100,000.00");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(format_price(dec("2.345"), "$"), "$2.35");
        assert_eq!(format_price(dec("2.344"), "$"), "$2.34");
    }
}
