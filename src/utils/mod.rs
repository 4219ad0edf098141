//! Utility functions for formatting values in the CLI
//!
//! The core emits plain decimals; these helpers turn them into display
//! strings using Indian digit grouping (`1,23,45,678.90`).

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "₹ " prefix (Indian Rupee)
    Inr,
    /// No currency symbol (for table cells, calculations display)
    None,
}

/// Group an unsigned digit string the Indian way: last three, then pairs
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// Core formatting function with full control over output.
///
/// Rounds to 2 decimal places (half away from zero), then right-aligns to
/// `width` when it is non-zero.
///
/// # Examples
/// ```
/// use quotefolio::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(123456.78), 0, CurrencySymbol::Inr),
///     "₹ 1,23,456.78"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let is_negative = rounded < Decimal::ZERO;

    let formatted = format!("{:.2}", rounded.abs());
    let (integer_part, decimal_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    let sign = if is_negative { "-" } else { "" };
    let prefix = match symbol {
        CurrencySymbol::Inr => "₹ ",
        CurrencySymbol::None => "",
    };

    let result = format!(
        "{}{}{}.{}",
        prefix,
        sign,
        group_indian(integer_part),
        decimal_part
    );

    let visible = result.chars().count();
    if width > visible {
        format!("{}{}", " ".repeat(width - visible), result)
    } else {
        result
    }
}

/// Format as Indian Rupee with symbol: "₹ 1,23,456.78"
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Inr)
}

/// Format number only (no symbol): "1,23,456.78"
pub fn format_decimal_in(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::None)
}

/// Signed percentage with two decimals: "+12.89%", "-3.10%"
pub fn format_percent(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded > Decimal::ZERO { "+" } else { "" };
    format!("{}{:.2}%", sign, rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_currency_basic() {
        assert_eq!(format_currency(dec!(1580.5)), "₹ 1,580.50");
        assert_eq!(format_currency(dec!(0.99)), "₹ 0.99");
        assert_eq!(format_currency(dec!(100000)), "₹ 1,00,000.00");
    }

    #[test]
    fn test_format_currency_indian_grouping() {
        assert_eq!(format_currency(dec!(12345)), "₹ 12,345.00");
        assert_eq!(format_currency(dec!(123456)), "₹ 1,23,456.00");
        assert_eq!(format_currency(dec!(1234567)), "₹ 12,34,567.00");
        assert_eq!(format_currency(dec!(12345678.90)), "₹ 1,23,45,678.90");
    }

    #[test]
    fn test_format_currency_negative() {
        assert_eq!(format_currency(dec!(-398)), "₹ -398.00");
        assert_eq!(format_currency(dec!(-1805.004)), "₹ -1,805.00");
    }

    #[test]
    fn test_rounding() {
        assert_eq!(format_decimal_in(dec!(1.235)), "1.24");
        assert_eq!(format_decimal_in(dec!(12.8928571)), "12.89");
    }

    #[test]
    fn test_format_with_width() {
        let result = format_currency_with_width(dec!(100), 12, CurrencySymbol::Inr);
        assert_eq!(result.chars().count(), 12);
        assert_eq!(result, "    ₹ 100.00");

        let unpadded = format_currency_with_width(dec!(1000000), 5, CurrencySymbol::None);
        assert_eq!(unpadded, "10,00,000.00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(dec!(12.8928571)), "+12.89%");
        assert_eq!(format_percent(dec!(-3.1)), "-3.10%");
        assert_eq!(format_percent(Decimal::ZERO), "0.00%");
    }
}
