//! Utility functions for formatting
//!
//! Centralized formatting of dollar amounts, share counts and percentages so
//! tables and messages render numbers the same way everywhere.

use rust_decimal::Decimal;

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Include "$" prefix
    Usd,
    /// No currency symbol (share counts, table cells)
    None,
}

/// Round half-even to `dp` places and pad with zeros
fn rounded(value: Decimal, dp: u32) -> String {
    let mut v = value.round_dp(dp);
    v.rescale(dp);
    v.to_string()
}

/// Core formatting function with full control over output.
///
/// Formats a Decimal with US conventions:
/// - Thousands separator: `,`
/// - Decimal separator: `.`
/// - Negative sign ahead of the symbol: `-$1,234.56`
///
/// # Examples
/// ```
/// use council::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, CurrencySymbol::Usd),
///     "$1,234.56"
/// );
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234), 12, CurrencySymbol::None),
///     "    1,234.00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let formatted = rounded(value.abs(), 2);
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![',', c]
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    // -0.004 rounds to zero and must not print as "-$0.00"
    let sign = if value < Decimal::ZERO && formatted != "0.00" { "-" } else { "" };
    let prefix = match symbol {
        CurrencySymbol::Usd => "$",
        CurrencySymbol::None => "",
    };

    let result = format!("{}{}{}.{}", sign, prefix, with_separators, decimal_part);
    format!("{:>width$}", result, width = width)
}

/// Format as US dollars: "$1,234.56"
///
/// # Examples
/// ```
/// use council::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(100000)), "$100,000.00");
/// ```
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Usd)
}

/// Dollar amount with an explicit sign, for changes in value: "+$12.00"
pub fn format_signed_currency(value: Decimal) -> String {
    if value > Decimal::ZERO {
        format!("+{}", format_currency(value))
    } else {
        format_currency(value)
    }
}

/// Share counts drop trailing zeros: "280", "12.5"
pub fn format_shares(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Percentage already scaled to 0..100, two decimals: "12.34%"
///
/// # Examples
/// ```
/// use council::utils::format_percent;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_percent(dec!(33.333)), "33.33%");
/// ```
pub fn format_percent(value: Decimal) -> String {
    format!("{}%", rounded(value, 2))
}
