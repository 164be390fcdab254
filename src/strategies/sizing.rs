//! Position sizing shared by the strategies.
//!
//! Target dollars are the smaller of a slice of total portfolio value and a
//! slice of free cash; the share count is the whole number of shares that
//! fits. A result of zero means "don't recommend".

use rust_decimal::Decimal;

/// Whole shares of `price` that `amount` buys
pub fn shares_for(amount: Decimal, price: Decimal) -> Decimal {
    if price <= Decimal::ZERO || amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (amount / price).floor()
}

/// min(`value_pct` × total value, `cash_pct` × cash) / price, floored
pub fn capped_shares(
    total_value: Decimal,
    cash: Decimal,
    value_pct: Decimal,
    cash_pct: Decimal,
    price: Decimal,
) -> Decimal {
    let target = (total_value * value_pct).min(cash * cash_pct);
    shares_for(target, price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_shares_for_floors() {
        assert_eq!(shares_for(dec!(1000), dec!(300)), dec!(3));
        assert_eq!(shares_for(dec!(299.99), dec!(300)), dec!(0));
    }

    #[test]
    fn test_shares_for_rejects_bad_inputs() {
        assert_eq!(shares_for(dec!(1000), dec!(0)), dec!(0));
        assert_eq!(shares_for(dec!(-50), dec!(10)), dec!(0));
    }

    #[test]
    fn test_capped_shares_uses_smaller_cap() {
        // 15% of 100k = 15k; 50% of 20k cash = 10k -> cash cap wins
        assert_eq!(
            capped_shares(dec!(100000), dec!(20000), dec!(0.15), dec!(0.5), dec!(100)),
            dec!(100)
        );
        // 5% of 100k = 5k; 80% of 90k = 72k -> value cap wins
        assert_eq!(
            capped_shares(dec!(100000), dec!(90000), dec!(0.05), dec!(0.8), dec!(33)),
            dec!(151)
        );
    }
}
