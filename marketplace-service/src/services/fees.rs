//! Platform fee arithmetic for the escrow split.

use anyhow::{Result, anyhow};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Platform fee on a sale: `round(selling_price * percent / 100)`, rounded
/// half away from zero to whole currency units.
pub fn platform_fee(selling_price: Decimal, fee_percent: Decimal) -> Decimal {
    (selling_price * fee_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Net amount owed to the seller after the platform fee.
pub fn seller_amount(selling_price: Decimal, fee_percent: Decimal) -> Decimal {
    selling_price - platform_fee(selling_price, fee_percent)
}

/// Convert a major-unit amount to the gateway's minor units (paise).
pub fn to_minor_units(amount: Decimal) -> Result<u64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or_else(|| anyhow!("Amount {} does not fit in minor units", amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn five() -> Decimal {
        Decimal::from(5)
    }

    #[test]
    fn five_percent_of_1000_splits_50_950() {
        assert_eq!(platform_fee(dec("1000"), five()), dec("50"));
        assert_eq!(seller_amount(dec("1000"), five()), dec("950"));
    }

    #[test]
    fn fee_rounds_half_away_from_zero() {
        // 990 * 5% = 49.5 -> 50
        assert_eq!(platform_fee(dec("990"), five()), dec("50"));
        // 999 * 5% = 49.95 -> 50
        assert_eq!(platform_fee(dec("999"), five()), dec("50"));
        // 980 * 5% = 49.0 -> 49
        assert_eq!(platform_fee(dec("980"), five()), dec("49"));
    }

    #[test]
    fn split_always_sums_to_gross() {
        for price in [1u32, 7, 99, 450, 999, 1000, 12345] {
            let price = Decimal::from(price);
            assert_eq!(
                platform_fee(price, five()) + seller_amount(price, five()),
                price
            );
        }
    }

    #[test]
    fn minor_units_conversion() {
        assert_eq!(to_minor_units(dec("450")).unwrap(), 45_000);
        assert_eq!(to_minor_units(dec("450.50")).unwrap(), 45_050);
    }

    #[test]
    fn negative_amount_does_not_convert() {
        assert!(to_minor_units(dec("-1")).is_err());
    }
}
