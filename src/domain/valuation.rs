use serde::{Deserialize, Serialize};

/// Current composition and USD value of a position.
///
/// Token amounts are decimal-adjusted; prices are spot USD. A missing price
/// enters as 0 and zeroes that leg of the value, it is never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValue {
    pub token_x_amount: f64,
    pub token_y_amount: f64,
    pub token_x_price_usd: f64,
    pub token_y_price_usd: f64,
    pub usd_value: f64,
}

impl PositionValue {
    /// Build a valuation from raw integer reserves summed across bins.
    ///
    /// Decimals are a pool-level property applied once to the totals.
    pub fn from_raw(
        raw_x: u128,
        raw_y: u128,
        decimals_x: u8,
        decimals_y: u8,
        price_x_usd: f64,
        price_y_usd: f64,
    ) -> Self {
        let token_x_amount = adjust_raw_amount(raw_x, decimals_x);
        let token_y_amount = adjust_raw_amount(raw_y, decimals_y);
        let usd_value = token_x_amount * price_x_usd + token_y_amount * price_y_usd;

        Self {
            token_x_amount,
            token_y_amount,
            token_x_price_usd: price_x_usd,
            token_y_price_usd: price_y_usd,
            usd_value,
        }
    }
}

/// Convert a raw integer token amount into its decimal-adjusted quantity.
pub fn adjust_raw_amount(raw: u128, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_adjust_raw_amount() {
        assert_relative_eq!(adjust_raw_amount(1_000_000_000, 9), 1.0);
        assert_relative_eq!(adjust_raw_amount(1_500_000, 6), 1.5);
        assert_relative_eq!(adjust_raw_amount(42, 0), 42.0);
        assert_relative_eq!(adjust_raw_amount(0, 9), 0.0);
    }

    #[test]
    fn test_from_raw_two_legs() {
        // 2 tokens of X at $3 plus 50 tokens of Y at $0.1
        let value = PositionValue::from_raw(2_000_000_000, 50_000_000, 9, 6, 3.0, 0.1);
        assert_relative_eq!(value.token_x_amount, 2.0);
        assert_relative_eq!(value.token_y_amount, 50.0);
        assert_relative_eq!(value.usd_value, 11.0);
    }

    #[test]
    fn test_missing_price_zeroes_leg() {
        let value = PositionValue::from_raw(1_000_000_000, 1_000_000, 9, 6, 0.0, 2.0);
        assert_relative_eq!(value.usd_value, 2.0);
        assert_relative_eq!(value.token_x_amount, 1.0);
    }

    #[test]
    fn test_both_prices_missing() {
        let value = PositionValue::from_raw(1_000_000_000, 1_000_000, 9, 6, 0.0, 0.0);
        assert_relative_eq!(value.usd_value, 0.0);
    }
}
