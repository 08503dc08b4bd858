//! Raw answer to rate-pair translation.
//!
//! The feed reports one signed integer scaled by `10^decimals`. Both
//! directions of the exchange rate are derived from that single reading:
//!
//! - `inverse = answer / 10^decimals` (quote units per base unit)
//! - `direct = 1 / inverse` (base units per quote unit)
//!
//! Neither value is treated as the "primary" one; they are reciprocals of
//! each other by construction.

use serde::Serialize;

use crate::domain::serialize_i128;
use crate::{CurrencyPair, RateError};

/// Largest exponent accepted; `i128` answers carry at most 38 digits.
pub const MAX_DECIMALS: u8 = 38;

/// Direct/inverse rate pair derived from one raw answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateQuote {
    #[serde(serialize_with = "serialize_i128")]
    pub answer: i128,
    pub decimals: u8,
    pub direct: f64,
    pub inverse: f64,
    /// `1 <quote> = <direct> <base>` with two decimals.
    pub direct_display: String,
    /// `1 <base> = <inverse> <quote>` with six decimals.
    pub inverse_display: String,
}

impl RateQuote {
    pub fn from_answer(answer: i128, decimals: u8, pair: &CurrencyPair) -> Result<Self, RateError> {
        if decimals > MAX_DECIMALS {
            return Err(RateError::UnsupportedDecimals {
                decimals,
                max: MAX_DECIMALS,
            });
        }
        if answer == 0 {
            return Err(RateError::ZeroAnswer);
        }

        let inverse = answer as f64 / 10_f64.powi(i32::from(decimals));
        if inverse == 0.0 || !inverse.is_finite() {
            return Err(RateError::ZeroAnswer);
        }
        let direct = inverse.recip();

        Ok(Self {
            answer,
            decimals,
            direct,
            inverse,
            direct_display: format!("1 {} = {:.2} {}", pair.quote, direct, pair.base),
            inverse_display: format!("1 {} = {:.6} {}", pair.base, inverse, pair.quote),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ngn_usd() -> CurrencyPair {
        CurrencyPair::default()
    }

    #[test]
    fn translates_naira_feed_reading() {
        let quote = RateQuote::from_answer(689, 6, &ngn_usd()).expect("non-zero answer");

        assert!((quote.inverse - 0.000689).abs() < 1e-12);
        assert!((quote.direct - 1451.378_809_869_376).abs() < 1e-6);
        assert_eq!(quote.direct_display, "1 USD = 1451.38 NGN");
        assert_eq!(quote.inverse_display, "1 NGN = 0.000689 USD");
    }

    #[test]
    fn direct_and_inverse_are_reciprocal() {
        let cases = [
            (1_i128, 0_u8),
            (689, 6),
            (-250_000_000, 8),
            (123_456_789_012, 18),
        ];
        for (answer, decimals) in cases {
            let quote = RateQuote::from_answer(answer, decimals, &ngn_usd()).expect("non-zero");
            assert!(
                (quote.direct * quote.inverse - 1.0).abs() < 1e-9,
                "answer={answer}, decimals={decimals}"
            );
        }
    }

    #[test]
    fn zero_answer_has_no_reciprocal() {
        let err = RateQuote::from_answer(0, 6, &ngn_usd()).expect_err("must fail");
        assert_eq!(err, RateError::ZeroAnswer);
    }

    #[test]
    fn rejects_excessive_decimals() {
        let err = RateQuote::from_answer(1, 39, &ngn_usd()).expect_err("must fail");
        assert!(matches!(err, RateError::UnsupportedDecimals { decimals: 39, .. }));
    }
}
