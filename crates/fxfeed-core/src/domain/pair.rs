use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::ValidationError;

/// Currency pair reported by the feed: one unit of `base` is worth the
/// feed's answer in `quote` units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CurrencyPair {
    pub base: String,
    pub quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Result<Self, ValidationError> {
        Ok(Self {
            base: validate_currency_code(base.as_ref())?,
            quote: validate_currency_code(quote.as_ref())?,
        })
    }

    /// Parses `BASE/QUOTE`, e.g. `NGN/USD`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let (base, quote) = input
            .split_once('/')
            .ok_or_else(|| ValidationError::InvalidPair {
                value: input.to_owned(),
            })?;
        Self::new(base, quote)
    }
}

impl Default for CurrencyPair {
    fn default() -> Self {
        Self {
            base: String::from("NGN"),
            quote: String::from("USD"),
        }
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pair_and_normalizes_case() {
        let pair = CurrencyPair::parse("ngn/usd").expect("pair should parse");
        assert_eq!(pair, CurrencyPair::default());
        assert_eq!(pair.to_string(), "NGN/USD");
    }

    #[test]
    fn rejects_pair_without_separator() {
        let err = CurrencyPair::parse("NGNUSD").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidPair { .. }));
    }

    #[test]
    fn rejects_non_iso_codes() {
        let err = CurrencyPair::parse("NGN/US1").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidCurrency { .. }));
    }

    #[test]
    fn serializes_the_validated_codes() {
        let pair = CurrencyPair::new("eur", " usd ").expect("pair should validate");

        let json = serde_json::to_value(&pair).expect("pair serializes");

        assert_eq!(json, serde_json::json!({ "base": "EUR", "quote": "USD" }));
    }
}
