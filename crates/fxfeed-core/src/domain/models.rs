use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};

use crate::quote::RateQuote;
use crate::{CurrencyPair, UtcDateTime};

/// Opaque provider round identifier.
///
/// Rounds are compared for equality and displayed, never used in
/// arithmetic. Serialized as a decimal string because the value may
/// exceed the integer precision of JSON consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundId(u128);

impl RoundId {
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u128 {
        self.0
    }
}

impl Display for RoundId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RoundId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Result of `latestRoundData()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundData {
    pub round_id: RoundId,
    #[serde(serialize_with = "serialize_i128")]
    pub answer: i128,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: RoundId,
}

impl RoundData {
    pub fn updated_at_utc(&self) -> Option<UtcDateTime> {
        UtcDateTime::from_unix_seconds(self.updated_at)
    }
}

/// Decoded `AnswerUpdated` log as returned by log queries and filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerUpdatedLog {
    pub block_number: u64,
    pub transaction_hash: String,
    pub round_id: RoundId,
    #[serde(serialize_with = "serialize_i128")]
    pub answer: i128,
    pub updated_at: u64,
}

/// Current price derived from one raw reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Price {
    pub pair: CurrencyPair,
    /// Base units per one quote unit (e.g. NGN per USD).
    pub direct: f64,
    /// Quote units per one base unit (e.g. USD per NGN).
    pub inverse: f64,
    pub decimals: u8,
    pub description: String,
    pub direct_display: String,
    pub inverse_display: String,
    #[serde(serialize_with = "serialize_i128")]
    pub raw_answer: i128,
    pub captured_at: UtcDateTime,
}

impl Price {
    pub fn new(pair: CurrencyPair, quote: RateQuote, description: impl Into<String>) -> Self {
        Self {
            pair,
            direct: quote.direct,
            inverse: quote.inverse,
            decimals: quote.decimals,
            description: description.into(),
            direct_display: quote.direct_display,
            inverse_display: quote.inverse_display,
            raw_answer: quote.answer,
            captured_at: UtcDateTime::now(),
        }
    }
}

/// One matched `AnswerUpdated` event from a historical query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalEvent {
    pub block_number: u64,
    pub transaction_hash: String,
    pub round_id: RoundId,
    #[serde(serialize_with = "serialize_i128")]
    pub answer: i128,
    pub updated_at: u64,
    /// Absent when the answer is zero and no reciprocal exists.
    pub quote: Option<RateQuote>,
}

impl HistoricalEvent {
    pub fn from_log(log: AnswerUpdatedLog, decimals: u8, pair: &CurrencyPair) -> Self {
        let quote = RateQuote::from_answer(log.answer, decimals, pair).ok();
        Self {
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            round_id: log.round_id,
            answer: log.answer,
            updated_at: log.updated_at,
            quote,
        }
    }
}

// i128 is not representable in every JSON consumer; emit it as a string.
pub(crate) fn serialize_i128<S>(value: &i128, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_id_serializes_as_string() {
        let id = RoundId::new(18_446_744_073_709_551_621);
        let json = serde_json::to_string(&id).expect("serializes");
        assert_eq!(json, "\"18446744073709551621\"");
    }

    #[test]
    fn historical_event_without_reciprocal_keeps_raw_fields() {
        let log = AnswerUpdatedLog {
            block_number: 42,
            transaction_hash: String::from("0xabc"),
            round_id: RoundId::new(7),
            answer: 0,
            updated_at: 1_700_000_000,
        };

        let event = HistoricalEvent::from_log(log, 6, &CurrencyPair::default());

        assert_eq!(event.block_number, 42);
        assert_eq!(event.answer, 0);
        assert!(event.quote.is_none());
    }
}
