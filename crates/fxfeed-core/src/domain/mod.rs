//! # Domain Models
//!
//! Records produced by the feed and the validated identifiers used to
//! configure it.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FeedAddress`] | Aggregator contract address |
//! | [`CurrencyPair`] | `BASE/QUOTE` pair reported by the feed |
//! | [`RoundId`] | Opaque provider round identifier |
//! | [`RoundData`] | Result of `latestRoundData()` |
//! | [`AnswerUpdatedLog`] | Decoded `AnswerUpdated` log |
//! | [`Price`] | Current direct/inverse price |
//! | [`HistoricalEvent`] | One historical `AnswerUpdated` match |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Records are immutable once built and owned by the caller.

mod address;
mod models;
mod pair;
mod timestamp;

pub use address::FeedAddress;
pub use models::{AnswerUpdatedLog, HistoricalEvent, Price, RoundData, RoundId};
pub(crate) use models::serialize_i128;
pub use pair::{validate_currency_code, CurrencyPair};
pub use timestamp::UtcDateTime;
