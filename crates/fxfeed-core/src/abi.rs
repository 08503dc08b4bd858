//! Minimal ABI codec for the aggregator read surface.
//!
//! Only the handful of static selectors and return shapes the feed needs
//! are supported; everything is decoded from 32-byte big-endian words.

use crate::transport::TransportError;
use crate::{AnswerUpdatedLog, RoundData, RoundId};

/// `decimals()`
pub const DECIMALS_SELECTOR: &str = "0x313ce567";
/// `description()`
pub const DESCRIPTION_SELECTOR: &str = "0x7284e416";
/// `latestAnswer()`
pub const LATEST_ANSWER_SELECTOR: &str = "0x50d25bcd";
/// `latestRoundData()`
pub const LATEST_ROUND_DATA_SELECTOR: &str = "0xfeaf968c";

/// topic0 of `AnswerUpdated(int256 indexed current, uint256 indexed roundId, uint256 updatedAt)`.
pub const ANSWER_UPDATED_TOPIC: &str =
    "0x0559884fd3a460db3073b7fc896cc77986f16e378210ded43186175bf646fc5f";

const WORD: usize = 32;

pub fn decode_hex(input: &str) -> Result<Vec<u8>, TransportError> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    hex::decode(digits).map_err(|e| TransportError::decode(format!("invalid hex payload: {e}")))
}

/// Parses a JSON-RPC hex quantity such as `0x1b4`.
pub fn parse_quantity(input: &str) -> Result<u64, TransportError> {
    let digits = input
        .strip_prefix("0x")
        .ok_or_else(|| TransportError::decode(format!("quantity missing 0x prefix: '{input}'")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| TransportError::decode(format!("invalid quantity '{input}': {e}")))
}

pub fn format_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

fn word_at(bytes: &[u8], offset: usize) -> Result<&[u8], TransportError> {
    offset
        .checked_add(WORD)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| {
            TransportError::decode(format!(
                "return data too short: need word at byte {offset}, have {} bytes",
                bytes.len()
            ))
        })
}

fn word(bytes: &[u8], index: usize) -> Result<&[u8], TransportError> {
    word_at(bytes, index * WORD)
}

fn low_half(word: &[u8]) -> [u8; 16] {
    let mut buf = [0_u8; 16];
    buf.copy_from_slice(&word[16..WORD]);
    buf
}

pub fn decode_uint(word: &[u8]) -> Result<u128, TransportError> {
    if word[..16].iter().any(|byte| *byte != 0) {
        return Err(TransportError::decode("uint256 value exceeds 128 bits"));
    }
    Ok(u128::from_be_bytes(low_half(word)))
}

pub fn decode_int(word: &[u8]) -> Result<i128, TransportError> {
    let value = i128::from_be_bytes(low_half(word));
    let extension = if value < 0 { 0xff } else { 0x00 };
    if word[..16].iter().any(|byte| *byte != extension) {
        return Err(TransportError::decode("int256 value exceeds 128 bits"));
    }
    Ok(value)
}

fn decode_u64(word: &[u8], field: &str) -> Result<u64, TransportError> {
    let value = decode_uint(word)?;
    u64::try_from(value)
        .map_err(|_| TransportError::decode(format!("{field} does not fit in 64 bits")))
}

pub fn decode_decimals(data: &str) -> Result<u8, TransportError> {
    let bytes = decode_hex(data)?;
    let value = decode_uint(word(&bytes, 0)?)?;
    u8::try_from(value)
        .map_err(|_| TransportError::decode(format!("decimals out of range: {value}")))
}

pub fn decode_answer(data: &str) -> Result<i128, TransportError> {
    let bytes = decode_hex(data)?;
    decode_int(word(&bytes, 0)?)
}

pub fn decode_string(data: &str) -> Result<String, TransportError> {
    let bytes = decode_hex(data)?;
    let offset = usize::try_from(decode_uint(word(&bytes, 0)?)?)
        .map_err(|_| TransportError::decode("string offset out of range"))?;
    let len = usize::try_from(decode_uint(word_at(&bytes, offset)?)?)
        .map_err(|_| TransportError::decode("string length out of range"))?;
    let start = offset + WORD;
    let raw = start
        .checked_add(len)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(|| TransportError::decode("string payload truncated"))?;

    String::from_utf8(raw.to_vec())
        .map_err(|e| TransportError::decode(format!("string is not utf-8: {e}")))
}

pub fn decode_round_data(data: &str) -> Result<RoundData, TransportError> {
    let bytes = decode_hex(data)?;
    Ok(RoundData {
        round_id: RoundId::new(decode_uint(word(&bytes, 0)?)?),
        answer: decode_int(word(&bytes, 1)?)?,
        started_at: decode_u64(word(&bytes, 2)?, "startedAt")?,
        updated_at: decode_u64(word(&bytes, 3)?, "updatedAt")?,
        answered_in_round: RoundId::new(decode_uint(word(&bytes, 4)?)?),
    })
}

/// Decodes one `AnswerUpdated` log from its topics and data.
pub fn decode_answer_updated(
    block_number: u64,
    transaction_hash: String,
    topics: &[String],
    data: &str,
) -> Result<AnswerUpdatedLog, TransportError> {
    let [topic0, current, round_id, ..] = topics else {
        return Err(TransportError::decode(format!(
            "AnswerUpdated log needs 3 topics, got {}",
            topics.len()
        )));
    };
    if !topic0.eq_ignore_ascii_case(ANSWER_UPDATED_TOPIC) {
        return Err(TransportError::decode(format!(
            "unexpected log topic {topic0}"
        )));
    }

    let current = decode_hex(current)?;
    let round_id = decode_hex(round_id)?;
    let data = decode_hex(data)?;

    Ok(AnswerUpdatedLog {
        block_number,
        transaction_hash,
        round_id: RoundId::new(decode_uint(word(&round_id, 0)?)?),
        answer: decode_int(word(&current, 0)?)?,
        updated_at: decode_u64(word(&data, 0)?, "updatedAt")?,
    })
}

/// Encodes a value as one 32-byte word without the `0x` prefix.
pub fn encode_int_word(value: i128) -> String {
    let extension = if value < 0 { "f".repeat(32) } else { "0".repeat(32) };
    format!("{extension}{}", hex::encode(value.to_be_bytes()))
}

pub fn encode_uint_word(value: u128) -> String {
    format!("{}{}", "0".repeat(32), hex::encode(value.to_be_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_uint8_decimals() {
        let data = format!("0x{}", encode_uint_word(8));
        assert_eq!(decode_decimals(&data).expect("decodes"), 8);
    }

    #[test]
    fn decodes_negative_answer() {
        let data = format!("0x{}", encode_int_word(-42));
        assert_eq!(decode_answer(&data).expect("decodes"), -42);
    }

    #[test]
    fn rejects_answer_wider_than_128_bits() {
        let data = format!("0x{}{}", "01".repeat(16), "00".repeat(16));
        assert!(decode_answer(&data).is_err());
    }

    #[test]
    fn decodes_dynamic_string() {
        let text = "NGN / USD";
        let mut padded = hex::encode(text);
        padded.push_str(&"0".repeat(64 - padded.len()));
        let data = format!(
            "0x{}{}{}",
            encode_uint_word(32),
            encode_uint_word(text.len() as u128),
            padded
        );

        assert_eq!(decode_string(&data).expect("decodes"), text);
    }

    #[test]
    fn truncated_string_is_a_decode_error() {
        let data = format!("0x{}{}", encode_uint_word(32), encode_uint_word(100));
        let err = decode_string(&data).expect_err("must fail");
        assert_eq!(err.kind(), crate::TransportErrorKind::Decode);
    }

    #[test]
    fn decodes_round_data_tuple() {
        let round = (1_u128 << 64) + 5;
        let data = format!(
            "0x{}{}{}{}{}",
            encode_uint_word(round),
            encode_int_word(689),
            encode_uint_word(1_700_000_000),
            encode_uint_word(1_700_000_060),
            encode_uint_word(round)
        );

        let decoded = decode_round_data(&data).expect("decodes");
        assert_eq!(decoded.round_id, RoundId::new(round));
        assert_eq!(decoded.answer, 689);
        assert_eq!(decoded.updated_at, 1_700_000_060);
        assert_eq!(decoded.answered_in_round, decoded.round_id);
    }

    #[test]
    fn parses_and_formats_quantities() {
        assert_eq!(parse_quantity("0x1b4").expect("parses"), 436);
        assert_eq!(format_quantity(436), "0x1b4");
        assert!(parse_quantity("436").is_err());
    }

    #[test]
    fn decodes_answer_updated_log() {
        let topics = vec![
            ANSWER_UPDATED_TOPIC.to_owned(),
            format!("0x{}", encode_int_word(690)),
            format!("0x{}", encode_uint_word(77)),
        ];
        let data = format!("0x{}", encode_uint_word(1_700_000_123));

        let log = decode_answer_updated(1_000, String::from("0xfeed"), &topics, &data)
            .expect("decodes");

        assert_eq!(log.block_number, 1_000);
        assert_eq!(log.answer, 690);
        assert_eq!(log.round_id, RoundId::new(77));
        assert_eq!(log.updated_at, 1_700_000_123);
    }
}
