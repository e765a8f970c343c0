//! Sensor reading payloads.
//!
//! The wire format is the exact text `{"valor":<float>,"ts":<u32>}`: no
//! whitespace, no other fields, no reordering, nothing after the closing
//! brace. It is deliberately not parsed as general JSON.

use super::error::CommError;
use heapless::String;
use serde::Serialize;

const PREFIX: &[u8] = br#"{"valor":"#;
const SEPARATOR: &[u8] = br#","ts":"#;
const SUFFIX: &[u8] = b"}";

/// Longest encoded reading.
pub const MAX_READING_LEN: usize = 64;

/// A timestamped measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    /// Measured value.
    #[serde(rename = "valor")]
    pub value: f32,
    /// Sender timestamp, strictly increasing across fresh readings.
    #[serde(rename = "ts")]
    pub timestamp: u32,
}

/// Parses a reassembled payload.
///
/// # Errors
///
/// [`CommError::MalformedPayload`] if the payload deviates from the wire
/// format in any way, if the value is not a finite number, or if the
/// timestamp does not fit in a `u32`.
pub fn parse_reading(payload: &[u8]) -> Result<Reading, CommError> {
    let rest = payload
        .strip_prefix(PREFIX)
        .ok_or(CommError::MalformedPayload)?;

    let split = rest
        .windows(SEPARATOR.len())
        .position(|window| window == SEPARATOR)
        .ok_or(CommError::MalformedPayload)?;

    let value = parse_value(&rest[..split])?;

    let timestamp = rest[split + SEPARATOR.len()..]
        .strip_suffix(SUFFIX)
        .ok_or(CommError::MalformedPayload)
        .and_then(parse_timestamp)?;

    Ok(Reading { value, timestamp })
}

/// Encodes a reading in the wire format.
///
/// # Errors
///
/// * [`CommError::MalformedPayload`] - the value is NaN or infinite, which the
///   wire format cannot carry
/// * [`CommError::PublishFailure`] - serialization failed
pub fn encode_reading(reading: &Reading) -> Result<String<MAX_READING_LEN>, CommError> {
    if !reading.value.is_finite() {
        return Err(CommError::MalformedPayload);
    }
    serde_json_core::to_string(reading).map_err(|_| CommError::PublishFailure)
}

fn parse_value(bytes: &[u8]) -> Result<f32, CommError> {
    let numeric = !bytes.is_empty()
        && bytes
            .iter()
            .all(|b| b.is_ascii_digit() || matches!(*b, b'-' | b'+' | b'.' | b'e' | b'E'));
    if !numeric {
        return Err(CommError::MalformedPayload);
    }

    core::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse::<f32>().ok())
        .filter(|value| value.is_finite())
        .ok_or(CommError::MalformedPayload)
}

fn parse_timestamp(bytes: &[u8]) -> Result<u32, CommError> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(CommError::MalformedPayload);
    }

    core::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse::<u32>().ok())
        .ok_or(CommError::MalformedPayload)
}
