//! Line protocol codec for the leak-detection sensor
//!
//! The sensor speaks a small ad-hoc ASCII protocol over the byte stream.
//! Each read chunk is treated as one logical message. Messages are
//! classified by their first character:
//!
//! - the bare string `"d"` is an acknowledgment of the reading request; it
//!   produces no reading but must be remembered, because the device then
//!   sends the payload in a separate message with no leading marker
//! - a message starting with `'d'` (or any message while the last frame was
//!   the bare acknowledgment) is a comma-separated reading payload
//! - a message starting with `'g'` is a six-field hex diagnostic frame;
//!   parsed for forward compatibility but carrying no downstream consumer
//! - anything else is ignored
//!
//! Malformed payloads (parse failure, too few fields) are dropped silently:
//! the hardware occasionally emits partial frames and the session must keep
//! running. Drops are visible at `trace` level only.

use crate::error::{LeakwatchError, Result};
use crate::types::RawReading;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Outbound command requesting a fresh reading
pub const CMD_REQUEST_READING: &[u8] = b"D";

/// Outbound command requesting a diagnostic frame
pub const CMD_REQUEST_DIAGNOSTIC: &[u8] = b"G";

/// Minimum comma-separated fields in a reading payload
const MIN_READING_FIELDS: usize = 6;

/// Number of fields in a diagnostic frame
const DIAGNOSTIC_FIELDS: usize = 6;

/// A classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Bare `"d"` acknowledgment; payload follows in the next message
    Ack,
    /// A parsed sensor reading
    Reading(RawReading),
    /// Six hex diagnostic bytes; currently unused downstream
    Diagnostic([u32; DIAGNOSTIC_FIELDS]),
}

/// Stateful decoder for inbound messages
///
/// The codec remembers whether the previous message was the bare `"d"`
/// acknowledgment so that an unmarked payload in the following message is
/// still recognized as data.
#[derive(Debug, Default)]
pub struct FrameCodec {
    last_command: Option<char>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last echoed command, if the previous frame was an acknowledgment
    pub fn last_command(&self) -> Option<char> {
        self.last_command
    }

    /// Forget any pending acknowledgment (called on reconnect/reset)
    pub fn reset(&mut self) {
        self.last_command = None;
    }

    /// Decode one inbound chunk into a frame
    ///
    /// Returns `None` for ignored or malformed messages; the caller never
    /// needs to handle codec errors.
    pub fn decode(&mut self, bytes: &[u8]) -> Option<Frame> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_end_matches(['\r', '\n']);

        if text.is_empty() {
            return None;
        }

        if text == "d" {
            self.last_command = Some('d');
            return Some(Frame::Ack);
        }

        if self.last_command == Some('d') {
            // Acknowledged payload arrives without its own marker
            match parse_reading(text) {
                Ok(reading) => {
                    self.last_command = None;
                    return Some(Frame::Reading(reading));
                }
                Err(e) => {
                    tracing::trace!("dropping malformed acknowledged payload: {}", e);
                    return None;
                }
            }
        }

        match text.as_bytes()[0] {
            b'd' => match parse_reading(text) {
                Ok(reading) => {
                    self.last_command = None;
                    Some(Frame::Reading(reading))
                }
                Err(e) => {
                    tracing::trace!("dropping malformed reading frame: {}", e);
                    None
                }
            },
            b'g' => match parse_diagnostic(&text[1..]) {
                Ok(bytes) => {
                    self.last_command = None;
                    Some(Frame::Diagnostic(bytes))
                }
                Err(e) => {
                    tracing::trace!("dropping malformed diagnostic frame: {}", e);
                    None
                }
            },
            _ => None,
        }
    }
}

/// Parse a comma-separated reading payload
///
/// Leading `'d'` marker characters are stripped first. Field layout:
/// 0 = ppm, 1 = mv, 4 = time, 5 = date, 6 = range (optional),
/// 8 = alarm conditions (optional).
fn parse_reading(text: &str) -> Result<RawReading> {
    let payload = text.trim_start_matches('d');
    let fields: Vec<&str> = payload.split(',').collect();

    if fields.len() < MIN_READING_FIELDS {
        return Err(LeakwatchError::Protocol(format!(
            "expected at least {} fields, got {}",
            MIN_READING_FIELDS,
            fields.len()
        )));
    }

    let ppm = parse_decimal("ppm", fields[0])?;
    let mv = parse_decimal("mv", fields[1])?;

    Ok(RawReading {
        ppm,
        mv,
        time: fields[4].trim().to_string(),
        date: fields[5].trim().to_string(),
        range: fields.get(6).map(|s| s.trim().to_string()).unwrap_or_default(),
        alarm_conditions: fields.get(8).map(|s| s.trim().to_string()).unwrap_or_default(),
    })
}

fn parse_decimal(name: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|_| LeakwatchError::Protocol(format!("{} is not a decimal: {:?}", name, value)))
}

/// Parse a six-field hex diagnostic payload (leading `'g'` already stripped)
fn parse_diagnostic(payload: &str) -> Result<[u32; DIAGNOSTIC_FIELDS]> {
    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() < DIAGNOSTIC_FIELDS {
        return Err(LeakwatchError::Protocol(format!(
            "expected {} diagnostic fields, got {}",
            DIAGNOSTIC_FIELDS,
            fields.len()
        )));
    }

    let mut bytes = [0u32; DIAGNOSTIC_FIELDS];
    for (i, field) in fields.iter().take(DIAGNOSTIC_FIELDS).enumerate() {
        let hex = field.trim().trim_start_matches("0x");
        bytes[i] = u32::from_str_radix(hex, 16).map_err(|_| {
            LeakwatchError::Protocol(format!("diagnostic field {} is not hex: {:?}", i, field))
        })?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bare_ack_produces_no_reading() {
        let mut codec = FrameCodec::new();
        assert_eq!(codec.decode(b"d"), Some(Frame::Ack));
        assert_eq!(codec.last_command(), Some('d'));
    }

    #[test]
    fn test_ack_then_unmarked_payload() {
        let mut codec = FrameCodec::new();
        codec.decode(b"d");
        let frame = codec.decode(b"100,5,0,0,10:00:00,01/01/24,R1,,OK,");

        let Some(Frame::Reading(reading)) = frame else {
            panic!("expected a reading, got {:?}", frame);
        };
        assert_eq!(reading.ppm, dec!(100));
        assert_eq!(reading.mv, dec!(5));
        assert_eq!(reading.time, "10:00:00");
        assert_eq!(reading.date, "01/01/24");
        assert_eq!(reading.range, "R1");
        assert_eq!(reading.alarm_conditions, "OK");
        assert_eq!(codec.last_command(), None);
    }

    #[test]
    fn test_marked_payload_without_ack() {
        let mut codec = FrameCodec::new();
        let frame = codec.decode(b"d2.5,1.25,0,0,12:30:00,02/02/24");

        let Some(Frame::Reading(reading)) = frame else {
            panic!("expected a reading, got {:?}", frame);
        };
        assert_eq!(reading.ppm, dec!(2.5));
        assert_eq!(reading.mv, dec!(1.25));
        // Optional fields default to empty
        assert_eq!(reading.range, "");
        assert_eq!(reading.alarm_conditions, "");
    }

    #[test]
    fn test_too_few_fields_dropped_silently() {
        let mut codec = FrameCodec::new();
        assert_eq!(codec.decode(b"d1,2,3"), None);
    }

    #[test]
    fn test_non_numeric_ppm_dropped() {
        let mut codec = FrameCodec::new();
        assert_eq!(codec.decode(b"dabc,5,0,0,10:00:00,01/01/24"), None);
    }

    #[test]
    fn test_malformed_payload_keeps_ack_pending() {
        // A garbled payload after the ack must not consume the ack: the
        // device will retry and the next valid payload still counts as data.
        let mut codec = FrameCodec::new();
        codec.decode(b"d");
        assert_eq!(codec.decode(b"garbage"), None);
        assert_eq!(codec.last_command(), Some('d'));

        let frame = codec.decode(b"100,5,0,0,10:00:00,01/01/24");
        assert!(matches!(frame, Some(Frame::Reading(_))));
    }

    #[test]
    fn test_diagnostic_frame() {
        let mut codec = FrameCodec::new();
        let frame = codec.decode(b"g1A,2B,00,FF,03,10");
        assert_eq!(
            frame,
            Some(Frame::Diagnostic([0x1A, 0x2B, 0x00, 0xFF, 0x03, 0x10]))
        );
    }

    #[test]
    fn test_diagnostic_with_prefix_and_bad_hex() {
        let mut codec = FrameCodec::new();
        assert_eq!(
            codec.decode(b"g0x01,0x02,0x03,0x04,0x05,0x06"),
            Some(Frame::Diagnostic([1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(codec.decode(b"gZZ,01,02,03,04,05"), None);
        assert_eq!(codec.decode(b"g01,02"), None);
    }

    #[test]
    fn test_unknown_messages_ignored() {
        let mut codec = FrameCodec::new();
        assert_eq!(codec.decode(b"x1,2,3,4,5,6"), None);
        assert_eq!(codec.decode(b""), None);
        assert_eq!(codec.decode(b"\r\n"), None);
    }

    #[test]
    fn test_trailing_newline_stripped() {
        let mut codec = FrameCodec::new();
        let frame = codec.decode(b"d100,5,0,0,10:00:00,01/01/24\r\n");
        assert!(matches!(frame, Some(Frame::Reading(_))));
    }

    #[test]
    fn test_multiple_leading_markers_stripped() {
        // Echoed command plus payload marker: "dd" prefix
        let mut codec = FrameCodec::new();
        let frame = codec.decode(b"dd100,5,0,0,10:00:00,01/01/24");
        let Some(Frame::Reading(reading)) = frame else {
            panic!("expected a reading");
        };
        assert_eq!(reading.ppm, dec!(100));
    }

    #[test]
    fn test_reset_clears_pending_ack() {
        let mut codec = FrameCodec::new();
        codec.decode(b"d");
        codec.reset();
        assert_eq!(codec.last_command(), None);
        // Unmarked payload is now ignored
        assert_eq!(codec.decode(b"100,5,0,0,10:00:00,01/01/24"), None);
    }
}
