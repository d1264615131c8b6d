use chrono::{DateTime, Utc};

use crate::decoder::{Attachment, Column, DecodedPacket, Decoder, Protocol};
use crate::error::DecodeError;
use crate::unit::ParseUnit;

use super::MAX_PACKET_SIZE;

/// UTF-8 text packets. `key=value` pairs (values optionally quoted) are
/// extracted as fields; `level` and `msg` feed the columns.
pub struct TextProtocol {
    columns: Vec<Column>,
    attachment: Attachment,
}

impl TextProtocol {
    pub fn new() -> Self {
        Self {
            columns: vec![Column::new("Level", 7), Column::new("Message", 80)],
            attachment: Attachment::new(),
        }
    }
}

impl Default for TextProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for TextProtocol {
    fn name(&self) -> &str {
        "Text"
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn create_decoder(&self, _unit: &ParseUnit) -> Option<Box<dyn Decoder>> {
        Some(Box::new(TextDecoder::default()))
    }

    fn attachment(&self) -> &Attachment {
        &self.attachment
    }
}

#[derive(Debug, Default)]
pub struct TextDecoder {
    decoded: bool,
}

impl Decoder for TextDecoder {
    fn is_decoded(&self) -> bool {
        self.decoded
    }

    fn decode(&mut self, packet: &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        if packet.len() > MAX_PACKET_SIZE {
            return Err(DecodeError::TooLarge(packet.len(), MAX_PACKET_SIZE));
        }

        let text = std::str::from_utf8(packet)
            .map_err(|_| DecodeError::NonUtf8)?
            .trim();

        let mut fields: Vec<(String, String)> = Vec::new();
        let mut level = None;
        let mut message = None;
        for (key, value) in parse_pairs(text) {
            match key.as_str() {
                "level" | "lvl" | "severity" => level = Some(value.to_lowercase()),
                "msg" | "message" => message = Some(value.clone()),
                "ts" | "time" | "timestamp" => {
                    if let Some(ts) = parse_timestamp(&value) {
                        fields.push(("timestamp".to_string(), ts.to_rfc3339()));
                    }
                }
                _ => {}
            }
            fields.push((key, value));
        }

        let message = message.unwrap_or_else(|| text.to_string());
        self.decoded = true;
        Ok(Some(DecodedPacket {
            summary: (!message.is_empty()).then(|| message.clone()),
            cells: vec![level.unwrap_or_default(), message],
            fields,
        }))
    }
}

/// `key=value` and `key="quoted value"` pairs; bare words are skipped.
fn parse_pairs(text: &str) -> impl Iterator<Item = (String, String)> + '_ {
    let mut chars = text.chars().peekable();

    std::iter::from_fn(move || loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        chars.peek()?;

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }

        if chars.peek() != Some(&'=') {
            continue;
        }
        chars.next();
        if key.is_empty() {
            continue;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut escaped = false;
            for c in chars.by_ref() {
                if escaped {
                    value.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    break;
                } else {
                    value.push(c);
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        return Some((key, value));
    })
}

/// RFC3339, or unix seconds / milliseconds.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            s.parse::<i64>().ok().and_then(|ts| {
                if ts > 1_000_000_000_000 {
                    DateTime::from_timestamp_millis(ts)
                } else {
                    DateTime::from_timestamp(ts, 0)
                }
            })
        })
}
