use std::fmt::Write;

use crate::decoder::{Attachment, Column, DecodedPacket, Decoder, Protocol};
use crate::error::DecodeError;
use crate::unit::ParseUnit;

use super::MAX_PACKET_SIZE;

const ROW_WIDTH: usize = 16;

/// Hex dump of the raw packet bytes, 16 bytes per row.
pub struct HexProtocol {
    columns: Vec<Column>,
    attachment: Attachment,
}

impl HexProtocol {
    pub fn new() -> Self {
        Self {
            columns: vec![Column::new("Length", 8), Column::new("Bytes", 48)],
            attachment: Attachment::new(),
        }
    }
}

impl Default for HexProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl Protocol for HexProtocol {
    fn name(&self) -> &str {
        "Hex"
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn create_decoder(&self, _unit: &ParseUnit) -> Option<Box<dyn Decoder>> {
        Some(Box::new(HexDecoder::default()))
    }

    fn attachment(&self) -> &Attachment {
        &self.attachment
    }
}

#[derive(Debug, Default)]
pub struct HexDecoder {
    decoded: bool,
}

impl Decoder for HexDecoder {
    fn is_decoded(&self) -> bool {
        self.decoded
    }

    fn decode(&mut self, packet: &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        if packet.len() > MAX_PACKET_SIZE {
            return Err(DecodeError::TooLarge(packet.len(), MAX_PACKET_SIZE));
        }

        let rows: Vec<String> = packet.chunks(ROW_WIDTH).map(hex_row).collect();
        let fields = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (format!("{:04x}", i * ROW_WIDTH), row.clone()))
            .collect();

        self.decoded = true;
        Ok(Some(DecodedPacket {
            summary: Some(format!("{} bytes", packet.len())),
            cells: vec![packet.len().to_string(), rows.first().cloned().unwrap_or_default()],
            fields,
        }))
    }
}

/// `de ad be ef ...  |....|`, hex column padded so the ASCII column lines up.
fn hex_row(chunk: &[u8]) -> String {
    let mut row = String::with_capacity(ROW_WIDTH * 4 + 4);
    for (i, b) in chunk.iter().enumerate() {
        if i > 0 {
            row.push(' ');
        }
        let _ = write!(row, "{:02x}", b);
    }
    let padding = (ROW_WIDTH - chunk.len()) * 3;
    row.extend(std::iter::repeat(' ').take(padding));

    row.push_str("  |");
    row.extend(chunk.iter().map(|&b| {
        if b.is_ascii_graphic() || b == b' ' {
            b as char
        } else {
            '.'
        }
    }));
    row.push('|');
    row
}
