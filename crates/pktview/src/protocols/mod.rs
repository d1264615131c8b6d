/// Bundled protocols
///
/// - `hex.rs`: hex dump of any packet
/// - `text.rs`: UTF-8 lines with `key=value` field extraction

pub mod hex;
pub mod text;

pub use hex::HexProtocol;
pub use text::TextProtocol;

/// Packets larger than this are rejected by the bundled decoders.
pub const MAX_PACKET_SIZE: usize = 1_048_576; // 1MB
