/// Decoder and protocol contracts
///
/// A `Protocol` is the pluggable factory the session holds; it hands out one
/// `Decoder` per parse unit. The core never inspects packet bytes itself.
///
/// - `traits.rs`: `Decoder` and `Protocol`
/// - `model.rs`: decoded payload and column metadata
/// - `attachment.rs`: load/unload state machine shared by all protocols
/// - `undefined.rs`: no-op decoder bound when a protocol yields nothing

pub mod traits;
pub mod model;
pub mod attachment;
pub mod undefined;

pub use traits::{Decoder, Protocol};
pub use model::{Column, DecodedPacket};
pub use attachment::Attachment;
pub use undefined::UndefinedDecoder;
