//! CBP Codec: schema canonicalization, MessagePack framing, dedup,
//! compression, and delta bookkeeping over the wire frame.

mod codec;
mod error;
mod frame;
mod message;

pub use codec::{Decoder, EncodeOptions, Encoder, EncoderStats};
pub use error::CodecError;
pub use frame::{Frame, FrameCodec, FrameFlags, ResilientFrameParser, HEADER_SIZE, MAGIC, VERSION};
pub use message::{canonicalize, decanonicalize, StructuredMessage};

pub use rmpv::Value;
