//! CBP frame layout.
//!
//! ```text
//! offset  size  field
//!  0       2    magic   = 0xCB 0x50
//!  2       1    version = 0x01
//!  3       1    flags   (bitfield)
//!  4       2    payload_length (u16, big-endian)
//!  6       2    crc16 of payload (CCITT-FALSE: poly 0x1021, init 0xFFFF, no xorout)
//!  8       N    payload
//! ```
//!
//! Every multi-byte integer is big-endian.

use crate::error::CodecError;
use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub const MAGIC: u16 = 0xCB50;
pub const VERSION: u8 = 0x01;
pub const HEADER_SIZE: usize = 8;

const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);

bitflags! {
    /// Frame header flags bitfield (bit 0 is the LSB).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameFlags: u8 {
        /// Payload is prefixed with an 8-byte base hash, then delta bytes.
        const IS_DELTA = 1 << 0;
        /// Payload is exactly an 8-byte reference into the Semantic Registry.
        const HAS_HASH = 1 << 1;
        /// Payload has been LZ4-compressed.
        const COMPRESSED = 1 << 2;
        /// Reserved; MUST be zero in version 1.
        const ENCRYPTED = 1 << 3;
    }
}

impl FrameFlags {
    /// `HAS_HASH` and `COMPRESSED` are mutually exclusive (a hash reference
    /// is 8 raw bytes, never compressed). The open question of combining
    /// `IS_DELTA + HAS_HASH` is resolved as a hard reject here.
    #[must_use]
    pub const fn is_valid_combination(self) -> bool {
        if self.contains(Self::HAS_HASH) && self.contains(Self::COMPRESSED) {
            return false;
        }
        if self.contains(Self::IS_DELTA) && self.contains(Self::HAS_HASH) {
            return false;
        }
        if self.contains(Self::ENCRYPTED) {
            return false;
        }
        true
    }
}

/// A single CBP frame: a version, a flags byte, and an opaque payload. The
/// codec layer above is responsible for giving the payload meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: FrameFlags,
    pub payload: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(flags: FrameFlags, payload: Vec<u8>) -> Self {
        Self { flags, payload }
    }

    fn crc16(payload: &[u8]) -> u16 {
        CRC.checksum(payload)
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        if !self.flags.is_valid_combination() {
            return Err(CodecError::InvalidSchema(format!(
                "invalid flag combination: {:?}",
                self.flags
            )));
        }
        let payload_len =
            u16::try_from(self.payload.len()).map_err(|_| CodecError::InvalidSchema(
                format!("payload too large for u16 length field: {} bytes", self.payload.len()),
            ))?;

        dst.reserve(HEADER_SIZE + self.payload.len());
        dst.put_u16(MAGIC);
        dst.put_u8(VERSION);
        dst.put_u8(self.flags.bits());
        dst.put_u16(payload_len);
        dst.put_u16(Self::crc16(&self.payload));
        dst.extend_from_slice(&self.payload);
        Ok(())
    }

    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, CodecError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut peek = &src[..HEADER_SIZE];
        let magic = peek.get_u16();
        if magic != MAGIC {
            return Err(CodecError::BadMagic {
                expected: MAGIC,
                got: magic,
            });
        }
        let version = peek.get_u8();
        if version != VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let flags_raw = peek.get_u8();
        let flags = FrameFlags::from_bits_truncate(flags_raw);
        if !flags.is_valid_combination() {
            return Err(CodecError::InvalidSchema(format!(
                "invalid flag combination: {flags:?}"
            )));
        }
        let payload_len = peek.get_u16();
        let expected_crc = peek.get_u16();

        let total_len = HEADER_SIZE + payload_len as usize;
        if src.len() < total_len {
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src[..payload_len as usize].to_vec();
        src.advance(payload_len as usize);

        if payload.len() != payload_len as usize {
            return Err(CodecError::LengthMismatch {
                expected: payload_len,
                actual: payload.len(),
            });
        }

        let calculated_crc = Self::crc16(&payload);
        if calculated_crc != expected_crc {
            return Err(CodecError::CrcMismatch {
                expected: expected_crc,
                calculated: calculated_crc,
            });
        }

        Ok(Some(Self { flags, payload }))
    }
}

/// `tokio_util` codec wrapper. Kept even though the in-process bus never
/// streams frames over a socket: a future transport integrator gets a
/// working `Decoder`/`Encoder` pair for free.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Frame::decode(src)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst)
    }
}

/// Frame parser with magic-byte resynchronization. Useful once frames
/// travel over a byte stream where a corrupt frame shouldn't wedge the
/// whole connection.
pub struct ResilientFrameParser {
    max_resync_attempts: usize,
}

impl Default for ResilientFrameParser {
    fn default() -> Self {
        Self {
            max_resync_attempts: 3,
        }
    }
}

impl ResilientFrameParser {
    #[must_use]
    pub fn with_max_resync(max: usize) -> Self {
        Self {
            max_resync_attempts: max,
        }
    }

    pub fn parse_resilient(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        let mut attempts = 0;
        loop {
            match Frame::decode(src) {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    attempts += 1;
                    if attempts > self.max_resync_attempts {
                        return Err(e);
                    }
                    match find_magic(src) {
                        Some(pos) if pos > 0 => {
                            src.advance(pos);
                        }
                        Some(_) => return Err(e),
                        None => {
                            if src.len() > 4096 {
                                src.clear();
                            }
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }
}

fn find_magic(src: &BytesMut) -> Option<usize> {
    let magic_bytes = MAGIC.to_be_bytes();
    src.windows(2).position(|window| window == magic_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let frame = Frame::new(FrameFlags::empty(), b"hello world".to_vec());
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn header_is_big_endian() {
        let frame = Frame::new(FrameFlags::COMPRESSED, vec![1, 2, 3]);
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        assert_eq!(&buf[0..2], &MAGIC.to_be_bytes());
        assert_eq!(buf[2], VERSION);
        assert_eq!(buf[3], FrameFlags::COMPRESSED.bits());
        assert_eq!(&buf[4..6], &3u16.to_be_bytes());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u16(0xDEAD);
        buf.put_u8(VERSION);
        buf.put_u8(0);
        buf.put_u16(0);
        buf.put_u16(0);
        assert!(matches!(Frame::decode(&mut buf), Err(CodecError::BadMagic { .. })));
    }

    #[test]
    fn crc_tamper_is_detected() {
        let frame = Frame::new(FrameFlags::empty(), b"payload".to_vec());
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        assert!(matches!(Frame::decode(&mut buf), Err(CodecError::CrcMismatch { .. })));
    }

    #[test]
    fn has_hash_and_compressed_is_invalid() {
        let flags = FrameFlags::HAS_HASH | FrameFlags::COMPRESSED;
        assert!(!flags.is_valid_combination());
    }

    #[test]
    fn is_delta_and_has_hash_is_invalid() {
        let flags = FrameFlags::IS_DELTA | FrameFlags::HAS_HASH;
        assert!(!flags.is_valid_combination());
    }

    #[test]
    fn is_delta_and_compressed_is_valid() {
        let flags = FrameFlags::IS_DELTA | FrameFlags::COMPRESSED;
        assert!(flags.is_valid_combination());
    }

    #[test]
    fn incomplete_frame_returns_none() {
        let mut buf = BytesMut::new();
        buf.put_u16(MAGIC);
        buf.put_u8(VERSION);
        let result = Frame::decode(&mut buf).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn resilient_parser_skips_garbage_prefix() {
        let frame = Frame::new(FrameFlags::empty(), b"abc".to_vec());
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"\x00\x00garbage");
        frame.encode(&mut buf).unwrap();

        let mut parser = ResilientFrameParser::default();
        let decoded = parser.parse_resilient(&mut buf).unwrap();
        assert_eq!(decoded, Some(frame));
    }
}
