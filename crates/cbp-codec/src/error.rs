//! Codec errors. Every variant carries a stable
//! [`cbp_schema::ErrorKind`] discriminator via [`CodecError::kind`], and all
//! of them are non-retryable at this layer.

use cbp_schema::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame too short: {len} bytes, need at least {min}")]
    FrameTooShort { len: usize, min: usize },

    #[error("bad magic: expected {expected:#06x}, got {got:#06x}")]
    BadMagic { expected: u16, got: u16 },

    #[error("unsupported version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("payload length mismatch: header says {expected}, frame has {actual}")]
    LengthMismatch { expected: u16, actual: usize },

    #[error("crc16 mismatch: expected {expected:#06x}, calculated {calculated:#06x}")]
    CrcMismatch { expected: u16, calculated: u16 },

    #[error("hash {0:#018x} not found in semantic registry")]
    HashNotFound(u64),

    #[error("lz4 decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("messagepack unpack failed: {0}")]
    UnpackFailed(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

impl CodecError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::FrameTooShort { .. } => ErrorKind::FrameTooShort,
            Self::BadMagic { .. } => ErrorKind::BadMagic,
            Self::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Self::LengthMismatch { .. } => ErrorKind::LengthMismatch,
            Self::CrcMismatch { .. } => ErrorKind::CrcMismatch,
            Self::HashNotFound(_) => ErrorKind::HashNotFound,
            Self::DecompressionFailed(_) => ErrorKind::DecompressionFailed,
            Self::UnpackFailed(_) => ErrorKind::UnpackFailed,
            Self::InvalidSchema(_) => ErrorKind::InvalidSchema,
        }
    }

    #[must_use]
    pub fn to_envelope(&self) -> cbp_schema::ErrorEnvelope {
        cbp_schema::ErrorEnvelope::new(self.kind(), self.to_string())
    }
}
