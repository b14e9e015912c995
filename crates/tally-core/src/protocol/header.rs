//! Block header parsing (panic-free).
//!
//! Parsing rules:
//! - Never index (`buf[0]`), always use `Buf` and `remaining()` checks.
//! - The version is checked before any other field is trusted.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};
use crate::protocol::PROTOCOL_VERSION;

/// Header size in bytes.
pub const HEADER_LEN: usize = 24;

/// Byte order of the value section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the running target.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ByteOrder::Little => 0,
            ByteOrder::Big => 1,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ByteOrder::Little),
            1 => Ok(ByteOrder::Big),
            other => Err(Error::Malformed(format!("unknown byte order flag {other}"))),
        }
    }
}

/// Decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version.
    pub version: u32,
    /// Number of metric records.
    pub metric_count: u32,
    /// Length of the metadata section.
    pub metadata_len: u32,
    /// FNV-1a hash of the metadata section.
    pub metadata_hash: u32,
    /// Byte order of the value slots.
    pub byte_order: ByteOrder,
}

impl Header {
    /// Encode into the fixed header layout. Reserved bytes are zero.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.metric_count);
        buf.put_u32_le(self.metadata_len);
        buf.put_u32_le(self.metadata_hash);
        buf.put_u8(self.byte_order.code());
        out
    }

    /// Decode a header from the start of `buf`.
    pub fn decode(mut buf: &[u8]) -> Result<Header> {
        if buf.remaining() < HEADER_LEN {
            return Err(Error::Truncated {
                needed: HEADER_LEN,
                available: buf.remaining(),
            });
        }

        let version = buf.get_u32_le();
        if version != PROTOCOL_VERSION {
            return Err(Error::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: version,
            });
        }

        let metric_count = buf.get_u32_le();
        let metadata_len = buf.get_u32_le();
        let metadata_hash = buf.get_u32_le();
        let byte_order = ByteOrder::from_code(buf.get_u8())?;

        Ok(Header {
            version,
            metric_count,
            metadata_len,
            metadata_hash,
            byte_order,
        })
    }
}
