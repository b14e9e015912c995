//! Memory block wire format.
//!
//! A block is a fixed header, a metadata section describing every metric, and
//! a value section holding one presence byte and one slot per metric:
//! - Header: version, counts, metadata hash and value byte order (little-endian).
//! - Metadata: length-prefixed records, immutable once sealed.
//! - Values: naturally aligned slots in the producer's native byte order.
//!
//! All decoders are panic-free: malformed input is reported as `Error`
//! instead of panicking or indexing raw buffers, so a reader survives
//! foreign or corrupted memory.

pub mod header;
pub mod layout;
pub mod metadata;

pub use header::{ByteOrder, Header, HEADER_LEN};
pub use layout::{block_size, Layout};
pub use metadata::{encode_metadata, parse_metadata};

/// Version of the block layout this build reads and writes.
pub const PROTOCOL_VERSION: u32 = 1;

/// FNV-1a 32-bit hash over the metadata section.
pub fn metadata_hash(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    bytes.iter().fold(OFFSET_BASIS, |hash, b| {
        (hash ^ u32::from(*b)).wrapping_mul(PRIME)
    })
}
