//! Offsets of the value section, derived from the kinds alone.
//!
//! Producer and consumer compute the same layout from the same metadata, so no
//! offsets are stored in the block.

use crate::error::{Error, Result};
use crate::info::MetricInfo;
use crate::kind::Kind;
use crate::protocol::header::HEADER_LEN;
use crate::protocol::metadata::encoded_len;

/// Alignment of the value section and of the block length.
pub const BLOCK_ALIGN: usize = 8;

/// Byte offsets of every part of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Length of the metadata section.
    pub metadata_len: usize,
    /// Start of the presence bytes (and of the value section).
    pub presence_offset: usize,
    /// Absolute offset of each slot, in metadata order. Constants have
    /// zero-width slots that are never accessed.
    pub slot_offsets: Vec<usize>,
    /// Total block length.
    pub total_len: usize,
}

impl Layout {
    /// Compute the layout for `kinds` following a metadata section of
    /// `metadata_len` bytes.
    pub fn compute<I>(metadata_len: usize, kinds: I) -> Result<Layout>
    where
        I: IntoIterator<Item = Kind>,
        I::IntoIter: ExactSizeIterator,
    {
        let kinds = kinds.into_iter();
        let count = kinds.len();

        let presence_offset = align_up(add(HEADER_LEN, metadata_len)?, BLOCK_ALIGN)?;
        let mut cursor = align_up(add(presence_offset, count)?, BLOCK_ALIGN)?;

        let mut slot_offsets = Vec::with_capacity(count);
        for kind in kinds {
            let width = kind.width();
            cursor = align_up(cursor, width.max(1))?;
            slot_offsets.push(cursor);
            cursor = add(cursor, width)?;
        }

        Ok(Layout {
            metadata_len,
            presence_offset,
            slot_offsets,
            total_len: align_up(cursor, BLOCK_ALIGN)?,
        })
    }

    /// Offset of the presence byte for metric `index`.
    pub fn presence(&self, index: usize) -> usize {
        self.presence_offset + index
    }
}

/// Bytes needed for a block holding `infos`.
pub fn block_size(infos: &[MetricInfo]) -> Result<usize> {
    let metadata_len = infos.iter().map(encoded_len).sum();
    Ok(Layout::compute(metadata_len, infos.iter().map(|i| i.kind))?.total_len)
}

fn add(a: usize, b: usize) -> Result<usize> {
    a.checked_add(b)
        .ok_or_else(|| Error::Malformed("block layout overflows usize".into()))
}

fn align_up(offset: usize, align: usize) -> Result<usize> {
    let rem = offset % align;
    if rem == 0 {
        Ok(offset)
    } else {
        add(offset, align - rem)
    }
}
