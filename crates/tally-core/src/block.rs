//! Memory region shared between one producer and any number of viewers.
//!
//! The region is an array of 8-byte words and every access, whatever the
//! field width, is an atomic operation on the whole `AtomicU64` word that
//! holds it. Narrower fields are read by shifting out their lane and written
//! with a compare-and-swap on the word, so no two accesses to the same bytes
//! ever differ in size. Accessors check bounds and natural alignment, so a
//! `Block` can safely sit over memory that another process writes
//! concurrently through this crate.

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::protocol::layout::BLOCK_ALIGN;

/// A fixed-size, 8-byte aligned memory region.
pub struct Block {
    ptr: NonNull<AtomicU64>,
    /// Accessible words.
    words: usize,
    /// Logical length in bytes, at most `words * 8`.
    len: usize,
    /// Whether `ptr` came from `new()` and is freed on drop.
    owned: bool,
}

// SAFETY: all access to the region goes through `AtomicU64`.
unsafe impl Send for Block {}
// SAFETY: as above; shared references only perform atomic word operations.
unsafe impl Sync for Block {}

impl Block {
    /// Allocate a zeroed block of at least `len` bytes (rounded up to 8).
    pub fn new(len: usize) -> Self {
        let words = len.div_ceil(BLOCK_ALIGN);
        let storage: Box<[AtomicU64]> = (0..words).map(|_| AtomicU64::new(0)).collect();
        let ptr = NonNull::from(Box::leak(storage)).cast::<AtomicU64>();
        Self {
            ptr,
            words,
            len: words * BLOCK_ALIGN,
            owned: true,
        }
    }

    /// Copy a byte snapshot (e.g. received from a transport) into a new block.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut block = Self::new(bytes.len());
        // Freshly allocated and large enough, so the write cannot miss.
        let _ = block.write_bytes(0, bytes);
        block.len = bytes.len();
        block
    }

    /// Wrap a caller-managed region such as a shared memory mapping.
    ///
    /// Only whole words are used: a trailing partial word is ignored and
    /// `len()` reports `len` rounded down to a multiple of 8.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes for as long as
    /// the returned `Block` (and any `View` borrowing it) is alive, and every
    /// other access to the region, in this or any other process, must be an
    /// atomic 8-byte word operation (as performed by `Block`). The block
    /// never frees the region.
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize) -> Result<Self> {
        let ptr = NonNull::new(ptr).ok_or_else(|| Error::Malformed("null region".into()))?;
        if ptr.as_ptr() as usize % BLOCK_ALIGN != 0 {
            return Err(Error::Malformed(format!(
                "region is not {BLOCK_ALIGN}-byte aligned"
            )));
        }
        let words = len / BLOCK_ALIGN;
        Ok(Self {
            ptr: ptr.cast::<AtomicU64>(),
            words,
            len: words * BLOCK_ALIGN,
            owned: false,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte snapshot of the whole region, for handing to a transport.
    ///
    /// Each word is loaded atomically, so every slot in the copy holds a
    /// value that was actually stored. Different words may come from
    /// different moments.
    pub fn to_vec(&self) -> Vec<u8> {
        self.read_bytes(0, self.len).unwrap_or_default()
    }

    /// Copy `len` bytes starting at `offset`, one word load at a time.
    pub(crate) fn read_bytes(&self, offset: usize, len: usize) -> Option<Vec<u8>> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        let mut out = Vec::with_capacity(len);
        let mut pos = offset;
        while pos < end {
            let start = pos % BLOCK_ALIGN;
            let stop = (end - (pos - start)).min(BLOCK_ALIGN);
            let bytes = self.word(pos / BLOCK_ALIGN)?.load(Ordering::Relaxed).to_ne_bytes();
            out.extend_from_slice(bytes.get(start..stop)?);
            pos += stop - start;
        }
        Some(out)
    }

    /// Store `bytes` starting at `offset`. Whole words are stored directly,
    /// partial words are merged with a compare-and-swap.
    pub(crate) fn write_bytes(&self, offset: usize, bytes: &[u8]) -> Option<()> {
        let end = offset.checked_add(bytes.len())?;
        if end > self.len {
            return None;
        }
        let mut pos = offset;
        let mut rest = bytes;
        while !rest.is_empty() {
            let start = pos % BLOCK_ALIGN;
            let take = (BLOCK_ALIGN - start).min(rest.len());
            let (head, tail) = rest.split_at(take);
            let word = self.word(pos / BLOCK_ALIGN)?;
            if take == BLOCK_ALIGN {
                word.store(u64::from_ne_bytes(head.try_into().ok()?), Ordering::Relaxed);
            } else {
                let _ = word.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |old| {
                    let mut merged = old.to_ne_bytes();
                    merged.get_mut(start..start + take)?.copy_from_slice(head);
                    Some(u64::from_ne_bytes(merged))
                });
            }
            pos += take;
            rest = tail;
        }
        Some(())
    }

    /// Load the `width`-byte field at `offset` as a native-order integer.
    pub(crate) fn load(&self, offset: usize, width: usize, order: Ordering) -> Option<u64> {
        let lane = self.lane(offset, width)?;
        Some(lane.extract(lane.word.load(order)))
    }

    /// Store the low `width` bytes of `bits` at `offset`.
    pub(crate) fn store(&self, offset: usize, width: usize, bits: u64, order: Ordering) -> Option<()> {
        let lane = self.lane(offset, width)?;
        if lane.mask == u64::MAX {
            lane.word.store(bits, order);
        } else {
            let _ = lane
                .word
                .fetch_update(order, Ordering::Relaxed, |old| Some(lane.insert(old, bits)));
        }
        Some(())
    }

    /// Atomically replace the field at `offset` with `f(current)`.
    ///
    /// Returns `Ok(previous)` when `f` produced a value and `Err(current)`
    /// when it declined, like `AtomicU64::fetch_update`.
    pub(crate) fn update<F>(
        &self,
        offset: usize,
        width: usize,
        set_order: Ordering,
        fetch_order: Ordering,
        mut f: F,
    ) -> Option<std::result::Result<u64, u64>>
    where
        F: FnMut(u64) -> Option<u64>,
    {
        let lane = self.lane(offset, width)?;
        let result = lane.word.fetch_update(set_order, fetch_order, |old| {
            f(lane.extract(old)).map(|new| lane.insert(old, new))
        });
        Some(result.map(|old| lane.extract(old)).map_err(|old| lane.extract(old)))
    }

    fn word(&self, index: usize) -> Option<&AtomicU64> {
        if index >= self.words {
            return None;
        }
        // SAFETY: `index` is within the allocation or the region promised by
        // `from_raw_parts`, and the base pointer is 8-aligned.
        Some(unsafe { &*self.ptr.as_ptr().add(index) })
    }

    fn lane(&self, offset: usize, width: usize) -> Option<Lane<'_>> {
        let end = offset.checked_add(width)?;
        if !matches!(width, 1 | 2 | 4 | 8) || end > self.len || offset % width != 0 {
            return None;
        }
        let byte = offset % BLOCK_ALIGN;
        let shift = if cfg!(target_endian = "big") {
            8 * (BLOCK_ALIGN - byte - width)
        } else {
            8 * byte
        };
        let mask = if width == BLOCK_ALIGN {
            u64::MAX
        } else {
            (1u64 << (8 * width)) - 1
        };
        Some(Lane {
            word: self.word(offset / BLOCK_ALIGN)?,
            shift: shift as u32,
            mask,
        })
    }
}

/// A naturally aligned field inside one word.
struct Lane<'a> {
    word: &'a AtomicU64,
    shift: u32,
    mask: u64,
}

impl Lane<'_> {
    fn extract(&self, word: u64) -> u64 {
        (word >> self.shift) & self.mask
    }

    fn insert(&self, word: u64, bits: u64) -> u64 {
        (word & !(self.mask << self.shift)) | ((bits & self.mask) << self.shift)
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if self.owned {
            let storage = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.words);
            // SAFETY: `ptr` and `words` describe the boxed slice leaked in
            // `new()`, and no `View` can outlive the block it borrows.
            drop(unsafe { Box::from_raw(storage) });
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.len)
            .field("owned", &self.owned)
            .finish()
    }
}
