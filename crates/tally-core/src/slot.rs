//! Single-slot loads and stores.
//!
//! A slot is read and written with one atomic operation on the word that
//! holds it, so a reader never observes a torn value. The presence byte is
//! stored with release ordering after the value and loaded with acquire
//! ordering before it.

use std::sync::atomic::Ordering;

use crate::block::Block;
use crate::kind::{Kind, Value};
use crate::protocol::header::ByteOrder;

/// Presence byte: no value yet.
pub(crate) const UNSET: u8 = 0;
/// Presence byte: slot holds a value.
pub(crate) const SET: u8 = 1;
/// Presence byte: first write of a constant slot is in progress.
pub(crate) const WRITING: u8 = 2;

/// Store raw bits into a slot, in native byte order.
pub(crate) fn store(block: &Block, offset: usize, kind: Kind, bits: u64) -> Option<()> {
    block.store(offset, kind.width(), bits, Ordering::Relaxed)
}

/// Publish a presence state; pairs with the acquire load in `load`.
pub(crate) fn mark(block: &Block, presence: usize, state: u8) -> Option<()> {
    block.store(presence, 1, u64::from(state), Ordering::Release)
}

/// Move a presence byte from `UNSET` to `WRITING`. `Some(false)` if the slot
/// was already claimed.
pub(crate) fn claim(block: &Block, presence: usize) -> Option<bool> {
    let claimed = block.update(presence, 1, Ordering::AcqRel, Ordering::Acquire, |state| {
        (state == u64::from(UNSET)).then_some(u64::from(WRITING))
    })?;
    Some(claimed.is_ok())
}

/// Add `delta` to a numeric slot. Integers wrap.
pub(crate) fn add(block: &Block, offset: usize, delta: &Value) -> Option<()> {
    let kind = delta.kind().filter(|k| k.is_numeric())?;
    block
        .update(offset, kind.width(), Ordering::Relaxed, Ordering::Relaxed, |old| {
            sum(old, delta)
        })?
        .ok()?;
    Some(())
}

fn sum(old: u64, delta: &Value) -> Option<u64> {
    Some(match *delta {
        Value::Int32(d) => u64::from((old as u32).wrapping_add(d as u32)),
        Value::Uint32(d) => u64::from((old as u32).wrapping_add(d)),
        Value::Int64(d) => old.wrapping_add(d as u64),
        Value::Uint64(d) => old.wrapping_add(d),
        Value::Float32(d) => u64::from((f32::from_bits(old as u32) + d).to_bits()),
        Value::Float64(d) => (f64::from_bits(old) + d).to_bits(),
        Value::Boolean(_) | Value::Enum8(_) | Value::Text(_) => return None,
    })
}

/// Load a slot written in `order`, if its presence byte says it is set.
pub(crate) fn load(
    block: &Block,
    presence: usize,
    offset: usize,
    kind: Kind,
    order: ByteOrder,
) -> Option<Value> {
    if block.load(presence, 1, Ordering::Acquire)? != u64::from(SET) {
        return None;
    }
    let swap = order != ByteOrder::native();
    let raw = block.load(offset, kind.width(), Ordering::Relaxed)?;
    let bits = match kind.width() {
        1 => raw,
        4 if swap => u64::from((raw as u32).swap_bytes()),
        8 if swap => raw.swap_bytes(),
        4 | 8 => raw,
        _ => return None,
    };
    Value::from_bits(kind, bits)
}
