//! Producer side: defines metrics, seals the block and writes values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::block::Block;
use crate::error::{Error, Result};
use crate::info::MetricInfo;
use crate::json::MetricSource;
use crate::kind::{Kind, Value};
use crate::protocol::header::{ByteOrder, Header, HEADER_LEN};
use crate::protocol::layout::{block_size, Layout};
use crate::protocol::metadata::encode_metadata;
use crate::protocol::{metadata_hash, PROTOCOL_VERSION};
use crate::slot::{self, SET, UNSET};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one defined metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    owner: u64,
    index: usize,
    kind: Kind,
}

impl Slot {
    /// Position in metadata order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }
}

struct Sealed {
    block: Block,
    layout: Layout,
}

/// Owner and sole writer of a metrics block.
///
/// Metrics are defined first, then `seal()` writes the header and metadata
/// once. After that only values change, through `&self`, so distinct slots
/// can be written from different threads.
pub struct Metrics {
    id: u64,
    max_metrics: usize,
    infos: Vec<MetricInfo>,
    names: HashMap<String, usize>,
    /// Caller-supplied region waiting for `seal()`.
    region: Option<Block>,
    sealed: Option<Sealed>,
}

impl Metrics {
    /// Producer that allocates its own block at seal time.
    pub fn new(max_metrics: usize) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            max_metrics,
            infos: Vec::new(),
            names: HashMap::new(),
            region: None,
            sealed: None,
        }
    }

    /// Producer writing into a caller-supplied block, sized with
    /// [`block_size`].
    pub fn with_block(max_metrics: usize, block: Block) -> Self {
        Self {
            region: Some(block),
            ..Self::new(max_metrics)
        }
    }

    pub fn max_metrics(&self) -> usize {
        self.max_metrics
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.is_some()
    }

    /// Bytes the block needs for the metrics defined so far.
    pub fn block_size(&self) -> Result<usize> {
        block_size(&self.infos)
    }

    /// Define a metric.
    ///
    /// `Kind::Constant` is rejected here with `InvalidDefinition`, since a
    /// constant carries its value in the metadata: build it with
    /// [`MetricInfo::constant_value`] and pass it to [`Metrics::define_info`].
    pub fn define(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        kind: Kind,
    ) -> Result<Slot> {
        self.define_info(MetricInfo::new(name, description, kind).with_unit(unit))
    }

    /// Define a metric from a full description (constant flag, labels,
    /// constant value).
    pub fn define_info(&mut self, info: MetricInfo) -> Result<Slot> {
        if self.sealed.is_some() {
            return Err(Error::AlreadySealed);
        }
        if self.names.contains_key(&info.name) {
            return Err(Error::DuplicateName(info.name));
        }
        if self.infos.len() >= self.max_metrics {
            return Err(Error::CapacityExceeded {
                max: self.max_metrics,
            });
        }
        info.validate()?;

        let slot = Slot {
            owner: self.id,
            index: self.infos.len(),
            kind: info.kind,
        };
        self.names.insert(info.name.clone(), slot.index);
        self.infos.push(info);
        Ok(slot)
    }

    /// Slot of an already defined metric.
    pub fn slot(&self, name: &str) -> Option<Slot> {
        let index = *self.names.get(name)?;
        Some(Slot {
            owner: self.id,
            index,
            kind: self.infos.get(index)?.kind,
        })
    }

    /// Write header, metadata and an empty value section. Once only.
    pub fn seal(&mut self) -> Result<()> {
        if self.sealed.is_some() {
            return Err(Error::AlreadySealed);
        }

        let metadata = encode_metadata(&self.infos)?;
        let layout = Layout::compute(metadata.len(), self.infos.iter().map(|i| i.kind))?;
        let header = Header {
            version: PROTOCOL_VERSION,
            metric_count: u32::try_from(self.infos.len())
                .map_err(|_| Error::InvalidDefinition("too many metrics".into()))?,
            metadata_len: u32::try_from(metadata.len())
                .map_err(|_| Error::InvalidDefinition("metadata exceeds 4 GiB".into()))?,
            metadata_hash: metadata_hash(&metadata),
            byte_order: ByteOrder::native(),
        };

        let block = match self.region.take() {
            Some(block) => block,
            None => Block::new(layout.total_len),
        };
        if block.len() < layout.total_len {
            let available = block.len();
            self.region = Some(block);
            return Err(Error::BlockTooSmall {
                required: layout.total_len,
                available,
            });
        }

        let too_small = || Error::BlockTooSmall {
            required: layout.total_len,
            available: block.len(),
        };

        // Readers see version 0 ("not ready") until everything below is written.
        block.store(0, 4, 0, Ordering::Relaxed).ok_or_else(too_small)?;
        let encoded = header.encode();
        block
            .write_bytes(4, encoded.get(4..).unwrap_or_default())
            .ok_or_else(too_small)?;
        block.write_bytes(HEADER_LEN, &metadata).ok_or_else(too_small)?;
        let values_len = layout.total_len - layout.presence_offset;
        block
            .write_bytes(layout.presence_offset, &vec![0u8; values_len])
            .ok_or_else(too_small)?;
        block
            .store(0, 4, u64::from(PROTOCOL_VERSION.to_le()), Ordering::Release)
            .ok_or_else(too_small)?;

        tracing::debug!(
            metrics = self.infos.len(),
            metadata_bytes = metadata.len(),
            block_bytes = layout.total_len,
            "metrics block sealed"
        );

        self.sealed = Some(Sealed { block, layout });
        Ok(())
    }

    /// The sealed block, for viewers and transports.
    pub fn block(&self) -> Option<&Block> {
        self.sealed.as_ref().map(|s| &s.block)
    }

    /// Set a slot's value. Constant slots accept exactly one write.
    pub fn set(&self, slot: Slot, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let (info, sealed) = self.writable(slot, &value)?;
        let presence = sealed.layout.presence(slot.index);

        if info.is_constant && !slot::claim(&sealed.block, presence).ok_or(Error::InvalidSlot)? {
            return Err(Error::ConstantAlreadySet(info.name.clone()));
        }

        let bits = value.to_bits().ok_or(Error::KindMismatch {
            expected: info.kind,
            found: None,
        })?;
        slot::store(&sealed.block, offset(sealed, slot)?, info.kind, bits)
            .ok_or(Error::InvalidSlot)?;
        slot::mark(&sealed.block, presence, SET).ok_or(Error::InvalidSlot)
    }

    /// Add `delta` to a numeric slot. An unset slot starts from zero.
    pub fn increment(&self, slot: Slot, delta: impl Into<Value>) -> Result<()> {
        let delta = delta.into();
        let (info, sealed) = self.writable(slot, &delta)?;
        if info.is_constant {
            return Err(Error::ConstantAlreadySet(info.name.clone()));
        }
        if !info.kind.is_numeric() {
            return Err(Error::KindMismatch {
                expected: info.kind,
                found: delta.kind(),
            });
        }

        slot::add(&sealed.block, offset(sealed, slot)?, &delta).ok_or(Error::InvalidSlot)?;
        slot::mark(&sealed.block, sealed.layout.presence(slot.index), SET)
            .ok_or(Error::InvalidSlot)
    }

    /// Clear a slot back to "no value". Constant slots cannot be reset.
    pub fn reset(&self, slot: Slot) -> Result<()> {
        let info = self.info_for(slot)?;
        if info.is_constant {
            return Err(Error::ConstantAlreadySet(info.name.clone()));
        }
        let sealed = self.sealed.as_ref().ok_or(Error::NotSealed)?;
        self.clear(sealed, slot.index, info.kind)
    }

    /// Reset every non-constant slot.
    pub fn reset_all(&self) -> Result<()> {
        let sealed = self.sealed.as_ref().ok_or(Error::NotSealed)?;
        for (index, info) in self.infos.iter().enumerate() {
            if !info.is_constant {
                self.clear(sealed, index, info.kind)?;
            }
        }
        Ok(())
    }

    /// Current value of the metric named `name`.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        let index = *self
            .names
            .get(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_owned()))?;
        Ok(self.value(index))
    }

    fn clear(&self, sealed: &Sealed, index: usize, kind: Kind) -> Result<()> {
        slot::mark(&sealed.block, sealed.layout.presence(index), UNSET)
            .ok_or(Error::InvalidSlot)?;
        let offset = *sealed.layout.slot_offsets.get(index).ok_or(Error::InvalidSlot)?;
        slot::store(&sealed.block, offset, kind, 0).ok_or(Error::InvalidSlot)
    }

    fn info_for(&self, slot: Slot) -> Result<&MetricInfo> {
        if slot.owner != self.id {
            return Err(Error::InvalidSlot);
        }
        self.infos.get(slot.index).ok_or(Error::InvalidSlot)
    }

    fn writable(&self, slot: Slot, value: &Value) -> Result<(&MetricInfo, &Sealed)> {
        let info = self.info_for(slot)?;
        if info.kind == Kind::Constant {
            return Err(Error::ConstantAlreadySet(info.name.clone()));
        }
        if value.kind() != Some(info.kind) {
            return Err(Error::KindMismatch {
                expected: info.kind,
                found: value.kind(),
            });
        }
        let sealed = self.sealed.as_ref().ok_or(Error::NotSealed)?;
        Ok((info, sealed))
    }
}

fn offset(sealed: &Sealed, slot: Slot) -> Result<usize> {
    sealed
        .layout
        .slot_offsets
        .get(slot.index)
        .copied()
        .ok_or(Error::InvalidSlot)
}

impl MetricSource for Metrics {
    fn infos(&self) -> &[MetricInfo] {
        &self.infos
    }

    fn value(&self, index: usize) -> Option<Value> {
        let info = self.infos.get(index)?;
        if info.kind == Kind::Constant {
            return info.constant_value.clone();
        }
        let sealed = self.sealed.as_ref()?;
        slot::load(
            &sealed.block,
            sealed.layout.presence(index),
            *sealed.layout.slot_offsets.get(index)?,
            info.kind,
            ByteOrder::native(),
        )
    }
}
