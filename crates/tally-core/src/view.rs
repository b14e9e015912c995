//! Consumer side: read-only view over a block written elsewhere.

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use crate::block::Block;
use crate::error::{Error, Result};
use crate::info::MetricInfo;
use crate::json::MetricSource;
use crate::kind::{Kind, Value};
use crate::protocol::header::{Header, HEADER_LEN};
use crate::protocol::layout::Layout;
use crate::protocol::metadata::parse_metadata;
use crate::protocol::metadata_hash;
use crate::slot;

/// Non-owning reader attached to a sealed metrics block.
///
/// Metadata is decoded once by `open()` and never re-validated; values are
/// read live from the block on every access.
#[derive(Debug)]
pub struct View<'a> {
    block: &'a Block,
    header: Header,
    infos: Vec<MetricInfo>,
    names: HashMap<String, usize>,
    layout: Layout,
}

impl<'a> View<'a> {
    /// Validate the header and decode the metadata of `block`.
    pub fn open(block: &'a Block) -> Result<View<'a>> {
        match Self::decode(block) {
            Ok(view) => {
                tracing::debug!(
                    metrics = view.infos.len(),
                    block_bytes = block.len(),
                    "metrics view opened"
                );
                Ok(view)
            }
            Err(e) => {
                tracing::warn!(error = %e, code = e.code().as_str(), "rejecting metrics block");
                Err(e)
            }
        }
    }

    fn decode(block: &'a Block) -> Result<View<'a>> {
        let truncated = |needed: usize| Error::Truncated {
            needed,
            available: block.len(),
        };

        // Pairs with the release store that publishes a sealed block.
        block
            .load(0, 4, Ordering::Acquire)
            .ok_or_else(|| truncated(HEADER_LEN))?;
        let raw = block
            .read_bytes(0, HEADER_LEN)
            .ok_or_else(|| truncated(HEADER_LEN))?;
        let header = Header::decode(&raw)?;

        let metadata_len = header.metadata_len as usize;
        let metadata_end = HEADER_LEN
            .checked_add(metadata_len)
            .ok_or_else(|| Error::Malformed("metadata length overflows".into()))?;
        let metadata = block
            .read_bytes(HEADER_LEN, metadata_len)
            .ok_or_else(|| truncated(metadata_end))?;

        if metadata_hash(&metadata) != header.metadata_hash {
            return Err(Error::Malformed("metadata hash mismatch".into()));
        }

        let infos = parse_metadata(&metadata, header.metric_count as usize)?;
        let layout = Layout::compute(metadata_len, infos.iter().map(|i| i.kind))?;
        if layout.total_len > block.len() {
            return Err(truncated(layout.total_len));
        }

        let names = infos
            .iter()
            .enumerate()
            .map(|(i, info)| (info.name.clone(), i))
            .collect();

        Ok(View {
            block,
            header,
            infos,
            names,
            layout,
        })
    }

    /// Protocol version stored in the block.
    pub fn protocol_version(&self) -> u32 {
        self.header.version
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Metric descriptions in metadata order. Restartable: call again to
    /// iterate from the start.
    pub fn list(&self) -> impl Iterator<Item = &MetricInfo> + '_ {
        self.infos.iter()
    }

    pub fn count(&self) -> usize {
        self.infos.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn info(&self, name: &str) -> Option<&MetricInfo> {
        self.infos.get(self.index_of(name)?)
    }

    /// Current value of the metric named `name`; `None` while unset.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        let index = self
            .index_of(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_owned()))?;
        Ok(self.value(index))
    }
}

impl MetricSource for View<'_> {
    fn infos(&self) -> &[MetricInfo] {
        &self.infos
    }

    fn value(&self, index: usize) -> Option<Value> {
        let info = self.infos.get(index)?;
        if info.kind == Kind::Constant {
            return info.constant_value.clone();
        }
        slot::load(
            self.block,
            self.layout.presence(index),
            *self.layout.slot_offsets.get(index)?,
            info.kind,
            self.header.byte_order,
        )
    }
}
