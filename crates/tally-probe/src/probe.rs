//! Demo producer: defines metrics from config and feeds them synthetic values.

use tally_core::error::{Error, Result};
use tally_core::{to_json, Category, Kind, MetricInfo, Metrics, Slot, Value, View};

use crate::config::ProbeConfig;

/// A sealed metrics block plus the state needed to update it each tick.
pub struct Probe {
    metrics: Metrics,
    slots: Vec<(Slot, MetricInfo)>,
    ticks: u64,
}

impl Probe {
    /// Define every configured metric and seal the block.
    pub fn from_config(cfg: &ProbeConfig) -> Result<Self> {
        let mut metrics = Metrics::new(cfg.probe.max_metrics);
        let mut slots = Vec::with_capacity(cfg.metrics.len());
        for info in cfg.to_infos()? {
            let slot = metrics.define_info(info.clone())?;
            slots.push((slot, info));
        }
        metrics.seal()?;
        tracing::info!(metrics = slots.len(), "probe block ready");

        Ok(Self {
            metrics,
            slots,
            ticks: 0,
        })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance every non-constant metric once: counters count up by one,
    /// gauges take a synthetic value. Write-once slots are filled on the
    /// first tick only.
    pub fn tick(&mut self) -> Result<()> {
        self.ticks += 1;
        for (slot, info) in &self.slots {
            if info.kind == Kind::Constant || (info.is_constant && self.ticks > 1) {
                continue;
            }
            match info.category {
                Category::Counter => self.metrics.increment(*slot, one(info.kind)?)?,
                Category::Gauge => self.metrics.set(*slot, synthetic(info, self.ticks)?)?,
            }
        }
        Ok(())
    }

    /// JSON snapshot read back through a `View` over the live block.
    pub fn snapshot(&self) -> Result<String> {
        let block = self.metrics.block().ok_or(Error::NotSealed)?;
        let view = View::open(block)?;
        Ok(to_json(&view))
    }
}

fn one(kind: Kind) -> Result<Value> {
    match kind {
        Kind::Float32 => Ok(Value::Float32(1.0)),
        Kind::Float64 => Ok(Value::Float64(1.0)),
        Kind::Int32 => Ok(Value::Int32(1)),
        Kind::Int64 => Ok(Value::Int64(1)),
        Kind::Uint32 => Ok(Value::Uint32(1)),
        Kind::Uint64 => Ok(Value::Uint64(1)),
        other => Err(Error::KindMismatch {
            expected: other,
            found: None,
        }),
    }
}

fn synthetic(info: &MetricInfo, tick: u64) -> Result<Value> {
    let phase = (tick % 100) as f64 / 100.0;
    match info.kind {
        Kind::Boolean => Ok(Value::Boolean(tick % 2 == 1)),
        Kind::Enum8 => {
            // Cycle through labelled values when there are any.
            let labels = info.enum_labels.len().max(1);
            let value = info
                .enum_labels
                .keys()
                .nth((tick as usize) % labels)
                .copied()
                .unwrap_or((tick % 256) as u8);
            Ok(Value::Enum8(value))
        }
        Kind::Float32 => Ok(Value::Float32(phase as f32)),
        Kind::Float64 => Ok(Value::Float64(phase)),
        Kind::Int32 => Ok(Value::Int32(tick as i32)),
        Kind::Int64 => Ok(Value::Int64(tick as i64)),
        Kind::Uint32 => Ok(Value::Uint32(tick as u32)),
        Kind::Uint64 => Ok(Value::Uint64(tick)),
        Kind::Constant => Err(Error::ConstantAlreadySet(info.name.clone())),
    }
}
