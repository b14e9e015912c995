use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use tally_core::error::{Error, Result};
use tally_core::{Kind, MetricInfo, Value};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    pub version: u32,

    #[serde(default)]
    pub probe: ProbeSection,

    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(Error::VersionMismatch {
                expected: 1,
                found: self.version,
            });
        }
        if self.metrics.is_empty() {
            return Err(Error::InvalidDefinition("metrics must not be empty".into()));
        }

        self.probe.validate()?;
        if self.metrics.len() > self.probe.max_metrics {
            return Err(Error::CapacityExceeded {
                max: self.probe.max_metrics,
            });
        }

        let mut names = HashSet::new();
        for m in &self.metrics {
            if !names.insert(m.name.as_str()) {
                return Err(Error::DuplicateName(m.name.clone()));
            }
            m.validate()?;
        }
        Ok(())
    }

    /// Metric definitions in config order.
    pub fn to_infos(&self) -> Result<Vec<MetricInfo>> {
        self.metrics.iter().map(MetricConfig::to_info).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeSection {
    #[serde(default = "default_max_metrics")]
    pub max_metrics: usize,

    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            max_metrics: default_max_metrics(),
            publish_interval_ms: default_publish_interval_ms(),
        }
    }
}

impl ProbeSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60000).contains(&self.publish_interval_ms) {
            return Err(Error::InvalidDefinition(
                "probe.publish_interval_ms must be between 100 and 60000".into(),
            ));
        }
        if self.max_metrics == 0 {
            return Err(Error::InvalidDefinition(
                "probe.max_metrics must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_metrics() -> usize {
    64
}
fn default_publish_interval_ms() -> u64 {
    1000
}

/// Kind names as written in config files.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KindName {
    Boolean,
    Enum8,
    Float32,
    Float64,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Constant,
}

impl From<KindName> for Kind {
    fn from(k: KindName) -> Self {
        match k {
            KindName::Boolean => Kind::Boolean,
            KindName::Enum8 => Kind::Enum8,
            KindName::Float32 => Kind::Float32,
            KindName::Float64 => Kind::Float64,
            KindName::Int32 => Kind::Int32,
            KindName::Int64 => Kind::Int64,
            KindName::Uint32 => Kind::Uint32,
            KindName::Uint64 => Kind::Uint64,
            KindName::Constant => Kind::Constant,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub unit: String,
    pub kind: KindName,
    /// Write-once slot.
    #[serde(default)]
    pub constant: bool,
    /// Enum8 value labels.
    #[serde(default)]
    pub labels: BTreeMap<u8, String>,
    /// Value of a `constant` kind metric.
    #[serde(default)]
    pub value: Option<serde_yaml::Value>,
    /// Counts up from zero instead of moving freely.
    #[serde(default)]
    pub counter: bool,
    /// Lowest expected value, in the metric's kind.
    #[serde(default)]
    pub min: Option<serde_yaml::Number>,
    /// Highest expected value, in the metric's kind.
    #[serde(default)]
    pub max: Option<serde_yaml::Number>,
}

impl MetricConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.labels.is_empty() && self.kind != KindName::Enum8 {
            return Err(Error::InvalidDefinition(format!(
                "{}: labels are only allowed on enum8 metrics",
                self.name
            )));
        }
        match (self.kind, &self.value) {
            (KindName::Constant, None) => {
                return Err(Error::InvalidDefinition(format!(
                    "{}: constant metrics need a value",
                    self.name
                )))
            }
            (KindName::Constant, Some(_)) | (_, None) => {}
            (_, Some(_)) => {
                return Err(Error::InvalidDefinition(format!(
                    "{}: value is only allowed on constant metrics",
                    self.name
                )))
            }
        }
        // Bounds and category are only checkable once converted to the kind.
        self.to_info().map(drop)
    }

    pub fn to_info(&self) -> Result<MetricInfo> {
        let kind = Kind::from(self.kind);
        let mut info = match &self.value {
            Some(v) => MetricInfo::constant_value(
                self.name.clone(),
                self.description.clone(),
                yaml_to_value(&self.name, v)?,
            ),
            None => MetricInfo::new(self.name.clone(), self.description.clone(), kind),
        }
        .with_unit(self.unit.clone());

        if self.constant {
            info = info.constant();
        }
        if self.counter {
            info = info.counter();
        }
        if let Some(n) = &self.min {
            info.min = Some(number_as(&self.name, kind, n)?);
        }
        if let Some(n) = &self.max {
            info.max = Some(number_as(&self.name, kind, n)?);
        }
        for (value, label) in &self.labels {
            info = info.with_label(*value, label.clone(), "");
        }
        info.validate()?;
        Ok(info)
    }
}

fn yaml_to_value(name: &str, v: &serde_yaml::Value) -> Result<Value> {
    match v {
        serde_yaml::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_yaml::Value::String(s) => Ok(Value::Text(s.clone())),
        serde_yaml::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Ok(Value::Uint64(u))
            } else if let Some(i) = n.as_i64() {
                Ok(Value::Int64(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float64(f))
            } else {
                Err(Error::InvalidDefinition(format!("{name}: unsupported number")))
            }
        }
        _ => Err(Error::InvalidDefinition(format!(
            "{name}: constant value must be a bool, number or string"
        ))),
    }
}

/// Convert a bound to the metric's own kind, refusing lossy conversions.
fn number_as(name: &str, kind: Kind, n: &serde_yaml::Number) -> Result<Value> {
    let value = match kind {
        Kind::Float32 => n.as_f64().map(|f| Value::Float32(f as f32)),
        Kind::Float64 => n.as_f64().map(Value::Float64),
        Kind::Int32 => n.as_i64().and_then(|i| i32::try_from(i).ok()).map(Value::Int32),
        Kind::Int64 => n.as_i64().map(Value::Int64),
        Kind::Uint32 => n.as_u64().and_then(|u| u32::try_from(u).ok()).map(Value::Uint32),
        Kind::Uint64 => n.as_u64().map(Value::Uint64),
        _ => None,
    };
    value.ok_or_else(|| {
        Error::InvalidDefinition(format!("{name}: bound {n} does not fit a {} metric", kind.as_str()))
    })
}
