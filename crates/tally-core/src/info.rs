//! Metric schema: name, description, unit, kind, constant flag, category
//! and optional bounds.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::kind::{Kind, Value};

/// Longest string the metadata encoding can carry (u16 length prefix).
pub const MAX_FIELD_BYTES: usize = u16::MAX as usize;

/// Label attached to one Enum8 value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumLabel {
    pub name: String,
    pub description: String,
}

/// How a numeric metric evolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Category {
    /// Goes up and down.
    #[default]
    Gauge,
    /// Only accumulates until reset.
    Counter,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Gauge => "gauge",
            Category::Counter => "counter",
        }
    }
}

/// Describes one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricInfo {
    /// Short identifier, unique within a block.
    pub name: String,
    /// Human-readable text.
    pub description: String,
    /// Physical unit, may be empty.
    pub unit: String,
    pub kind: Kind,
    /// Written once and never updated afterwards.
    pub is_constant: bool,
    /// Labels for Enum8 values, ordered by value.
    pub enum_labels: BTreeMap<u8, EnumLabel>,
    /// Value of a `Kind::Constant` metric.
    pub constant_value: Option<Value>,
    /// Counter or gauge. Counters must be numeric and not write-once.
    pub category: Category,
    /// Lowest expected value, same kind as the metric.
    pub min: Option<Value>,
    /// Highest expected value, same kind as the metric.
    pub max: Option<Value>,
}

impl MetricInfo {
    /// New metric with an empty unit.
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: String::new(),
            kind,
            is_constant: kind == Kind::Constant,
            enum_labels: BTreeMap::new(),
            constant_value: None,
            category: Category::Gauge,
            min: None,
            max: None,
        }
    }

    /// New `Kind::Constant` metric carrying its value in the metadata.
    pub fn constant_value(
        name: impl Into<String>,
        description: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let mut info = Self::new(name, description, Kind::Constant);
        info.constant_value = Some(value.into());
        info
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Mark the slot as write-once.
    pub fn constant(mut self) -> Self {
        self.is_constant = true;
        self
    }

    /// Mark the metric as a counter.
    pub fn counter(mut self) -> Self {
        self.category = Category::Counter;
        self
    }

    pub fn with_min(mut self, min: impl Into<Value>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn with_max(mut self, max: impl Into<Value>) -> Self {
        self.max = Some(max.into());
        self
    }

    /// Attach a label to an Enum8 value.
    pub fn with_label(
        mut self,
        value: u8,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.enum_labels.insert(
            value,
            EnumLabel {
                name: name.into(),
                description: description.into(),
            },
        );
        self
    }

    /// Label for an Enum8 value, if one is attached.
    pub fn label(&self, value: u8) -> Option<&EnumLabel> {
        self.enum_labels.get(&value)
    }

    /// Check the definition can be encoded and is self-consistent.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidDefinition("metric name must not be empty".into()));
        }
        check_len("name", &self.name)?;
        check_len("description", &self.description)?;
        check_len("unit", &self.unit)?;

        if !self.enum_labels.is_empty() {
            if self.kind != Kind::Enum8 {
                return Err(Error::InvalidDefinition(format!(
                    "{}: labels are only allowed on enum8 metrics",
                    self.name
                )));
            }
            for label in self.enum_labels.values() {
                check_len("label name", &label.name)?;
                check_len("label description", &label.description)?;
            }
        }

        if let Some(problem) = self.shape_problem() {
            return Err(Error::InvalidDefinition(format!("{}: {problem}", self.name)));
        }

        match (self.kind, &self.constant_value) {
            (Kind::Constant, None) => Err(Error::InvalidDefinition(format!(
                "{}: constant metric needs a value",
                self.name
            ))),
            (Kind::Constant, Some(Value::Text(text))) => check_len("constant text", text),
            (Kind::Constant, Some(_)) if !self.is_constant => Err(Error::InvalidDefinition(
                format!("{}: constant kind must carry the constant flag", self.name),
            )),
            (Kind::Constant, Some(_)) => Ok(()),
            (_, Some(_)) => Err(Error::InvalidDefinition(format!(
                "{}: only constant metrics carry a definition value",
                self.name
            ))),
            (_, None) => Ok(()),
        }
    }

    /// Category and bound rules, shared by `validate` and the metadata parser.
    pub(crate) fn shape_problem(&self) -> Option<String> {
        let numeric = self.kind.is_numeric();
        if self.category == Category::Counter && (!numeric || self.is_constant) {
            return Some(format!("{} metric cannot be a counter", self.kind.as_str()));
        }
        for (which, bound) in [("min", &self.min), ("max", &self.max)] {
            let Some(bound) = bound else { continue };
            if !numeric {
                return Some(format!("{which} is only allowed on numeric metrics"));
            }
            if bound.kind() != Some(self.kind) {
                return Some(format!("{which} must be a {} value", self.kind.as_str()));
            }
            if is_nan(bound) {
                return Some(format!("{which} must not be NaN"));
            }
        }
        if let (Some(min), Some(max)) = (&self.min, &self.max) {
            if !at_most(min, max) {
                return Some("min is greater than max".into());
            }
        }
        None
    }
}

fn is_nan(v: &Value) -> bool {
    match *v {
        Value::Float32(f) => f.is_nan(),
        Value::Float64(f) => f.is_nan(),
        _ => false,
    }
}

/// `a <= b` for two values of the same numeric kind.
fn at_most(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float32(a), Value::Float32(b)) => a <= b,
        (Value::Float64(a), Value::Float64(b)) => a <= b,
        (Value::Int32(a), Value::Int32(b)) => a <= b,
        (Value::Int64(a), Value::Int64(b)) => a <= b,
        (Value::Uint32(a), Value::Uint32(b)) => a <= b,
        (Value::Uint64(a), Value::Uint64(b)) => a <= b,
        _ => false,
    }
}

fn check_len(field: &str, s: &str) -> Result<()> {
    if s.len() > MAX_FIELD_BYTES {
        return Err(Error::InvalidDefinition(format!(
            "{field} is {} bytes, at most {MAX_FIELD_BYTES} allowed",
            s.len()
        )));
    }
    Ok(())
}
