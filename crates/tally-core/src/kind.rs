//! Metric kinds and typed values.
//!
//! `Kind` is a closed set; its wire code, slot width and JSON name are all
//! selected by a single match so no open-ended dispatch exists anywhere.

use crate::error::{Error, Result};

/// Type tag of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Boolean,
    Enum8,
    Float32,
    Float64,
    Int32,
    Int64,
    Uint32,
    Uint64,
    /// Value fixed at definition and stored beside the metadata.
    Constant,
}

/// Wire tag for a text constant (only valid inside a constant payload).
pub(crate) const TEXT_TAG: u8 = 9;

impl Kind {
    /// All kinds, ordered by wire code.
    pub const ALL: [Kind; 9] = [
        Kind::Boolean,
        Kind::Enum8,
        Kind::Float32,
        Kind::Float64,
        Kind::Int32,
        Kind::Int64,
        Kind::Uint32,
        Kind::Uint64,
        Kind::Constant,
    ];

    /// Wire code.
    pub fn code(self) -> u8 {
        match self {
            Kind::Boolean => 0,
            Kind::Enum8 => 1,
            Kind::Float32 => 2,
            Kind::Float64 => 3,
            Kind::Int32 => 4,
            Kind::Int64 => 5,
            Kind::Uint32 => 6,
            Kind::Uint64 => 7,
            Kind::Constant => 8,
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: u8) -> Result<Kind> {
        Kind::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(Error::UnknownKind(code))
    }

    /// Bytes occupied in the value section. Constants live in the metadata.
    pub fn width(self) -> usize {
        match self {
            Kind::Boolean | Kind::Enum8 => 1,
            Kind::Float32 | Kind::Int32 | Kind::Uint32 => 4,
            Kind::Float64 | Kind::Int64 | Kind::Uint64 => 8,
            Kind::Constant => 0,
        }
    }

    /// Lowercase name used in JSON and config.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Boolean => "boolean",
            Kind::Enum8 => "enum8",
            Kind::Float32 => "float32",
            Kind::Float64 => "float64",
            Kind::Int32 => "int32",
            Kind::Int64 => "int64",
            Kind::Uint32 => "uint32",
            Kind::Uint64 => "uint64",
            Kind::Constant => "constant",
        }
    }

    /// Whether `increment` is defined for this kind.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Kind::Boolean | Kind::Enum8 | Kind::Constant)
    }
}

/// A typed metric value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Enum8(u8),
    Float32(f32),
    Float64(f64),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    /// Only valid as the value of a `Kind::Constant` metric.
    Text(String),
}

impl Value {
    /// Scalar kind of this value; `None` for text.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Boolean(_) => Some(Kind::Boolean),
            Value::Enum8(_) => Some(Kind::Enum8),
            Value::Float32(_) => Some(Kind::Float32),
            Value::Float64(_) => Some(Kind::Float64),
            Value::Int32(_) => Some(Kind::Int32),
            Value::Int64(_) => Some(Kind::Int64),
            Value::Uint32(_) => Some(Kind::Uint32),
            Value::Uint64(_) => Some(Kind::Uint64),
            Value::Text(_) => None,
        }
    }

    /// Raw slot bits, zero-extended to 64 bits.
    pub(crate) fn to_bits(&self) -> Option<u64> {
        match *self {
            Value::Boolean(v) => Some(u64::from(v)),
            Value::Enum8(v) => Some(u64::from(v)),
            Value::Float32(v) => Some(u64::from(v.to_bits())),
            Value::Float64(v) => Some(v.to_bits()),
            Value::Int32(v) => Some(u64::from(v as u32)),
            Value::Int64(v) => Some(v as u64),
            Value::Uint32(v) => Some(u64::from(v)),
            Value::Uint64(v) => Some(v),
            Value::Text(_) => None,
        }
    }

    /// Rebuild a value of `kind` from raw slot bits.
    pub(crate) fn from_bits(kind: Kind, bits: u64) -> Option<Value> {
        match kind {
            Kind::Boolean => Some(Value::Boolean(bits & 0xff != 0)),
            Kind::Enum8 => Some(Value::Enum8(bits as u8)),
            Kind::Float32 => Some(Value::Float32(f32::from_bits(bits as u32))),
            Kind::Float64 => Some(Value::Float64(f64::from_bits(bits))),
            Kind::Int32 => Some(Value::Int32(bits as u32 as i32)),
            Kind::Int64 => Some(Value::Int64(bits as i64)),
            Kind::Uint32 => Some(Value::Uint32(bits as u32)),
            Kind::Uint64 => Some(Value::Uint64(bits)),
            Kind::Constant => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Enum8(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
