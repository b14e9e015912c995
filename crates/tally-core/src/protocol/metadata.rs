//! Metadata section codec.
//!
//! Record layout (little-endian):
//! - `u16` length + name, description and unit bytes (UTF-8)
//! - `u8` kind code, `u8` flags (bit 0: constant, bit 1: counter, bit 2: has
//!   min, bit 3: has max)
//! - min then max when flagged, each in the metric kind's width
//! - Enum8 only: `u16` label count, then `u8` value + name + description
//! - Constant only: `u8` value tag + fixed-width scalar or length-prefixed text
//!
//! `parse_metadata` treats its input as hostile: every length is checked
//! against `remaining()` before use and the output is bounded by the buffer.

use std::collections::{BTreeMap, HashSet};

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};
use crate::info::{Category, EnumLabel, MetricInfo, MAX_FIELD_BYTES};
use crate::kind::{Kind, Value, TEXT_TAG};

/// Flag bit: the metric is write-once.
const FLAG_CONSTANT: u8 = 0x01;
/// Flag bit: the metric is a counter.
const FLAG_COUNTER: u8 = 0x02;
/// Flag bit: a min bound follows the flags.
const FLAG_MIN: u8 = 0x04;
/// Flag bit: a max bound follows the min.
const FLAG_MAX: u8 = 0x08;
const KNOWN_FLAGS: u8 = FLAG_CONSTANT | FLAG_COUNTER | FLAG_MIN | FLAG_MAX;

/// Smallest possible record: three empty strings, kind and flags.
const MIN_RECORD_LEN: usize = 3 * 2 + 2;

/// Encode `infos` into a metadata section.
///
/// Every definition is validated first, so a field that does not fit its
/// length prefix is rejected with `InvalidDefinition` instead of being
/// written with a wrapped length.
pub fn encode_metadata(infos: &[MetricInfo]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(infos.iter().map(encoded_len).sum());
    for info in infos {
        info.validate()?;
        put_str(&mut out, &info.name)?;
        put_str(&mut out, &info.description)?;
        put_str(&mut out, &info.unit)?;
        out.put_u8(info.kind.code());
        out.put_u8(flags(info));
        for bound in [&info.min, &info.max].into_iter().flatten() {
            put_scalar(&mut out, bound)?;
        }

        match info.kind {
            Kind::Enum8 => {
                let count = u16::try_from(info.enum_labels.len()).map_err(|_| {
                    Error::InvalidDefinition(format!("{}: too many labels", info.name))
                })?;
                out.put_u16_le(count);
                for (value, label) in &info.enum_labels {
                    out.put_u8(*value);
                    put_str(&mut out, &label.name)?;
                    put_str(&mut out, &label.description)?;
                }
            }
            Kind::Constant => match &info.constant_value {
                Some(Value::Text(text)) => {
                    out.put_u8(TEXT_TAG);
                    put_str(&mut out, text)?;
                }
                Some(value) => {
                    let kind = value.kind().ok_or_else(|| unencodable(info))?;
                    out.put_u8(kind.code());
                    put_scalar(&mut out, value)?;
                }
                None => return Err(unencodable(info)),
            },
            _ => {}
        }
    }
    Ok(out)
}

fn flags(info: &MetricInfo) -> u8 {
    let mut flags = 0;
    if info.is_constant {
        flags |= FLAG_CONSTANT;
    }
    if info.category == Category::Counter {
        flags |= FLAG_COUNTER;
    }
    if info.min.is_some() {
        flags |= FLAG_MIN;
    }
    if info.max.is_some() {
        flags |= FLAG_MAX;
    }
    flags
}

fn unencodable(info: &MetricInfo) -> Error {
    Error::InvalidDefinition(format!("{}: constant value cannot be encoded", info.name))
}

/// Encoded size of one record.
pub(crate) fn encoded_len(info: &MetricInfo) -> usize {
    let bounds = [&info.min, &info.max].into_iter().flatten().count() * info.kind.width();
    let base = MIN_RECORD_LEN + info.name.len() + info.description.len() + info.unit.len() + bounds;
    let extra = match info.kind {
        Kind::Enum8 => {
            2 + info
                .enum_labels
                .values()
                .map(|l| 1 + 4 + l.name.len() + l.description.len())
                .sum::<usize>()
        }
        Kind::Constant => match &info.constant_value {
            Some(Value::Text(text)) => 1 + 2 + text.len(),
            Some(value) => 1 + value.kind().map_or(0, Kind::width),
            None => 0,
        },
        _ => 0,
    };
    base + extra
}

/// Decode `declared_count` records that must exactly fill `bytes`.
pub fn parse_metadata(bytes: &[u8], declared_count: usize) -> Result<Vec<MetricInfo>> {
    if declared_count > bytes.len() / MIN_RECORD_LEN {
        return Err(Error::Malformed(format!(
            "{declared_count} metrics cannot fit in {} metadata bytes",
            bytes.len()
        )));
    }

    let mut buf = bytes;
    let mut infos = Vec::with_capacity(declared_count);
    let mut names = HashSet::with_capacity(declared_count);

    for _ in 0..declared_count {
        let info = decode_record(&mut buf)?;
        if !names.insert(info.name.clone()) {
            return Err(Error::Malformed(format!("duplicate metric name {}", info.name)));
        }
        infos.push(info);
    }

    if buf.has_remaining() {
        return Err(Error::SizeMismatch {
            declared: bytes.len(),
            consumed: bytes.len() - buf.remaining(),
        });
    }

    Ok(infos)
}

fn decode_record(buf: &mut &[u8]) -> Result<MetricInfo> {
    let name = get_str(buf, "name")?;
    if name.is_empty() {
        return Err(Error::Malformed("empty metric name".into()));
    }
    let description = get_str(buf, "description")?;
    let unit = get_str(buf, "unit")?;

    if buf.remaining() < 2 {
        return Err(Error::Malformed(format!("{name}: record ends before kind")));
    }
    let kind = Kind::from_code(buf.get_u8())?;
    let flags = buf.get_u8();
    if flags & !KNOWN_FLAGS != 0 {
        return Err(Error::Malformed(format!("{name}: unknown flags {flags:#04x}")));
    }
    let is_constant = flags & FLAG_CONSTANT != 0;
    if kind == Kind::Constant && !is_constant {
        return Err(Error::Malformed(format!("{name}: constant kind without flag")));
    }
    let category = if flags & FLAG_COUNTER != 0 {
        Category::Counter
    } else {
        Category::Gauge
    };
    let min = get_bound(buf, flags & FLAG_MIN != 0, kind, &name)?;
    let max = get_bound(buf, flags & FLAG_MAX != 0, kind, &name)?;

    let mut enum_labels = BTreeMap::new();
    let mut constant_value = None;
    match kind {
        Kind::Enum8 => {
            if buf.remaining() < 2 {
                return Err(Error::Malformed(format!("{name}: missing label count")));
            }
            let count = buf.get_u16_le();
            for _ in 0..count {
                if !buf.has_remaining() {
                    return Err(Error::Malformed(format!("{name}: label list ends early")));
                }
                let value = buf.get_u8();
                let label = EnumLabel {
                    name: get_str(buf, "label name")?,
                    description: get_str(buf, "label description")?,
                };
                if enum_labels.insert(value, label).is_some() {
                    return Err(Error::Malformed(format!("{name}: duplicate label {value}")));
                }
            }
        }
        Kind::Constant => constant_value = Some(decode_constant(buf, &name)?),
        _ => {}
    }

    let info = MetricInfo {
        name,
        description,
        unit,
        kind,
        is_constant,
        enum_labels,
        constant_value,
        category,
        min,
        max,
    };
    if let Some(problem) = info.shape_problem() {
        return Err(Error::Malformed(format!("{}: {problem}", info.name)));
    }
    Ok(info)
}

fn get_bound(buf: &mut &[u8], present: bool, kind: Kind, name: &str) -> Result<Option<Value>> {
    if !present {
        return Ok(None);
    }
    if !kind.is_numeric() {
        return Err(Error::Malformed(format!("{name}: bound on {} metric", kind.as_str())));
    }
    let width = kind.width();
    if buf.remaining() < width {
        return Err(Error::Malformed(format!("{name}: bound ends early")));
    }
    Value::from_bits(kind, buf.get_uint_le(width))
        .map(Some)
        .ok_or_else(|| Error::Malformed(format!("{name}: unreadable bound")))
}

fn decode_constant(buf: &mut &[u8], name: &str) -> Result<Value> {
    if !buf.has_remaining() {
        return Err(Error::Malformed(format!("{name}: missing constant value")));
    }
    let tag = buf.get_u8();
    if tag == TEXT_TAG {
        return Ok(Value::Text(get_str(buf, "constant text")?));
    }

    let kind = Kind::from_code(tag)?;
    if kind == Kind::Constant {
        return Err(Error::Malformed(format!("{name}: nested constant value")));
    }
    let width = kind.width();
    if buf.remaining() < width {
        return Err(Error::Malformed(format!("{name}: constant value ends early")));
    }
    let bits = buf.get_uint_le(width);
    if kind == Kind::Boolean && bits > 1 {
        return Err(Error::Malformed(format!("{name}: boolean constant {bits}")));
    }
    Value::from_bits(kind, bits)
        .ok_or_else(|| Error::Malformed(format!("{name}: unreadable constant value")))
}

fn put_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| {
        Error::InvalidDefinition(format!(
            "field is {} bytes, at most {MAX_FIELD_BYTES} allowed",
            s.len()
        ))
    })?;
    out.put_u16_le(len);
    out.put_slice(s.as_bytes());
    Ok(())
}

/// Fixed-width little-endian scalar.
fn put_scalar(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match (value.kind(), value.to_bits()) {
        (Some(kind), Some(bits)) => {
            out.put_uint_le(bits, kind.width());
            Ok(())
        }
        _ => Err(Error::InvalidDefinition("text is not a scalar".into())),
    }
}

fn get_str(buf: &mut &[u8], field: &str) -> Result<String> {
    if buf.remaining() < 2 {
        return Err(Error::Malformed(format!("{field} length prefix missing")));
    }
    let len = usize::from(buf.get_u16_le());
    if buf.remaining() < len {
        return Err(Error::Malformed(format!(
            "{field} claims {len} bytes, {} remain",
            buf.remaining()
        )));
    }
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec())
        .map_err(|_| Error::Malformed(format!("{field} is not valid UTF-8")))
}
