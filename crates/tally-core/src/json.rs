//! JSON projection of metadata and current values.
//!
//! Keys follow metadata order (serde_json `preserve_order`), so the same
//! metadata and values always serialize to the same bytes. Enum8 values are
//! written as the raw stored byte; labels never replace the number.
//!
//! Full entries carry `category` only for counters and `min`/`max` only when
//! the metric declares them, so plain gauges keep the four-key shape.

use serde_json::{Map, Value as Json};

use crate::info::{Category, MetricInfo};
use crate::kind::Value;

/// Read access to metrics in metadata order. Implemented by both the
/// producer (`Metrics`) and the consumer (`View`).
pub trait MetricSource {
    /// Metric descriptions in metadata order.
    fn infos(&self) -> &[MetricInfo];

    /// Current value of metric `index`; `None` while unset.
    fn value(&self, index: usize) -> Option<Value>;
}

/// `{"name": {"description", "unit", "kind", ["category", "min", "max",] "value"}, ...}`
pub fn to_json<S: MetricSource + ?Sized>(source: &S) -> String {
    let mut root = Map::new();
    for (index, info) in source.infos().iter().enumerate() {
        let mut entry = Map::new();
        entry.insert("description".into(), Json::from(info.description.as_str()));
        entry.insert("unit".into(), Json::from(info.unit.as_str()));
        entry.insert("kind".into(), Json::from(info.kind.as_str()));
        if info.category == Category::Counter {
            entry.insert("category".into(), Json::from(info.category.as_str()));
        }
        if let Some(min) = &info.min {
            entry.insert("min".into(), value_to_json(Some(min.clone())));
        }
        if let Some(max) = &info.max {
            entry.insert("max".into(), value_to_json(Some(max.clone())));
        }
        entry.insert("value".into(), value_to_json(source.value(index)));
        root.insert(info.name.clone(), Json::Object(entry));
    }
    Json::Object(root).to_string()
}

/// `{"name": value, ...}`
pub fn to_json_slim<S: MetricSource + ?Sized>(source: &S) -> String {
    let root: Map<String, Json> = source
        .infos()
        .iter()
        .enumerate()
        .map(|(index, info)| (info.name.clone(), value_to_json(source.value(index))))
        .collect();
    Json::Object(root).to_string()
}

fn value_to_json(value: Option<Value>) -> Json {
    match value {
        None => Json::Null,
        Some(Value::Boolean(v)) => Json::Bool(v),
        Some(Value::Enum8(v)) => Json::from(v),
        // Non-finite floats become null.
        Some(Value::Float32(v)) => Json::from(f64::from(v)),
        Some(Value::Float64(v)) => Json::from(v),
        Some(Value::Int32(v)) => Json::from(v),
        Some(Value::Int64(v)) => Json::from(v),
        Some(Value::Uint32(v)) => Json::from(v),
        Some(Value::Uint64(v)) => Json::from(v),
        Some(Value::Text(v)) => Json::String(v),
    }
}
