//! JSON projection tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use tally_core::{to_json, to_json_slim, Kind, MetricInfo, Metrics, View};

fn metrics() -> Metrics {
    let mut m = Metrics::new(8);
    // Defined out of alphabetical order on purpose.
    let z = m.define("zeta", "Last letter", "", Kind::Int32).unwrap();
    let a = m.define("alpha", "First letter", "", Kind::Float64).unwrap();
    let mode = m
        .define_info(
            MetricInfo::new("mode", "Mode", Kind::Enum8)
                .with_label(0, "idle", "")
                .with_label(2, "busy", ""),
        )
        .unwrap();
    m.define("unset", "Never written", "", Kind::Boolean).unwrap();
    m.define_info(MetricInfo::constant_value("host", "Host name", "edge-1"))
        .unwrap();
    m.seal().unwrap();

    m.set(z, -7i32).unwrap();
    m.set(a, 1.25f64).unwrap();
    m.set(mode, 2u8).unwrap();
    m
}

#[test]
fn keys_follow_definition_order() {
    let m = metrics();
    assert_eq!(
        to_json_slim(&m),
        r#"{"zeta":-7,"alpha":1.25,"mode":2,"unset":null,"host":"edge-1"}"#
    );
}

#[test]
fn full_document_shape() {
    let m = metrics();
    let doc: serde_json::Value = serde_json::from_str(&to_json(&m)).unwrap();

    assert_eq!(doc["zeta"]["description"], "Last letter");
    assert_eq!(doc["zeta"]["unit"], "");
    assert_eq!(doc["zeta"]["kind"], "int32");
    assert_eq!(doc["zeta"]["value"], -7);
    // Enum8 stays numeric even with labels attached.
    assert_eq!(doc["mode"]["value"], 2);
    assert_eq!(doc["mode"]["kind"], "enum8");
    assert!(doc["unset"]["value"].is_null());
    assert_eq!(doc["host"]["kind"], "constant");
    assert_eq!(doc["host"]["value"], "edge-1");
}

#[test]
fn output_is_stable_across_calls_and_sources() {
    let m = metrics();
    let view = View::open(m.block().unwrap()).unwrap();

    let first = to_json(&m);
    assert_eq!(first, to_json(&m));
    assert_eq!(first, to_json(&view));
    assert_eq!(to_json_slim(&m), to_json_slim(&view));
}

#[test]
fn non_finite_floats_render_as_null() {
    let mut m = Metrics::new(1);
    let x = m.define("x", "", "", Kind::Float32).unwrap();
    m.seal().unwrap();
    m.set(x, f32::NAN).unwrap();
    assert_eq!(to_json_slim(&m), r#"{"x":null}"#);
}

#[test]
fn unsealed_producer_reports_nulls() {
    let mut m = Metrics::new(1);
    m.define("x", "", "", Kind::Uint64).unwrap();
    assert_eq!(to_json_slim(&m), r#"{"x":null}"#);
}

#[test]
fn counters_and_bounds_appear_only_when_declared() {
    let mut m = Metrics::new(2);
    let sent = m
        .define_info(MetricInfo::new("sent", "", Kind::Uint64).counter().with_max(100u64))
        .unwrap();
    m.define_info(MetricInfo::new("load", "", Kind::Float64).with_min(-1.0f64))
        .unwrap();
    m.seal().unwrap();
    m.increment(sent, 5u64).unwrap();

    assert_eq!(
        to_json(&View::open(m.block().unwrap()).unwrap()),
        r#"{"sent":{"description":"","unit":"","kind":"uint64","category":"counter","max":100,"value":5},"load":{"description":"","unit":"","kind":"float64","min":-1.0,"value":null}}"#
    );
}
