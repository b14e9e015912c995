#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use tally_core::{Category, ErrorCode, Kind, Value};
use tally_probe::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
probe:
  publish_interval_ms: 500
metrics:
  - name: "rx"
    kind: uint64
    unitz: bytes # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "INVALID_DEFINITION");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
metrics:
  - name: "rx"
    kind: uint64
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.probe.publish_interval_ms, 1000);
    assert_eq!(cfg.metrics[0].name, "rx");

    let infos = cfg.to_infos().unwrap();
    assert_eq!(infos[0].kind, Kind::Uint64);
    assert!(infos[0].unit.is_empty());
}

#[test]
fn rejects_inconsistent_definitions() {
    let cases = [
        (
            "version: 2\nmetrics:\n  - { name: a, kind: uint64 }\n",
            ErrorCode::VersionMismatch,
        ),
        ("version: 1\nmetrics: []\n", ErrorCode::InvalidDefinition),
        (
            "version: 1\nmetrics:\n  - { name: a, kind: uint64 }\n  - { name: a, kind: boolean }\n",
            ErrorCode::DuplicateName,
        ),
        (
            "version: 1\nprobe: { max_metrics: 1 }\nmetrics:\n  - { name: a, kind: uint64 }\n  - { name: b, kind: boolean }\n",
            ErrorCode::CapacityExceeded,
        ),
        (
            "version: 1\nmetrics:\n  - { name: a, kind: uint64, labels: { 0: zero } }\n",
            ErrorCode::InvalidDefinition,
        ),
        (
            "version: 1\nmetrics:\n  - { name: a, kind: constant }\n",
            ErrorCode::InvalidDefinition,
        ),
        (
            "version: 1\nmetrics:\n  - { name: a, kind: boolean, counter: true }\n",
            ErrorCode::InvalidDefinition,
        ),
        (
            "version: 1\nmetrics:\n  - { name: a, kind: uint32, min: -1 }\n",
            ErrorCode::InvalidDefinition,
        ),
        (
            "version: 1\nmetrics:\n  - { name: a, kind: int64, min: 10, max: 2 }\n",
            ErrorCode::InvalidDefinition,
        ),
        (
            "version: 1\nprobe: { publish_interval_ms: 5 }\nmetrics:\n  - { name: a, kind: uint64 }\n",
            ErrorCode::InvalidDefinition,
        ),
    ];

    for (yaml, code) in cases {
        let err = config::load_from_str(yaml).expect_err(yaml);
        assert_eq!(err.code(), code, "yaml={yaml}");
    }
}

#[test]
fn constant_values_and_labels() {
    let ok = r#"
version: 1
metrics:
  - name: mode
    kind: enum8
    labels: { 0: idle, 2: busy }
  - name: build
    kind: constant
    value: "v1"
  - name: offset
    kind: constant
    value: -3
"#;
    let infos = config::load_from_str(ok).unwrap().to_infos().unwrap();
    assert_eq!(infos[0].label(2).unwrap().name, "busy");
    assert_eq!(infos[1].constant_value, Some(Value::Text("v1".into())));
    assert_eq!(infos[2].constant_value, Some(Value::Int64(-3)));
    assert!(infos[2].is_constant);
}

#[test]
fn counters_and_bounds() {
    let ok = r#"
version: 1
metrics:
  - { name: sent, kind: uint64, counter: true, max: 1000000 }
  - { name: load, kind: float32, min: 0, max: 1.5 }
  - { name: temp, kind: int32, min: -40 }
"#;
    let infos = config::load_from_str(ok).unwrap().to_infos().unwrap();
    assert_eq!(infos[0].category, Category::Counter);
    assert_eq!(infos[0].max, Some(Value::Uint64(1_000_000)));
    assert_eq!(infos[1].category, Category::Gauge);
    assert_eq!(infos[1].min, Some(Value::Float32(0.0)));
    assert_eq!(infos[1].max, Some(Value::Float32(1.5)));
    assert_eq!(infos[2].min, Some(Value::Int32(-40)));
    assert_eq!(infos[2].max, None);
}

#[test]
fn bundled_config_loads() {
    let cfg = config::load_from_file("tally.yaml").expect("bundled config must load");
    assert_eq!(cfg.metrics.len(), 6);
}
