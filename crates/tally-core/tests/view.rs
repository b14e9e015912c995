//! Consumer tests: producer and view over the same block.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tally_core::protocol::header::HEADER_LEN;
use tally_core::{
    to_json, Block, ErrorCode, Kind, MetricInfo, MetricSource, Metrics, Value, View,
    PROTOCOL_VERSION,
};

fn sample() -> Metrics {
    let mut m = Metrics::new(8);
    m.define("bytes_sent", "Bytes sent", "bytes", Kind::Uint64).unwrap();
    m.define("is_connected", "Connection state", "", Kind::Boolean).unwrap();
    m.define_info(
        MetricInfo::new("state", "Link state", Kind::Enum8)
            .with_label(0, "down", "")
            .with_label(1, "up", "Link is up"),
    )
    .unwrap();
    m.define_info(MetricInfo::new("cores", "CPU cores", Kind::Uint32).constant())
        .unwrap();
    m.define_info(MetricInfo::constant_value("ratio", "Fixed ratio", 0.5f64).with_unit("x"))
        .unwrap();
    m.define("rtt", "Round trip", "ms", Kind::Float32).unwrap();
    m.seal().unwrap();
    m
}

#[test]
fn metadata_round_trips_through_the_block() {
    let m = sample();
    let view = View::open(m.block().unwrap()).unwrap();

    assert_eq!(view.protocol_version(), PROTOCOL_VERSION);
    assert_eq!(view.infos(), m.infos());
    let names: Vec<_> = view.list().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["bytes_sent", "is_connected", "state", "cores", "ratio", "rtt"]);

    // restartable
    assert_eq!(view.list().count(), 6);
    assert_eq!(view.index_of("cores"), Some(3));
    assert!(view.info("ratio").unwrap().is_constant);
}

#[test]
fn view_sees_live_values() {
    let m = sample();
    let view = View::open(m.block().unwrap()).unwrap();
    let bytes_sent = m.slot("bytes_sent").unwrap();

    assert_eq!(view.get("bytes_sent").unwrap(), None);
    m.set(bytes_sent, 42u64).unwrap();
    assert_eq!(view.get("bytes_sent").unwrap(), Some(Value::Uint64(42)));
    m.increment(bytes_sent, 8u64).unwrap();
    assert_eq!(view.get("bytes_sent").unwrap(), Some(Value::Uint64(50)));

    m.set(m.slot("rtt").unwrap(), 12.5f32).unwrap();
    m.set(m.slot("state").unwrap(), 1u8).unwrap();
    m.set(m.slot("cores").unwrap(), 16u32).unwrap();
    assert_eq!(view.get("rtt").unwrap(), Some(Value::Float32(12.5)));
    assert_eq!(view.get("state").unwrap(), Some(Value::Enum8(1)));
    assert_eq!(view.get("cores").unwrap(), Some(Value::Uint32(16)));
    assert_eq!(view.get("ratio").unwrap(), Some(Value::Float64(0.5)));
    assert_eq!(view.get("missing").unwrap_err().code(), ErrorCode::UnknownMetric);

    for i in 0..view.count() {
        assert_eq!(view.value(i), m.value(i));
    }
}

#[test]
fn snapshot_copy_can_be_viewed() {
    let m = sample();
    m.set(m.slot("bytes_sent").unwrap(), 7u64).unwrap();

    let copy = Block::from_bytes(&m.block().unwrap().to_vec());
    m.set(m.slot("bytes_sent").unwrap(), 8u64).unwrap();

    let view = View::open(&copy).unwrap();
    assert_eq!(view.get("bytes_sent").unwrap(), Some(Value::Uint64(7)));
}

#[test]
fn version_mismatch_fails_closed() {
    let m = sample();
    let mut bytes = m.block().unwrap().to_vec();
    bytes[..4].copy_from_slice(&(PROTOCOL_VERSION + 1).to_le_bytes());
    // Corrupt the metadata too; it must never be looked at.
    bytes[HEADER_LEN] = 0xff;

    let err = View::open(&Block::from_bytes(&bytes)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::VersionMismatch);
}

#[test]
fn unsealed_memory_reads_as_not_ready() {
    let block = Block::new(256);
    let err = View::open(&block).unwrap_err();
    assert_eq!(err.code(), ErrorCode::VersionMismatch);
    assert!(err.code().is_consumer_side());
}

#[test]
fn metadata_cut_by_one_byte_is_rejected() {
    let m = sample();
    let bytes = m.block().unwrap().to_vec();
    let metadata_len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;

    let cut = Block::from_bytes(&bytes[..HEADER_LEN + metadata_len - 1]);
    let err = View::open(&cut).unwrap_err();
    assert!(
        matches!(err.code(), ErrorCode::Truncated | ErrorCode::Malformed),
        "got {err}"
    );

    // Shrinking the declared length instead trips the hash check.
    let mut shrunk = bytes.clone();
    shrunk[8..12].copy_from_slice(&((metadata_len - 1) as u32).to_le_bytes());
    let err = View::open(&Block::from_bytes(&shrunk)).unwrap_err();
    assert!(matches!(err.code(), ErrorCode::Truncated | ErrorCode::Malformed));
}

#[test]
fn foreign_byte_order_is_swapped() {
    let mut m = Metrics::new(2);
    let wide = m.define("wide", "", "", Kind::Uint64).unwrap();
    let narrow = m.define("narrow", "", "", Kind::Uint32).unwrap();
    m.seal().unwrap();
    m.set(wide, 1u64).unwrap();
    m.set(narrow, 1u32).unwrap();

    let mut bytes = m.block().unwrap().to_vec();
    // Byte order flag lives right after the four header words.
    bytes[16] ^= 1;
    let flipped = Block::from_bytes(&bytes);
    let view = View::open(&flipped).unwrap();

    assert_eq!(view.get("wide").unwrap(), Some(Value::Uint64(1u64 << 56)));
    assert_eq!(view.get("narrow").unwrap(), Some(Value::Uint32(1u32 << 24)));
}

#[test]
fn end_to_end_two_metrics() {
    let mut m = Metrics::new(2);
    let bytes_sent = m.define("bytes_sent", "Bytes sent", "bytes", Kind::Uint64).unwrap();
    let is_connected = m
        .define("is_connected", "Connection state", "", Kind::Boolean)
        .unwrap();
    m.seal().unwrap();
    m.set(bytes_sent, 42u64).unwrap();
    m.set(is_connected, true).unwrap();

    let view = View::open(m.block().unwrap()).unwrap();
    let listed: Vec<_> = view.list().map(|i| (i.name.as_str(), i.kind)).collect();
    assert_eq!(listed, [("bytes_sent", Kind::Uint64), ("is_connected", Kind::Boolean)]);
    assert_eq!(view.get("bytes_sent").unwrap(), Some(Value::Uint64(42)));

    assert_eq!(
        to_json(&view),
        r#"{"bytes_sent":{"description":"Bytes sent","unit":"bytes","kind":"uint64","value":42},"is_connected":{"description":"Connection state","unit":"","kind":"boolean","value":true}}"#
    );
    assert_eq!(to_json(&view), to_json(&m));
}

#[test]
fn snapshots_taken_during_writes_hold_whole_values() {
    let mut m = Metrics::new(3);
    let wide = m.define("wide", "", "", Kind::Uint64).unwrap();
    let narrow = m.define("narrow", "", "", Kind::Uint32).unwrap();
    let flag = m.define("flag", "", "", Kind::Boolean).unwrap();
    m.seal().unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..20_000u64 {
                m.set(wide, i * 0x0001_0001_0001_0001).unwrap();
                m.set(narrow, (i as u32) * 0x0001_0001).unwrap();
                m.set(flag, i % 2 == 0).unwrap();
            }
            done.store(true, Ordering::Release);
        });

        while !done.load(Ordering::Acquire) {
            let copy = Block::from_bytes(&m.block().unwrap().to_vec());
            let view = View::open(&copy).unwrap();
            if let Some(Value::Uint64(v)) = view.get("wide").unwrap() {
                assert_eq!(v, (v & 0xffff) * 0x0001_0001_0001_0001, "torn u64 {v:#x}");
            }
            if let Some(Value::Uint32(v)) = view.get("narrow").unwrap() {
                assert_eq!(v, (v & 0xffff) * 0x0001_0001, "torn u32 {v:#x}");
            }
        }
    });

    let view = View::open(m.block().unwrap()).unwrap();
    assert_eq!(view.get("wide").unwrap(), Some(Value::Uint64(19_999 * 0x0001_0001_0001_0001)));
    assert_eq!(view.get("flag").unwrap(), Some(Value::Boolean(false)));
}

#[test]
fn caller_managed_region_is_written_in_place() {
    let mut backing = vec![0u64; 64];
    // A trailing partial word is not used.
    let block = unsafe { Block::from_raw_parts(backing.as_mut_ptr().cast::<u8>(), 63 * 8 + 5) }.unwrap();
    assert_eq!(block.len(), 63 * 8);

    let mut m = Metrics::with_block(1, block);
    let hits = m.define("hits", "", "", Kind::Uint32).unwrap();
    m.seal().unwrap();
    m.increment(hits, 3u32).unwrap();
    assert_eq!(View::open(m.block().unwrap()).unwrap().get("hits").unwrap(), Some(Value::Uint32(3)));
    drop(m);

    assert_eq!(backing[0].to_ne_bytes()[..4], PROTOCOL_VERSION.to_le_bytes());
}

#[test]
fn misaligned_or_null_regions_are_refused() {
    let mut backing = vec![0u64; 4];
    let base = backing.as_mut_ptr().cast::<u8>();
    let err = unsafe { Block::from_raw_parts(base.wrapping_add(1), 16) }.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Malformed);
    let err = unsafe { Block::from_raw_parts(std::ptr::null_mut(), 16) }.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Malformed);
}
