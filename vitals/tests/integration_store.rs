//! Integration tests for the full store lifecycle.
//!
//! These tests exercise the complete flow from store creation through
//! ingestion, snapshot persistence and restart, including the eviction and
//! recovery edge cases.

use serde_json::json;
use std::fs;
use tempfile::tempdir;
use vitals::schema::{
    HEART_RATE_CAPACITY, HEART_RATE_STREAM, PayloadKind, SENSOR_CAPACITY, SENSOR_STREAM,
    StreamConfig,
};
use vitals::store::{Store, StoreConfig, read_snapshot};

/// Helper for the two streams a real deployment runs with.
fn device_streams() -> Vec<StreamConfig> {
    vec![StreamConfig::heart_rate(), StreamConfig::sensor()]
}

#[test]
fn test_full_store_lifecycle() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("db.json");

    // Phase 1: create and ingest
    {
        let mut store = Store::open(StoreConfig::new(&path, device_streams())).unwrap();
        assert_eq!(store.streams(), vec![HEART_RATE_STREAM, SENSOR_STREAM]);

        for bpm in [61, 64, 70, 72] {
            store.append(HEART_RATE_STREAM, json!(bpm)).unwrap();
        }
        store
            .append(
                SENSOR_STREAM,
                json!({ "temperature": 21.5, "humidity": 40, "light": 310 }),
            )
            .unwrap();

        assert_eq!(store.latest(HEART_RATE_STREAM).value, json!(72));
        assert_eq!(store.window(HEART_RATE_STREAM, Some(2)).len(), 2);
    }

    // Phase 2: reopen and verify every window survived unchanged
    let before = read_snapshot(&path).unwrap();
    {
        let store = Store::open(StoreConfig::new(&path, device_streams())).unwrap();

        for (stream, readings) in &before {
            assert_eq!(&store.window(stream, None), readings, "stream {stream}");
        }
        assert_eq!(store.window(HEART_RATE_STREAM, None).len(), 4);
        assert_eq!(
            store.latest(SENSOR_STREAM).value["temperature"],
            json!(21.5)
        );
    }
}

#[test]
fn test_capacity_three_eviction() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("db.json");
    let stream = StreamConfig::new("hr", 3, PayloadKind::Numeric).unwrap();

    let mut store = Store::open(StoreConfig::new(&path, vec![stream])).unwrap();
    for v in 1..=5 {
        store.append("hr", json!(v)).unwrap();
    }

    let values: Vec<_> = store.window("hr", None).into_iter().map(|r| r.value).collect();
    assert_eq!(values, vec![json!(3), json!(4), json!(5)]);
    assert_eq!(store.latest("hr").value, json!(5));

    // The snapshot holds exactly what memory holds.
    let snapshot = read_snapshot(&path).unwrap();
    assert_eq!(snapshot["hr"].len(), 3);
    assert_eq!(snapshot["hr"][0].value, json!(3));
}

#[test]
fn test_retained_count_is_min_of_ingested_and_capacity() {
    for capacity in [1usize, 2, 7] {
        for ingested in [0usize, 1, 6, 7, 8, 20] {
            let stream = StreamConfig::new("s", capacity, PayloadKind::Numeric).unwrap();
            let mut store = Store::open_in_memory(vec![stream]).unwrap();

            for v in 0..ingested {
                store.push("s", json!(v));
            }

            let window = store.window("s", None);
            assert_eq!(window.len(), ingested.min(capacity));

            // Retained readings are the newest ones, oldest first.
            let expected: Vec<_> = (ingested.saturating_sub(capacity)..ingested)
                .map(|v| json!(v))
                .collect();
            let got: Vec<_> = window.into_iter().map(|r| r.value).collect();
            assert_eq!(got, expected, "capacity {capacity}, ingested {ingested}");
        }
    }
}

#[test]
fn test_window_ordering_and_timestamps_monotonic() {
    let mut store = Store::open_in_memory(device_streams()).unwrap();
    for v in 0..50 {
        store.push(HEART_RATE_STREAM, json!(v));
    }

    let window = store.window(HEART_RATE_STREAM, Some(10));
    assert_eq!(window.len(), 10);
    assert_eq!(window.first().unwrap().value, json!(40));
    assert_eq!(window.last().unwrap().value, json!(49));
    assert!(window.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    assert_eq!(store.window(HEART_RATE_STREAM, Some(0)).len(), 0);
    assert_eq!(store.window(HEART_RATE_STREAM, Some(1000)).len(), 50);
}

#[test]
fn test_empty_store_reports_sentinels() {
    let temp_dir = tempdir().unwrap();
    let store = Store::open(StoreConfig::new(
        temp_dir.path().join("db.json"),
        device_streams(),
    ))
    .unwrap();

    let hr = store.latest(HEART_RATE_STREAM);
    assert!(hr.is_sentinel());
    assert_eq!(hr.value, json!(0));

    let sensor = store.latest(SENSOR_STREAM);
    assert!(sensor.is_sentinel());
    assert!(sensor.value.is_null());

    assert!(store.window(SENSOR_STREAM, None).is_empty());
}

#[test]
fn test_corrupt_snapshot_restart() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("db.json");
    fs::write(&path, "{\"heartRates\": [ {\"timestamp\": ").unwrap();

    let mut store = Store::open(StoreConfig::new(&path, device_streams())).unwrap();
    assert!(store.window(HEART_RATE_STREAM, None).is_empty());
    assert!(store.latest(HEART_RATE_STREAM).is_sentinel());

    // The next append replaces the corrupt file with a valid snapshot.
    store.append(HEART_RATE_STREAM, json!(80)).unwrap();
    let snapshot = read_snapshot(&path).unwrap();
    assert_eq!(snapshot[HEART_RATE_STREAM].len(), 1);
    assert_eq!(snapshot[HEART_RATE_STREAM][0].value, json!(80));
}

#[test]
fn test_unconfigured_streams_survive_restart() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("db.json");

    {
        let mut store =
            Store::open(StoreConfig::new(&path, vec![]).default_capacity(2)).unwrap();
        for v in 0..4 {
            store.append("ad-hoc", json!({ "n": v })).unwrap();
        }
        assert_eq!(store.window("ad-hoc", None).len(), 2);
    }

    let store = Store::open(StoreConfig::new(&path, vec![]).default_capacity(2)).unwrap();
    assert_eq!(store.streams(), vec!["ad-hoc"]);
    assert_eq!(store.latest("ad-hoc").value, json!({ "n": 3 }));
}

#[test]
fn test_default_capacities() {
    let store = Store::open_in_memory(device_streams()).unwrap();
    assert_eq!(
        store.series(HEART_RATE_STREAM).unwrap().capacity(),
        HEART_RATE_CAPACITY
    );
    assert_eq!(
        store.series(SENSOR_STREAM).unwrap().capacity(),
        SENSOR_CAPACITY
    );
}

#[test]
fn test_invalid_configuration_rejected() {
    let dup = vec![StreamConfig::heart_rate(), StreamConfig::heart_rate()];
    assert!(Store::open_in_memory(dup).is_err());

    assert!(StreamConfig::new("hr", 0, PayloadKind::Numeric).is_err());
    assert!(StreamConfig::new("", 10, PayloadKind::Numeric).is_err());
}
