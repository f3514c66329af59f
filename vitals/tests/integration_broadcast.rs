//! Integration tests for live distribution through the telemetry façade.
//!
//! Covers fan-out to many subscribers, subscription lifecycle across
//! concurrent publishes, and rejection of malformed payloads end to end.

use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;
use vitals::error::{ValidationError, VitalsError};
use vitals::schema::{HEART_RATE_STREAM, SENSOR_STREAM, StreamConfig};
use vitals::sink::{PumpOutcome, pump};
use vitals::store::{StoreConfig, read_snapshot};
use vitals::{BroadcastConfig, Telemetry};

fn telemetry() -> Telemetry {
    Telemetry::open(
        StoreConfig::in_memory(vec![StreamConfig::heart_rate(), StreamConfig::sensor()]),
        BroadcastConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_every_subscriber_gets_every_reading() {
    let telemetry = telemetry();
    let mut subs: Vec<_> = (0..8).map(|_| telemetry.subscribe(HEART_RATE_STREAM)).collect();

    for bpm in [70, 71, 72] {
        telemetry
            .ingest(HEART_RATE_STREAM, &json!({ "heartRate": bpm }))
            .await
            .unwrap();
    }

    for sub in &mut subs {
        let mut got = Vec::new();
        while let Some(reading) = sub.try_recv() {
            got.push(reading.value);
        }
        assert_eq!(got, vec![json!(70), json!(71), json!(72)]);
    }
    assert_eq!(telemetry.broadcaster().subscriber_count(HEART_RATE_STREAM), 8);
}

#[tokio::test]
async fn test_subscriber_sees_only_later_readings() {
    let telemetry = telemetry();
    telemetry.ingest(HEART_RATE_STREAM, &json!(60)).await.unwrap();

    let mut sub = telemetry.subscribe(HEART_RATE_STREAM);
    let stored = telemetry.ingest(HEART_RATE_STREAM, &json!(61)).await.unwrap();

    assert_eq!(sub.recv().await, Some(stored));
    assert!(sub.try_recv().is_none());
}

#[tokio::test]
async fn test_streams_are_isolated() {
    let telemetry = telemetry();
    let mut hr = telemetry.subscribe(HEART_RATE_STREAM);
    let mut sensor = telemetry.subscribe(SENSOR_STREAM);

    telemetry
        .ingest(SENSOR_STREAM, &json!({ "temperature": 22 }))
        .await
        .unwrap();

    assert!(hr.try_recv().is_none());
    assert_eq!(
        sensor.recv().await.map(|r| r.value["temperature"].clone()),
        Some(json!(22))
    );
}

#[tokio::test]
async fn test_unsubscribe_during_concurrent_ingest() {
    let telemetry = telemetry();
    let mut leaving = telemetry.subscribe(HEART_RATE_STREAM);
    let mut staying = telemetry.subscribe(HEART_RATE_STREAM);
    let leaving_id = leaving.id();

    let producer = {
        let telemetry = telemetry.clone();
        tokio::spawn(async move {
            for v in 0..10 {
                telemetry.ingest(HEART_RATE_STREAM, &json!(v)).await.unwrap();
            }
        })
    };

    // Leave after the first delivery, while the producer keeps going.
    assert!(leaving.recv().await.is_some());
    assert!(telemetry.unsubscribe(leaving_id));
    assert!(!telemetry.unsubscribe(leaving_id));

    producer.await.unwrap();

    assert!(leaving.recv().await.is_none());
    let mut got = 0;
    while staying.try_recv().is_some() {
        got += 1;
    }
    assert_eq!(got, 10);
    assert_eq!(telemetry.broadcaster().subscriber_count(HEART_RATE_STREAM), 1);
}

#[tokio::test]
async fn test_malformed_ingest_end_to_end() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("db.json");
    let telemetry = Telemetry::open(
        StoreConfig::new(&path, vec![StreamConfig::heart_rate()]),
        BroadcastConfig::default(),
    )
    .unwrap();
    telemetry.ingest(HEART_RATE_STREAM, &json!(65)).await.unwrap();
    let before = read_snapshot(&path).unwrap();

    let mut sub = telemetry.subscribe(HEART_RATE_STREAM);
    for bad in [json!("fast"), json!({ "bpm": 70 }), json!([70]), json!(null)] {
        let err = telemetry.ingest(HEART_RATE_STREAM, &bad).await.unwrap_err();
        assert!(matches!(err, VitalsError::Validation(_)), "accepted {bad}");
    }
    let err = telemetry
        .ingest_message(HEART_RATE_STREAM, "{not json")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VitalsError::Validation(ValidationError::Malformed { .. })
    ));

    assert!(sub.try_recv().is_none());
    assert_eq!(telemetry.window(HEART_RATE_STREAM, None).await.len(), 1);
    assert_eq!(read_snapshot(&path).unwrap(), before);
}

#[tokio::test]
async fn test_slow_subscriber_dropped_without_blocking_ingest() {
    let telemetry = Telemetry::open(
        StoreConfig::in_memory(vec![StreamConfig::heart_rate()]),
        BroadcastConfig {
            subscriber_buffer: 2,
        },
    )
    .unwrap();
    let mut slow = telemetry.subscribe(HEART_RATE_STREAM);
    let mut fast = telemetry.subscribe(HEART_RATE_STREAM);

    for v in 0..5 {
        telemetry.ingest(HEART_RATE_STREAM, &json!(v)).await.unwrap();
        assert!(fast.try_recv().is_some());
    }

    assert!(!slow.is_active());
    assert!(slow.recv().await.is_none());
    assert!(fast.is_active());
    assert_eq!(telemetry.broadcaster().subscriber_count(HEART_RATE_STREAM), 1);
    assert_eq!(telemetry.window(HEART_RATE_STREAM, None).await.len(), 5);
}

#[tokio::test]
async fn test_pump_delivers_in_order_until_unsubscribed() {
    let telemetry = telemetry();
    let subscription = telemetry.subscribe(HEART_RATE_STREAM);
    let id = subscription.id();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let pumping = tokio::spawn(async move {
        let mut tx = tx;
        pump(subscription, &mut tx).await
    });

    for v in 0..5 {
        telemetry.ingest(HEART_RATE_STREAM, &json!(v)).await.unwrap();
    }
    for v in 0..5 {
        let reading = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reading.value, json!(v));
    }

    telemetry.unsubscribe(id);
    let outcome = pumping.await.unwrap();
    assert!(matches!(outcome, PumpOutcome::Unsubscribed { delivered: 5 }));
    assert_eq!(telemetry.broadcaster().total_subscribers(), 0);
}
