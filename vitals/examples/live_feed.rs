//! Example of a simulated heart-rate monitor feeding a live dashboard.
//!
//! This example shows how to:
//! - Open a durable store with the default device streams
//! - Follow a stream through a subscription
//! - Ingest readings and reject malformed ones
//! - Read back the retained window after a restart

use std::time::Duration;

use serde_json::json;
use vitals::schema::{HEART_RATE_STREAM, StreamConfig};
use vitals::store::StoreConfig;
use vitals::{BroadcastConfig, Telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🫀 vitals live feed example");

    let dir = std::env::temp_dir().join("vitals_live_feed");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("db.json");
    let streams = vec![StreamConfig::heart_rate(), StreamConfig::sensor()];

    let telemetry = Telemetry::open(
        StoreConfig::new(&path, streams.clone()),
        BroadcastConfig::default(),
    )?;

    // Dashboard side: print every update as it arrives.
    let mut updates = telemetry.subscribe(HEART_RATE_STREAM);
    let dashboard = tokio::spawn(async move {
        let mut seen = 0;
        while let Some(reading) = updates.recv().await {
            println!("  📈 {} bpm at {}", reading.value, reading.timestamp);
            seen += 1;
            if seen == 5 {
                break;
            }
        }
    });

    // Device side: five readings, one malformed.
    println!("\n📡 Sending readings...");
    for bpm in [68, 71, 74, 72, 70] {
        telemetry
            .ingest(HEART_RATE_STREAM, &json!({ "heartRate": bpm }))
            .await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    if let Err(e) = telemetry
        .ingest(HEART_RATE_STREAM, &json!({ "heartRate": "fast" }))
        .await
    {
        println!("  ⚠️  rejected: {e}");
    }

    dashboard.await?;

    // Reopen from the snapshot as a restarted server would.
    drop(telemetry);
    let reopened = Telemetry::open(StoreConfig::new(&path, streams), BroadcastConfig::default())?;
    let window = reopened.window(HEART_RATE_STREAM, Some(5)).await;
    println!("\n💾 After restart, last {} readings:", window.len());
    for reading in &window {
        println!("  {} -> {}", reading.timestamp, reading.value);
    }

    println!("\n✅ Snapshot at {}", path.display());
    Ok(())
}
