//! CLI for inspecting vitals snapshot files.
//!
//! Reads the JSON snapshot written by the server without opening a store, so
//! it is safe to run against a live server's file.

use std::path::Path;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use vitals::Reading;
use vitals::store::{Snapshot, read_snapshot};

/// vitals — Bounded telemetry store CLI.
#[derive(Parser)]
#[command(name = "vitals", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Display streams, reading counts, and time spans in a snapshot.
    Info {
        /// Path to the snapshot file.
        snapshot: PathBuf,
    },

    /// Print the newest reading of a stream.
    Latest {
        /// Path to the snapshot file.
        snapshot: PathBuf,

        /// Stream name.
        stream: String,
    },

    /// Print the most recent readings of a stream, oldest first.
    Window {
        /// Path to the snapshot file.
        snapshot: PathBuf,

        /// Stream name.
        stream: String,

        /// Number of readings (default: all retained).
        #[arg(long)]
        last: Option<usize>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },
}

/// Output format for window results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array of readings.
    Json,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { snapshot } => cmd_info(&snapshot),
        Commands::Latest { snapshot, stream } => cmd_latest(&snapshot, &stream),
        Commands::Window {
            snapshot,
            stream,
            last,
            format,
        } => cmd_window(&snapshot, &stream, last, &format),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `vitals info <snapshot>`.
fn cmd_info(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = load(path)?;
    let size = std::fs::metadata(path)?.len();

    println!("Snapshot: {} ({})", path.display(), format_bytes(size));
    println!("Streams: {}", snapshot.len());
    println!();

    for (name, readings) in &snapshot {
        println!("  {name}: {} readings", readings.len());
        if let (Some(first), Some(last)) = (readings.first(), readings.last()) {
            println!("    First: {}", first.timestamp.to_rfc3339());
            println!("    Last:  {}", last.timestamp.to_rfc3339());
            println!("    Latest value: {}", last.value);
        }
    }

    Ok(())
}

/// Implements `vitals latest <snapshot> <stream>`.
fn cmd_latest(path: &Path, stream: &str) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = load(path)?;
    let readings = stream_readings(&snapshot, stream)?;

    match readings.last() {
        Some(reading) => println!("{}", serde_json::to_string_pretty(reading)?),
        None => println!("(no readings)"),
    }

    Ok(())
}

/// Implements `vitals window <snapshot> <stream>`.
fn cmd_window(
    path: &Path,
    stream: &str,
    last: Option<usize>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = load(path)?;
    let readings = stream_readings(&snapshot, stream)?;
    let n = last.unwrap_or(readings.len()).min(readings.len());
    let window = &readings[readings.len() - n..];

    match format {
        OutputFormat::Csv => {
            println!("# stream={stream}, readings={}", window.len());
            println!("timestamp,value");
            for reading in window {
                println!("{},{}", reading.timestamp.to_rfc3339(), csv_value(reading));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(window)?);
        }
    }

    Ok(())
}

fn load(path: &Path) -> Result<Snapshot, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No snapshot found at '{}'", path.display()).into());
    }
    Ok(read_snapshot(path)?)
}

fn stream_readings<'a>(
    snapshot: &'a Snapshot,
    stream: &str,
) -> Result<&'a [Reading], Box<dyn std::error::Error>> {
    snapshot
        .get(stream)
        .map(Vec::as_slice)
        .ok_or_else(|| format!("Stream '{stream}' not found").into())
}

/// Numbers print bare; structured payloads print as quoted JSON.
fn csv_value(reading: &Reading) -> String {
    if reading.value.is_number() {
        return reading.value.to_string();
    }
    let json = reading.value.to_string();
    format!("\"{}\"", json.replace('"', "\"\""))
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
