//! Benchmark driver and sample-data generator for the tickstore core.
//!
//! `tsbench generate` writes a CSV with columns `unix_seconds,metric,value,<tag keys...>`,
//! one row per sample. `tsbench run` parses that CSV (multiplying seconds by 1000),
//! inserts every row, then issues time-range queries with and without a tag filter,
//! reporting throughput.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tickstore::{StoreConfig, TagSet, TimeSeriesStore};

/// The `run` subcommand always queries this metric, so the generator emits it
/// as metric index zero.
const QUERY_METRIC: &str = "temperature";
/// Fixed datacenter values; `eu-central` is the filtered benchmark's target.
const DATACENTERS: &[&str] = &["us-east", "us-west", "eu-central", "ap-south"];

/// tickstore benchmark driver.
#[derive(Parser, Debug)]
#[command(name = "tsbench", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a CSV of synthetic samples.
    Generate {
        /// Output CSV path.
        #[arg(long, default_value = "time_series_data.csv")]
        out: PathBuf,
        /// Number of rows to generate.
        #[arg(long, default_value_t = 100_000)]
        rows: u64,
        /// Number of distinct metric names (the first is always `temperature`).
        #[arg(long, default_value_t = 5)]
        metrics: u64,
        /// Cardinality of the generated `host` tag.
        #[arg(long, default_value_t = 50)]
        tag_card: u32,
        /// RNG seed, fixed for reproducible datasets.
        #[arg(long, default_value_t = 0x5449_434b_5354_4f52)]
        seed: u64,
    },
    /// Load a CSV, insert every row, then time range queries.
    Run {
        /// Input CSV path.
        #[arg(long, default_value = "time_series_data.csv")]
        csv: PathBuf,
        /// Number of queries to issue per shape.
        #[arg(long, default_value_t = 1_000)]
        queries: u64,
        /// Directory for the durability log.
        #[arg(long, env = "TSBENCH_DATA_DIR", default_value = ".")]
        data_dir: PathBuf,
        /// Retention window in milliseconds.
        #[arg(long, default_value_t = 86_400_000)]
        retention_ms: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Generate {
            out,
            rows,
            metrics,
            tag_card,
            seed,
        } => generate(&out, rows, metrics, tag_card, seed),
        Command::Run {
            csv,
            queries,
            data_dir,
            retention_ms,
        } => run(&csv, queries, &data_dir, retention_ms),
    }
}

fn generate(
    out: &PathBuf,
    rows: u64,
    metrics: u64,
    tag_card: u32,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if metrics == 0 {
        return Err("--metrics must be at least 1".into());
    }
    if tag_card == 0 {
        return Err("--tag-card must be at least 1".into());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut w = BufWriter::new(File::create(out)?);

    writeln!(w, "unix_seconds,metric,value,host,datacenter")?;

    // Ascending timestamps ending at "now", one second apart.
    let now_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let start_secs = now_secs.saturating_sub(rows);

    for i in 0..rows {
        let ts = start_secs + i;
        let m = i % metrics;
        let metric = if m == 0 {
            QUERY_METRIC.to_string()
        } else {
            format!("metric_{}", m)
        };
        let value = rng.random::<f64>() * 100.0;

        // Exactly one tag column per row; the driver keeps at most one tag.
        let (host, datacenter) = if rng.random_bool(0.5) {
            (format!("host{}", rng.random_range(0..tag_card)), String::new())
        } else {
            (
                String::new(),
                DATACENTERS[rng.random_range(0..DATACENTERS.len())].to_string(),
            )
        };
        writeln!(w, "{},{},{:.4},{},{}", ts, metric, value, host, datacenter)?;
    }
    w.flush()?;

    println!("Wrote {} rows to {}", rows, out.display());
    Ok(())
}

fn run(
    csv: &PathBuf,
    queries: u64,
    data_dir: &PathBuf,
    retention_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(csv).map_err(|e| format!("cannot open {}: {}", csv.display(), e))?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    reader.read_line(&mut header)?;
    let tag_keys: Vec<String> = header
        .trim_end()
        .split(',')
        .skip(3)
        .map(|s| s.to_string())
        .collect();

    let config = StoreConfig {
        data_dir: data_dir.clone(),
        retention: Duration::from_millis(retention_ms),
        ..StoreConfig::default()
    };
    let store = TimeSeriesStore::with_config(config);
    store.initialize()?;

    // Load and insert all rows, measuring throughput.
    let mut count: u64 = 0;
    let started = Instant::now();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 3 {
            return Err(format!("malformed CSV row: {:?}", line).into());
        }
        let ts: u64 = parts[0].parse::<u64>()? * 1000;
        let metric = parts[1];
        let value: f64 = parts[2].parse()?;

        // Keep at most one tag per row; further tag columns are ignored to
        // bound per-row cardinality.
        let mut tags = TagSet::new();
        for (i, key) in tag_keys.iter().enumerate() {
            if let Some(cell) = parts.get(3 + i) {
                if !cell.is_empty() {
                    tags.insert(key.clone(), cell.to_string());
                    break;
                }
            }
        }

        store.insert(metric, ts, value, tags)?;
        count += 1;
    }
    let secs = started.elapsed().as_secs_f64();
    println!(
        "Inserted {} rows in {:.2} s, {:.2} writes/sec",
        count,
        secs,
        count as f64 / secs
    );
    println!("Distinct metrics: {}", store.metric_names()?.len());

    let day_ms = 24 * 60 * 60 * 1000;

    // Queries without filters.
    let started = Instant::now();
    for _ in 0..queries {
        let now = now_millis();
        let _ = store.query(QUERY_METRIC, now.saturating_sub(day_ms)..now, None)?;
    }
    let secs = started.elapsed().as_secs_f64();
    println!(
        "Ran {} normal queries in {:.2} s, {:.2} qps",
        queries,
        secs,
        queries as f64 / secs
    );

    // Queries with a fixed tag filter.
    let mut filter = TagSet::new();
    filter.insert("datacenter".to_string(), "eu-central".to_string());
    let started = Instant::now();
    for _ in 0..queries {
        let now = now_millis();
        let _ = store.query(
            QUERY_METRIC,
            now.saturating_sub(day_ms)..now,
            Some(&filter),
        )?;
    }
    let secs = started.elapsed().as_secs_f64();
    println!(
        "Ran {} filtered queries in {:.2} s, {:.2} qps",
        queries,
        secs,
        queries as f64 / secs
    );

    store.shutdown()?;
    Ok(())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
