use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "prometheus")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "prometheus")]
use std::sync::Mutex;
#[cfg(feature = "prometheus")]
use std::thread::JoinHandle;
use std::time::Duration;

use crate::types::Timestamp;

/// Structured, in-process event hook for observability.
///
/// This crate is a library; emitting logs directly (e.g. `println!`) is not
/// acceptable for production. Instead, callers can provide an implementation
/// that forwards these events to `tracing`, `log`, metrics, or custom sinks.
pub trait StoreEventListener: std::fmt::Debug + Send + Sync + 'static {
    fn on_event(&self, event: StoreEvent);
}

/// Structured events emitted by the store.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    ReplayStarted { path: PathBuf },
    ReplayCompleted { records: usize },

    RetentionSwept { cutoff: Timestamp, evicted: u64 },

    /// A sample was appended whose timestamp regresses behind the column tail.
    /// The sample is retained, but range queries straddling it degrade.
    OutOfOrderAppend {
        metric: String,
        timestamp: Timestamp,
        tail: Timestamp,
    },

    LogAppendFailed { error: String },

    ShutdownCompleted,
}

#[derive(Debug)]
pub struct NoopEventListener;

impl StoreEventListener for NoopEventListener {
    #[inline]
    fn on_event(&self, _event: StoreEvent) {}
}

pub fn noop_event_listener() -> Arc<dyn StoreEventListener> {
    Arc::new(NoopEventListener)
}

/// Metrics instrumentation and in-process scraping.
///
/// ## Key properties
/// - Library-safe: emitting metrics is effectively a no-op until a recorder is installed.
/// - Serverless scraping: callers can render Prometheus exposition text in-process.
/// - Low operational overhead: a lightweight upkeep thread keeps histograms bounded.
pub mod store_metrics {
    use super::*;

    use ::metrics::{describe_counter, describe_histogram, Unit};

    #[cfg(feature = "prometheus")]
    use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

    // --- metric names ---
    //
    // Notes:
    // - Counters are exposed as `<name>_total` by the Prometheus exporter.
    // - Histograms are exposed as `<name>_bucket`, `<name>_sum`, `<name>_count`.

    pub const INGEST_SAMPLES: &str = "tickstore_ingest_samples";
    pub const REPLAYED_SAMPLES: &str = "tickstore_replayed_samples";
    pub const EVICTED_SAMPLES: &str = "tickstore_evicted_samples";
    pub const LOG_BYTES_WRITTEN: &str = "tickstore_log_bytes_written";

    pub const QUERY_DURATION_SECONDS: &str = "tickstore_query_duration_seconds";
    pub const SWEEP_DURATION_SECONDS: &str = "tickstore_sweep_duration_seconds";

    /// Handle to the in-process Prometheus recorder/scrape renderer.
    ///
    /// This does **not** start an HTTP server. Call [`InProcessPrometheus::render`] to scrape.
    #[cfg(feature = "prometheus")]
    #[derive(Debug)]
    pub struct InProcessPrometheus {
        handle: PrometheusHandle,
        stop: Arc<AtomicBool>,
        upkeep_thread: Mutex<Option<JoinHandle<()>>>,
    }

    #[cfg(feature = "prometheus")]
    impl InProcessPrometheus {
        /// Installs a global Prometheus recorder (once per process) and starts a small upkeep thread.
        ///
        /// The upkeep thread periodically calls `run_upkeep()` to keep exporter internals healthy
        /// (e.g. histogram maintenance). This is required when using `install_recorder`.
        pub fn install(upkeep_interval: Duration) -> Result<Self, MetricsInitError> {
            describe_all();

            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .map_err(MetricsInitError::from_build_error)?;

            let stop = Arc::new(AtomicBool::new(false));
            let stop_clone = stop.clone();
            let handle_clone = handle.clone();
            let upkeep_thread = std::thread::Builder::new()
                .name("tickstore-metrics-upkeep".to_string())
                .spawn(move || {
                    while !stop_clone.load(Ordering::Relaxed) {
                        std::thread::sleep(upkeep_interval);
                        handle_clone.run_upkeep();
                    }
                })
                .map_err(|e| MetricsInitError::ThreadSpawn(e.to_string()))?;

            Ok(Self {
                handle,
                stop,
                upkeep_thread: Mutex::new(Some(upkeep_thread)),
            })
        }

        /// Renders the current metrics in the Prometheus text exposition format.
        pub fn render(&self) -> String {
            self.handle.render()
        }
    }

    #[cfg(feature = "prometheus")]
    impl Drop for InProcessPrometheus {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::Relaxed);
            if let Ok(mut guard) = self.upkeep_thread.lock() {
                if let Some(t) = guard.take() {
                    let _ = t.join();
                }
            }
        }
    }

    #[cfg(feature = "prometheus")]
    #[derive(Debug, thiserror::Error)]
    pub enum MetricsInitError {
        #[error("metrics recorder already installed")]
        AlreadyInstalled,
        #[error("failed to install prometheus recorder: {0}")]
        Install(String),
        #[error("failed to spawn upkeep thread: {0}")]
        ThreadSpawn(String),
    }

    #[cfg(feature = "prometheus")]
    impl MetricsInitError {
        fn from_build_error(e: BuildError) -> Self {
            match e {
                BuildError::FailedToSetGlobalRecorder(_) => MetricsInitError::AlreadyInstalled,
                other => MetricsInitError::Install(other.to_string()),
            }
        }
    }

    #[inline]
    pub fn record_ingest_samples(samples: u64) {
        if samples > 0 {
            ::metrics::counter!(INGEST_SAMPLES).increment(samples);
        }
    }

    #[inline]
    pub fn record_replayed_samples(samples: u64) {
        if samples > 0 {
            ::metrics::counter!(REPLAYED_SAMPLES).increment(samples);
        }
    }

    #[inline]
    pub fn record_log_bytes_written(bytes: u64) {
        if bytes > 0 {
            ::metrics::counter!(LOG_BYTES_WRITTEN).increment(bytes);
        }
    }

    #[inline]
    pub fn record_query(duration: Duration) {
        ::metrics::histogram!(QUERY_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    #[inline]
    pub fn record_sweep(duration: Duration, evicted: u64) {
        ::metrics::histogram!(SWEEP_DURATION_SECONDS).record(duration.as_secs_f64());
        if evicted > 0 {
            ::metrics::counter!(EVICTED_SAMPLES).increment(evicted);
        }
    }

    /// Registers units and help text for every metric this crate emits.
    /// Called by [`InProcessPrometheus::install`]; callers wiring their own
    /// recorder can invoke it directly.
    pub fn describe_all() {
        // Counters
        describe_counter!(
            INGEST_SAMPLES,
            Unit::Count,
            "Total number of samples ingested via TimeSeriesStore::insert."
        );
        describe_counter!(
            REPLAYED_SAMPLES,
            Unit::Count,
            "Total number of samples replayed from the durability log at initialize."
        );
        describe_counter!(
            EVICTED_SAMPLES,
            Unit::Count,
            "Total number of samples evicted by the retention sweep."
        );
        describe_counter!(
            LOG_BYTES_WRITTEN,
            Unit::Bytes,
            "Total number of bytes appended to the durability log (logical bytes)."
        );

        // Histograms
        describe_histogram!(
            QUERY_DURATION_SECONDS,
            Unit::Seconds,
            "End-to-end latency of TimeSeriesStore::query under the read lock."
        );
        describe_histogram!(
            SWEEP_DURATION_SECONDS,
            Unit::Seconds,
            "Duration of the retention sweep, including bitmap index rebuilds."
        );
    }
}
