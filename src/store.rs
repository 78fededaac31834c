//! Store coordinator: public API, lifecycle state machine, and orchestration
//! of columns, bitmap indices, the durability log, and the retention sweep.

use crate::column::MetricColumn;
use crate::error::StoreError;
use crate::index::TagBitmapIndex;
use crate::persistence::{encode_line, AppendLog};
use crate::telemetry::{noop_event_listener, store_metrics, StoreEvent, StoreEventListener};
use crate::types::{Sample, TagSet, Timestamp, Value};
use crate::{DEFAULT_RETENTION, LOG_FILE_NAME};

use rayon::prelude::*;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Configuration options for a store instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the durability log (`data_store.log`).
    pub data_dir: PathBuf,
    /// Retention window; at the sweep, samples with `timestamp < now - retention`
    /// are evicted. Settable per instance so tests can inject it.
    pub retention: Duration,
    /// Structured event hook for observability (no-op by default).
    pub event_listener: Arc<dyn StoreEventListener>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from("."),
            retention: DEFAULT_RETENTION,
            event_listener: noop_event_listener(),
        }
    }
}

/// Lifecycle of a store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Running,
    Terminated,
    /// `initialize` failed; the store is unusable. Terminal.
    Failed,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Uninitialized => "uninitialized",
            State::Running => "running",
            State::Terminated => "terminated",
            State::Failed => "failed",
        }
    }
}

/// Column plus bitmap index for one metric.
///
/// Invariant: bit `i` of any posting in `index` refers to position `i` of
/// `column`. Both are only ever mutated together, under the store write lock.
#[derive(Debug, Default)]
struct MetricShard {
    column: MetricColumn,
    index: TagBitmapIndex,
}

impl MetricShard {
    /// Appends a sample at the next column position and sets its tag bits.
    fn append(&mut self, sample: Sample) -> Result<(), StoreError> {
        if self.column.len() >= u32::MAX as usize {
            return Err(StoreError::Internal(format!(
                "column for metric {:?} exceeds the bitmap position space",
                sample.metric
            )));
        }
        let position = self.column.len() as u32;
        self.index.set(position, &sample.tags);
        self.column.push(sample);
        Ok(())
    }

    /// Evicts samples older than `cutoff`; on any eviction the bitmap index is
    /// rebuilt against the shifted positions. Returns the evicted count.
    fn sweep(&mut self, cutoff: Timestamp) -> usize {
        let evicted = self.column.evict_before(cutoff);
        if evicted > 0 {
            self.index.rebuild(&self.column);
        }
        evicted
    }
}

/// Everything guarded by the store-wide reader-writer lock: the per-metric
/// shards, the log writer, the retention window, and the lifecycle state.
#[derive(Debug)]
struct StoreInner {
    state: State,
    shards: HashMap<String, MetricShard>,
    log: Option<AppendLog>,
    retention: Duration,
}

/// In-process time-series store.
///
/// Inserts append to the metric's column, update the tag bitmap index, and
/// write one flushed line to the durability log. Queries binary-search the
/// column for the half-open time bounds and, when filters are present,
/// intersect the filters' posting bitmaps before enumerating positions.
///
/// A single reader-writer lock guards the whole index: `insert`, `initialize`,
/// the retention sweep, and `shutdown` serialize on the writer side (which
/// preserves the bit-`i` / position-`i` invariant), while queries share the
/// reader side. Callers always receive owned copies of samples, never aliases
/// into the index.
#[derive(Debug)]
pub struct TimeSeriesStore {
    inner: RwLock<StoreInner>,
    config: StoreConfig,
}

impl TimeSeriesStore {
    /// Creates a store with the provided configuration. No I/O happens until
    /// [`Self::initialize`].
    pub fn with_config(config: StoreConfig) -> Self {
        let inner = StoreInner {
            state: State::Uninitialized,
            shards: HashMap::new(),
            log: None,
            retention: config.retention,
        };
        TimeSeriesStore {
            inner: RwLock::new(inner),
            config,
        }
    }

    /// Creates a store with default configuration rooted at `data_dir`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let config = StoreConfig {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..StoreConfig::default()
        };
        Self::with_config(config)
    }

    /// Path of the durability log for this instance.
    pub fn log_path(&self) -> PathBuf {
        self.config.data_dir.join(LOG_FILE_NAME)
    }

    /// Returns a reference to the configuration this store was built with.
    pub fn get_config(&self) -> &StoreConfig {
        &self.config
    }

    /// Opens the durability log; if it already exists, replays every record
    /// into the in-memory index. Then runs exactly one retention sweep and
    /// opens the log for append. Must be called exactly once before any
    /// insert or query.
    ///
    /// # Errors
    /// Any I/O or parse failure during recovery leaves the store in a terminal
    /// failed state; every subsequent operation reports a usage error.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write()?;
        if inner.state != State::Uninitialized {
            return Err(StoreError::InvalidState {
                op: "initialize",
                state: inner.state.name(),
            });
        }
        match Self::recover(&mut inner, &self.log_path(), &self.config.event_listener) {
            Ok(()) => {
                inner.state = State::Running;
                Ok(())
            }
            Err(e) => {
                inner.state = State::Failed;
                Err(e)
            }
        }
    }

    fn recover(
        inner: &mut StoreInner,
        log_path: &Path,
        events: &Arc<dyn StoreEventListener>,
    ) -> Result<(), StoreError> {
        if let Some(dir) = log_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        if log_path.exists() {
            events.on_event(StoreEvent::ReplayStarted {
                path: log_path.to_path_buf(),
            });
            let records = AppendLog::replay(log_path)?;
            let count = records.len();
            for sample in records {
                let shard = inner.shards.entry(sample.metric.clone()).or_default();
                shard.append(sample)?;
            }
            store_metrics::record_replayed_samples(count as u64);
            events.on_event(StoreEvent::ReplayCompleted { records: count });
        }

        // One retention sweep before accepting traffic. The sweep only touches
        // the in-memory index; the log keeps every record it ever saw.
        Self::sweep(inner, now_millis(), events);

        inner.log = Some(AppendLog::open(log_path)?);
        Ok(())
    }

    /// Evicts expired samples from every metric and rebuilds the affected
    /// bitmap indices. Runs under the writer lock; metrics are independent, so
    /// the per-shard work fans out across threads.
    fn sweep(inner: &mut StoreInner, now: Timestamp, events: &Arc<dyn StoreEventListener>) {
        let cutoff = now.saturating_sub(inner.retention.as_millis() as u64);
        let started = Instant::now();
        let evicted: usize = inner
            .shards
            .par_iter_mut()
            .map(|(_, shard)| shard.sweep(cutoff))
            .sum();
        store_metrics::record_sweep(started.elapsed(), evicted as u64);
        events.on_event(StoreEvent::RetentionSwept {
            cutoff,
            evicted: evicted as u64,
        });
    }

    /// Inserts one sample.
    ///
    /// Appends to the metric's column, sets one bit per tag pair, then writes
    /// and flushes one record line to the durability log. Timestamps are
    /// expected to arrive in non-decreasing order per metric; a regressing
    /// timestamp is still appended (an [`StoreEvent::OutOfOrderAppend`] is
    /// emitted) but degrades range queries that straddle it.
    ///
    /// # Errors
    /// A log write failure returns `Err` while the in-memory state stays
    /// updated: the sample is queryable until eviction but not durable.
    pub fn insert(
        &self,
        metric: &str,
        timestamp: Timestamp,
        value: Value,
        tags: TagSet,
    ) -> Result<(), StoreError> {
        if metric.is_empty() {
            return Err(StoreError::InvalidSample("empty metric name".to_string()));
        }
        if tags.keys().any(|k| k.is_empty()) {
            return Err(StoreError::InvalidSample("empty tag key".to_string()));
        }

        let mut guard = self.inner.write()?;
        let inner = &mut *guard;
        if inner.state != State::Running {
            return Err(StoreError::InvalidState {
                op: "insert",
                state: inner.state.name(),
            });
        }

        let shard = inner.shards.entry(metric.to_string()).or_default();
        if let Some(tail) = shard.column.tail_timestamp() {
            if timestamp < tail {
                self.config.event_listener.on_event(StoreEvent::OutOfOrderAppend {
                    metric: metric.to_string(),
                    timestamp,
                    tail,
                });
            }
        }

        let sample = Sample::new(timestamp, metric, value, tags);
        let line = encode_line(&sample)?;
        shard.append(sample)?;

        let log = inner.log.as_mut().ok_or_else(|| {
            StoreError::Internal("durability log absent on a running store".to_string())
        })?;
        match log.append(&line) {
            Ok(bytes) => {
                store_metrics::record_ingest_samples(1);
                store_metrics::record_log_bytes_written(bytes as u64);
                Ok(())
            }
            Err(e) => {
                self.config.event_listener.on_event(StoreEvent::LogAppendFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Queries samples of `metric` in the half-open interval
    /// `[time_range.start, time_range.end)`, optionally keeping only samples
    /// whose tags contain every `(key, value)` pair of `filters`.
    ///
    /// Results are independent clones in ascending position order (equivalently
    /// ascending timestamp order for in-order data, ties in insertion order).
    /// An unknown metric, an empty interval, or a filter pair no sample
    /// carries all yield `Ok` with an empty vector, never an error.
    pub fn query(
        &self,
        metric: &str,
        time_range: Range<Timestamp>,
        filters: Option<&TagSet>,
    ) -> Result<Vec<Sample>, StoreError> {
        let inner = self.inner.read()?;
        if inner.state != State::Running {
            return Err(StoreError::InvalidState {
                op: "query",
                state: inner.state.name(),
            });
        }

        let started = Instant::now();
        let results = match inner.shards.get(metric) {
            None => Vec::new(),
            Some(shard) => match filters {
                None => shard.column.range(time_range.start, time_range.end).to_vec(),
                Some(f) if f.is_empty() => {
                    shard.column.range(time_range.start, time_range.end).to_vec()
                }
                Some(f) => Self::query_filtered(shard, &time_range, f),
            },
        };
        store_metrics::record_query(started.elapsed());
        Ok(results)
    }

    fn query_filtered(shard: &MetricShard, range: &Range<Timestamp>, filters: &TagSet) -> Vec<Sample> {
        let Some(mut combined) = shard.index.intersect(filters) else {
            return Vec::new();
        };
        if combined.is_empty() {
            return Vec::new();
        }

        let lo = shard.column.lower_bound(range.start);
        let hi = shard.column.lower_bound(range.end);
        if lo >= hi {
            return Vec::new();
        }
        // Positions fit in u32 by the shard append guard.
        combined.remove_range(0..lo as u32);
        combined.remove_range(hi as u32..);

        combined
            .iter()
            .filter_map(|position| shard.column.get(position as usize).cloned())
            .collect()
    }

    /// Names of every metric currently holding samples, unordered.
    pub fn metric_names(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read()?;
        if inner.state != State::Running {
            return Err(StoreError::InvalidState {
                op: "metric_names",
                state: inner.state.name(),
            });
        }
        Ok(inner.shards.keys().cloned().collect())
    }

    /// Number of retained samples for `metric` (zero when unknown).
    pub fn sample_count(&self, metric: &str) -> Result<usize, StoreError> {
        let inner = self.inner.read()?;
        if inner.state != State::Running {
            return Err(StoreError::InvalidState {
                op: "sample_count",
                state: inner.state.name(),
            });
        }
        Ok(inner.shards.get(metric).map_or(0, |s| s.column.len()))
    }

    /// Updates the retention window. Takes effect at the next sweep, which
    /// runs at the next `initialize` of a store over the same log.
    pub fn set_retention(&self, retention: Duration) -> Result<(), StoreError> {
        let mut inner = self.inner.write()?;
        inner.retention = retention;
        Ok(())
    }

    /// Flushes and closes the durability log. The store is terminated
    /// afterwards, whether or not the close succeeded; no further operations
    /// may be invoked on this instance.
    pub fn shutdown(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write()?;
        if inner.state != State::Running {
            return Err(StoreError::InvalidState {
                op: "shutdown",
                state: inner.state.name(),
            });
        }
        let result = match inner.log.take() {
            Some(mut log) => log.close(),
            None => Ok(()),
        };
        inner.state = State::Terminated;
        if result.is_ok() {
            self.config.event_listener.on_event(StoreEvent::ShutdownCompleted);
        }
        result
    }
}

fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
