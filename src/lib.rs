#![doc = r#"
tickstore: In-Process Time-Series Store with Tag Bitmap Indices

This crate provides an indexed in-memory time-series store with a durable
append log. Samples are `(timestamp, metric, value, tags)` tuples; queries
select one metric, a half-open time interval, and an optional conjunction of
exact-match tag filters. It supports:
- Per-metric time-sorted columns with logarithmic range slicing
- Per-metric inverted bitmap indices over tag key/value pairs
- An append log, flushed on every insert and replayed on startup
- A retention sweep at startup that evicts expired samples and rebuilds indices
- Concurrent ingest and query under a reader-writer discipline

See the README for usage examples and more details.
"#]
// Declare modules
pub mod column;
pub mod error;
pub mod index;
pub mod persistence;
pub mod store;
pub mod telemetry;
pub mod types;

/// Main entry point for interacting with the time-series store.
pub use crate::store::TimeSeriesStore;
/// Configuration options for a store instance.
pub use crate::store::StoreConfig;
/// Error type for store operations.
pub use crate::error::StoreError;
/// Durability log: one textual record per acknowledged insert.
pub use crate::persistence::AppendLog;
/// Structured event hook for observability.
pub use crate::telemetry::{StoreEvent, StoreEventListener};
/// Represents a single time-series sample.
pub use crate::types::Sample;
/// Type alias for a set of tags (key-value pairs) associated with a sample.
pub use crate::types::TagSet;
/// Type alias for a timestamp (milliseconds since epoch).
pub use crate::types::Timestamp;
/// Type alias for a value in a time series (f64).
pub use crate::types::Value;

use std::time::Duration;
/// The default retention window if not specified (24 hours).
pub const DEFAULT_RETENTION: Duration = Duration::from_millis(86_400_000);
/// Fixed durability log filename, created inside the configured data directory.
pub const LOG_FILE_NAME: &str = "data_store.log";
