use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Timestamp type (milliseconds since epoch).
pub type Timestamp = u64;

/// Value type.
pub type Value = f64;

/// TagSet type (using a HashMap for flexibility).
pub type TagSet = HashMap<String, String>;

/// A single time-series sample: one timestamped value for one metric,
/// optionally carrying tag key/value pairs. Immutable once created.
///
/// The serde representation doubles as the durability log line format, so the
/// record carries its metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,
    pub metric: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "TagSet::is_empty")]
    pub tags: TagSet,
}

impl Sample {
    /// Builds a sample from its parts.
    pub fn new(timestamp: Timestamp, metric: impl Into<String>, value: Value, tags: TagSet) -> Self {
        Sample {
            timestamp,
            metric: metric.into(),
            value,
            tags,
        }
    }
}
