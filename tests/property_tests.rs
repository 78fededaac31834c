//! Property tests: the indexed query path must agree with a naive linear scan
//! for arbitrary in-order sample sets, ranges, and filters, and replaying the
//! log must reproduce the same query results.

use proptest::collection::vec;
use proptest::prelude::*;
use std::time::Duration;

use tempfile::tempdir;
use tickstore::{Sample, StoreConfig, TagSet, TimeSeriesStore};

const KEYS: &[&str] = &["a", "b"];
const VALUES: &[&str] = &["x", "y", "z"];

// Effectively infinite retention so the startup sweep never evicts the small
// synthetic timestamps used here.
fn huge_retention() -> Duration {
    Duration::from_secs(1u64 << 40)
}

fn tag_set() -> impl Strategy<Value = TagSet> {
    vec((0..KEYS.len(), 0..VALUES.len()), 0..=2).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(k, v)| (KEYS[k].to_string(), VALUES[v].to_string()))
            .collect()
    })
}

// (timestamp increment, value, tags) triples; increments of zero produce ties.
fn sample_specs() -> impl Strategy<Value = Vec<(u64, i32, TagSet)>> {
    vec((0u64..50, -1000i32..1000, tag_set()), 1..60)
}

fn insert_all(store: &TimeSeriesStore, specs: Vec<(u64, i32, TagSet)>) -> Vec<Sample> {
    let mut ts = 1_000u64;
    let mut inserted = Vec::with_capacity(specs.len());
    for (inc, value, tags) in specs {
        ts += inc;
        store.insert("m", ts, value as f64, tags.clone()).unwrap();
        inserted.push(Sample::new(ts, "m", value as f64, tags));
    }
    inserted
}

fn naive_scan(inserted: &[Sample], start: u64, end: u64, filter: &TagSet) -> Vec<Sample> {
    inserted
        .iter()
        .filter(|s| {
            s.timestamp >= start
                && s.timestamp < end
                && filter.iter().all(|(k, v)| s.tags.get(k) == Some(v))
        })
        .cloned()
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn query_matches_naive_scan(
        specs in sample_specs(),
        filter in tag_set(),
        start in 900u64..4500,
        len in 0u64..4000,
    ) {
        let dir = tempdir().unwrap();
        let store = TimeSeriesStore::with_config(StoreConfig {
            data_dir: dir.path().to_path_buf(),
            retention: huge_retention(),
            ..StoreConfig::default()
        });
        store.initialize().unwrap();

        let inserted = insert_all(&store, specs);
        let end = start + len;

        let unfiltered = store.query("m", start..end, None).unwrap();
        prop_assert_eq!(&unfiltered, &naive_scan(&inserted, start, end, &TagSet::new()));

        let filtered = store.query("m", start..end, Some(&filter)).unwrap();
        prop_assert_eq!(&filtered, &naive_scan(&inserted, start, end, &filter));
    }

    #[test]
    fn replay_reproduces_query_results(
        specs in sample_specs(),
        filter in tag_set(),
    ) {
        let dir = tempdir().unwrap();
        let config = StoreConfig {
            data_dir: dir.path().to_path_buf(),
            retention: huge_retention(),
            ..StoreConfig::default()
        };

        let store = TimeSeriesStore::with_config(config.clone());
        store.initialize().unwrap();
        insert_all(&store, specs);
        let before_unfiltered = store.query("m", 0..u64::MAX, None).unwrap();
        let before_filtered = store.query("m", 0..u64::MAX, Some(&filter)).unwrap();
        store.shutdown().unwrap();

        let reopened = TimeSeriesStore::with_config(config);
        reopened.initialize().unwrap();
        prop_assert_eq!(reopened.query("m", 0..u64::MAX, None).unwrap(), before_unfiltered);
        prop_assert_eq!(reopened.query("m", 0..u64::MAX, Some(&filter)).unwrap(), before_filtered);
    }
}
