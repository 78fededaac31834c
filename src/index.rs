//! Inverted tag index: per-metric mapping `tag_key -> tag_value -> bitmap` of
//! column positions, supporting conjunctive equality filtering by bitmap AND.

use crate::column::MetricColumn;
use crate::types::TagSet;
use roaring::RoaringBitmap;
use std::collections::HashMap;

/// Inverted index over one metric's tag pairs.
///
/// Bit `i` of `postings[key][value]` is set iff the sample at position `i` of
/// the metric's column carries `(key, value)` in its tag map. Postings are
/// created lazily on the first occurrence of a pair; a sample with no tags
/// contributes no bits. After eviction shifts column positions, the whole
/// index is rebuilt from the column.
#[derive(Debug, Default)]
pub struct TagBitmapIndex {
    postings: HashMap<String, HashMap<String, RoaringBitmap>>,
}

impl TagBitmapIndex {
    /// Sets bit `position` for every `(key, value)` pair in `tags`.
    pub fn set(&mut self, position: u32, tags: &TagSet) {
        for (key, value) in tags {
            self.postings
                .entry(key.clone())
                .or_default()
                .entry(value.clone())
                .or_default()
                .insert(position);
        }
    }

    /// Returns the posting bitmap for `(key, value)`, if any sample carries it.
    pub fn bitmap(&self, key: &str, value: &str) -> Option<&RoaringBitmap> {
        self.postings.get(key).and_then(|by_value| by_value.get(value))
    }

    /// Computes the conjunction of all filter pairs as an owned bitmap.
    ///
    /// Clones the first filter's bitmap and ANDs the rest into it, so indexed
    /// postings are never mutated on the query path. Returns `None` when
    /// `filters` is empty or some filter pair has no postings at all; the
    /// returned bitmap may still be empty when the pairs exist but no position
    /// carries all of them (early-terminated as soon as the working set
    /// drains).
    pub fn intersect(&self, filters: &TagSet) -> Option<RoaringBitmap> {
        let mut pairs = filters.iter();
        let (first_key, first_value) = pairs.next()?;
        let mut working = self.bitmap(first_key, first_value)?.clone();
        for (key, value) in pairs {
            let postings = self.bitmap(key, value)?;
            working &= postings;
            if working.is_empty() {
                break;
            }
        }
        Some(working)
    }

    /// Discards all postings and re-derives them by walking `column`.
    ///
    /// Eviction shifts every surviving position down, invalidating existing
    /// bit indices wholesale; a full rebuild is no more work than shifting.
    pub fn rebuild(&mut self, column: &MetricColumn) {
        self.postings.clear();
        for (position, sample) in column.samples().iter().enumerate() {
            self.set(position as u32, &sample.tags);
        }
    }

    /// Returns true if no postings exist.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn positions(bm: &RoaringBitmap) -> Vec<u32> {
        bm.iter().collect()
    }

    #[test]
    fn set_creates_postings_lazily() {
        let mut idx = TagBitmapIndex::default();
        assert!(idx.is_empty());
        idx.set(0, &tags(&[("host", "s1")]));
        idx.set(1, &tags(&[("host", "s2")]));
        idx.set(2, &tags(&[("host", "s1")]));
        assert_eq!(positions(idx.bitmap("host", "s1").unwrap()), vec![0, 2]);
        assert_eq!(positions(idx.bitmap("host", "s2").unwrap()), vec![1]);
        assert!(idx.bitmap("host", "s3").is_none());
        assert!(idx.bitmap("region", "s1").is_none());
    }

    #[test]
    fn untagged_samples_contribute_no_bits() {
        let mut idx = TagBitmapIndex::default();
        idx.set(0, &TagSet::new());
        assert!(idx.is_empty());
    }

    #[test]
    fn intersect_conjunction() {
        let mut idx = TagBitmapIndex::default();
        idx.set(0, &tags(&[("a", "x"), ("b", "y")]));
        idx.set(1, &tags(&[("a", "x"), ("b", "z")]));
        idx.set(2, &tags(&[("a", "q"), ("b", "y")]));

        let both = idx.intersect(&tags(&[("a", "x"), ("b", "y")])).unwrap();
        assert_eq!(positions(&both), vec![0]);

        let a_only = idx.intersect(&tags(&[("a", "x")])).unwrap();
        assert_eq!(positions(&a_only), vec![0, 1]);
    }

    #[test]
    fn intersect_missing_pair_is_none() {
        let mut idx = TagBitmapIndex::default();
        idx.set(0, &tags(&[("a", "x")]));
        assert!(idx.intersect(&tags(&[("a", "nope")])).is_none());
        assert!(idx.intersect(&tags(&[("missing", "x")])).is_none());
    }

    #[test]
    fn intersect_disjoint_pairs_is_empty() {
        let mut idx = TagBitmapIndex::default();
        idx.set(0, &tags(&[("a", "x")]));
        idx.set(1, &tags(&[("b", "y")]));
        let combined = idx.intersect(&tags(&[("a", "x"), ("b", "y")])).unwrap();
        assert!(combined.is_empty());
    }

    #[test]
    fn intersect_does_not_mutate_postings() {
        let mut idx = TagBitmapIndex::default();
        idx.set(0, &tags(&[("a", "x"), ("b", "y")]));
        idx.set(1, &tags(&[("a", "x")]));
        let _ = idx.intersect(&tags(&[("a", "x"), ("b", "y")]));
        assert_eq!(positions(idx.bitmap("a", "x").unwrap()), vec![0, 1]);
    }

    #[test]
    fn rebuild_reflects_shifted_positions() {
        let mut column = MetricColumn::default();
        column.push(Sample::new(10, "m", 1.0, tags(&[("host", "s1")])));
        column.push(Sample::new(20, "m", 2.0, tags(&[("host", "s2")])));
        column.push(Sample::new(30, "m", 3.0, tags(&[("host", "s1")])));

        let mut idx = TagBitmapIndex::default();
        idx.rebuild(&column);
        assert_eq!(positions(idx.bitmap("host", "s1").unwrap()), vec![0, 2]);

        column.evict_before(15);
        idx.rebuild(&column);
        assert_eq!(positions(idx.bitmap("host", "s1").unwrap()), vec![1]);
        assert_eq!(positions(idx.bitmap("host", "s2").unwrap()), vec![0]);
    }
}
