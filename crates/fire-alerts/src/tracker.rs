//! Deduplication of already-notified alert identifiers.
//!
//! The feed re-lists every active alert on every poll until it expires, so
//! the relay remembers which identifiers it has already handled. Memory is
//! bounded by an eviction pass that drops the oldest identifiers once the
//! set grows past a high-water mark.

use std::collections::{HashSet, VecDeque};

use tracing::info;

use crate::error::{AlertError, Result};

/// Default size above which an eviction pass trims the tracker.
pub const DEFAULT_HIGH_WATER_MARK: usize = 1000;

/// Default number of identifiers kept after an eviction pass.
pub const DEFAULT_RETAIN_COUNT: usize = 500;

/// Insertion-ordered set of alert identifiers that have been notified.
#[derive(Debug, Clone)]
pub struct DedupTracker {
    /// Identifiers, oldest first.
    order: VecDeque<String>,
    /// Fast membership lookup.
    seen: HashSet<String>,
    high_water_mark: usize,
    retain_count: usize,
}

impl DedupTracker {
    /// Creates an empty tracker with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
            seen: HashSet::new(),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            retain_count: DEFAULT_RETAIN_COUNT,
        }
    }

    /// Creates an empty tracker with custom limits.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` if `retain_count` exceeds
    /// `high_water_mark`.
    pub fn with_limits(high_water_mark: usize, retain_count: usize) -> Result<Self> {
        if retain_count > high_water_mark {
            return Err(AlertError::InvalidConfig {
                reason: format!(
                    "retain_count ({retain_count}) cannot exceed high_water_mark ({high_water_mark})"
                ),
            });
        }

        Ok(Self {
            high_water_mark,
            retain_count,
            ..Self::new()
        })
    }

    /// Returns true if the identifier has not been seen.
    #[must_use]
    pub fn is_new(&self, id: &str) -> bool {
        !self.seen.contains(id)
    }

    /// Returns true if the identifier has been seen.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Records an identifier as the most recently seen.
    ///
    /// Returns `false` without changing the order if it was already present.
    pub fn mark_seen(&mut self, id: &str) -> bool {
        if !self.seen.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        true
    }

    /// Returns the number of tracked identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates identifiers from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Returns the size above which eviction trims the tracker.
    #[must_use]
    pub const fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Returns the number of identifiers kept by eviction.
    #[must_use]
    pub const fn retain_count(&self) -> usize {
        self.retain_count
    }

    /// Drops the oldest identifiers if the tracker is over its high-water mark.
    ///
    /// Keeps the `retain_count` most recently inserted identifiers and
    /// returns how many were removed.
    pub fn evict_if_oversize(&mut self) -> usize {
        if self.order.len() <= self.high_water_mark {
            return 0;
        }

        let excess = self.order.len() - self.retain_count;
        for id in self.order.drain(..excess) {
            self.seen.remove(&id);
        }

        info!(
            removed = excess,
            retained = self.order.len(),
            "evicted old alert ids from tracker"
        );

        excess
    }
}

impl Default for DedupTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tracker_is_empty() {
        let tracker = DedupTracker::new();
        assert!(tracker.is_empty());
        assert_eq!(tracker.len(), 0);
        assert_eq!(tracker.high_water_mark(), 1000);
        assert_eq!(tracker.retain_count(), 500);
    }

    #[test]
    fn unseen_id_is_new() {
        let tracker = DedupTracker::new();
        assert!(tracker.is_new("A1"));
    }

    #[test]
    fn marked_id_is_not_new() {
        let mut tracker = DedupTracker::new();
        assert!(tracker.mark_seen("A1"));
        assert!(!tracker.is_new("A1"));
        assert!(tracker.contains("A1"));
        assert!(tracker.is_new("A2"));
    }

    #[test]
    fn is_new_has_no_side_effect() {
        let tracker = DedupTracker::new();
        assert!(tracker.is_new("A1"));
        assert!(tracker.is_new("A1"));
        assert!(tracker.is_empty());
    }

    #[test]
    fn mark_seen_is_idempotent() {
        let mut tracker = DedupTracker::new();
        assert!(tracker.mark_seen("A1"));
        assert!(tracker.mark_seen("A2"));
        assert!(!tracker.mark_seen("A1"));

        assert_eq!(tracker.len(), 2);
        let order: Vec<_> = tracker.iter().collect();
        assert_eq!(order, vec!["A1", "A2"]);
    }

    #[test]
    fn invalid_limits_rejected() {
        let result = DedupTracker::with_limits(10, 11);
        assert!(matches!(result, Err(AlertError::InvalidConfig { .. })));
    }

    #[test]
    fn equal_limits_allowed() {
        let tracker = DedupTracker::with_limits(10, 10).unwrap();
        assert_eq!(tracker.high_water_mark(), 10);
        assert_eq!(tracker.retain_count(), 10);
    }

    #[test]
    fn no_eviction_at_high_water_mark() {
        let mut tracker = DedupTracker::with_limits(5, 2).unwrap();
        for i in 0..5 {
            tracker.mark_seen(&format!("id{i}"));
        }

        assert_eq!(tracker.evict_if_oversize(), 0);
        assert_eq!(tracker.len(), 5);
    }

    #[test]
    fn eviction_keeps_most_recent() {
        let mut tracker = DedupTracker::with_limits(5, 2).unwrap();
        for i in 0..6 {
            tracker.mark_seen(&format!("id{i}"));
        }

        assert_eq!(tracker.evict_if_oversize(), 4);
        let kept: Vec<_> = tracker.iter().collect();
        assert_eq!(kept, vec!["id4", "id5"]);
        assert!(tracker.is_new("id0"));
        assert!(tracker.is_new("id3"));
    }

    #[test]
    fn eviction_with_default_limits() {
        let mut tracker = DedupTracker::new();
        for i in 1..=1001 {
            tracker.mark_seen(&format!("id{i}"));
        }

        let removed = tracker.evict_if_oversize();

        assert_eq!(removed, 501);
        assert_eq!(tracker.len(), 500);
        for i in 1..=501 {
            assert!(tracker.is_new(&format!("id{i}")), "id{i} should be evicted");
        }
        for i in 502..=1001 {
            assert!(tracker.contains(&format!("id{i}")), "id{i} should be kept");
        }
        assert_eq!(tracker.iter().next(), Some("id502"));
    }

    #[test]
    fn evicted_id_can_be_seen_again() {
        let mut tracker = DedupTracker::with_limits(2, 1).unwrap();
        tracker.mark_seen("A1");
        tracker.mark_seen("A2");
        tracker.mark_seen("A3");
        tracker.evict_if_oversize();

        assert!(tracker.is_new("A1"));
        assert!(tracker.mark_seen("A1"));
        let order: Vec<_> = tracker.iter().collect();
        assert_eq!(order, vec!["A3", "A1"]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn marked_ids_are_never_new(ids in prop::collection::vec("[a-z]{1,4}", 0..64)) {
                let mut tracker = DedupTracker::new();
                for id in &ids {
                    tracker.mark_seen(id);
                }

                for id in &ids {
                    prop_assert!(!tracker.is_new(id));
                }

                let distinct: HashSet<_> = ids.iter().collect();
                prop_assert_eq!(tracker.len(), distinct.len());
                prop_assert!(tracker.is_new("UNSEEN-ID"));
            }

            #[test]
            fn eviction_retains_newest(count in 0usize..200, hwm in 1usize..50, retain_frac in 0.0f64..=1.0) {
                let retain = ((hwm as f64) * retain_frac) as usize;
                let mut tracker = DedupTracker::with_limits(hwm, retain).unwrap();
                for i in 0..count {
                    tracker.mark_seen(&format!("id{i}"));
                }

                let removed = tracker.evict_if_oversize();

                if count > hwm {
                    prop_assert_eq!(tracker.len(), retain);
                    prop_assert_eq!(removed, count - retain);
                    for i in 0..count {
                        let kept = tracker.contains(&format!("id{i}"));
                        prop_assert_eq!(kept, i >= count - retain);
                    }
                } else {
                    prop_assert_eq!(removed, 0);
                    prop_assert_eq!(tracker.len(), count);
                }
            }
        }
    }
}
