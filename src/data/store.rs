//! Capacity-bounded, time-ordered sample buffer owned by one source.

use std::collections::VecDeque;

use crate::data::sample::Sample;

/// Hard retention cap of a store.
pub const DEFAULT_CAPACITY: usize = 50_000;
/// Number of most recent samples drawn by the charts.
pub const DEFAULT_PLOT_WINDOW: usize = 400;
/// Number of most recent samples shown in the history table.
pub const DEFAULT_HISTORY_WINDOW: usize = 500;

/// Sizes governing one [`SampleStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub capacity: usize,
    pub plot_window: usize,
    pub history_window: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            plot_window: DEFAULT_PLOT_WINDOW,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// Ordered buffer of samples, most recent first.
///
/// Internally samples are kept chronologically in a `VecDeque` so that the common case
/// (a new sample newer than everything stored) appends in O(1) and eviction of the oldest
/// entries pops from the front. All public iteration is most-recent-first, so readers
/// only ever see non-increasing instants. Among equal instants the later insertion comes
/// first.
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    chrono: VecDeque<Sample>,
    limits: StoreLimits,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::with_limits(StoreLimits::default())
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            chrono: VecDeque::new(),
            limits,
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.chrono.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chrono.is_empty()
    }

    /// Insert one sample, keep the order and enforce the retention cap.
    pub fn insert(&mut self, sample: Sample) {
        let at = self
            .chrono
            .partition_point(|s| s.instant <= sample.instant);
        self.chrono.insert(at, sample);
        self.evict();
    }

    /// Insert many samples, reordering and trimming once.
    ///
    /// The result is identical to calling [`insert`](Self::insert) for each sample in turn.
    pub fn insert_batch<I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        let before = self.chrono.len();
        self.chrono.extend(samples);
        if self.chrono.len() == before {
            return;
        }
        let start = before.saturating_sub(1);
        let already_sorted = self
            .chrono
            .range(start..)
            .zip(self.chrono.range(start + 1..))
            .all(|(a, b)| a.instant <= b.instant);
        if !already_sorted {
            // stable: equal instants keep insertion order
            self.chrono
                .make_contiguous()
                .sort_by(|a, b| a.instant.cmp(&b.instant));
        }
        self.evict();
    }

    fn evict(&mut self) {
        let excess = self.chrono.len().saturating_sub(self.limits.capacity);
        if excess > 0 {
            self.chrono.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.chrono.clear();
    }

    /// All retained samples, most recent first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> + ExactSizeIterator + '_ {
        self.chrono.iter().rev()
    }

    /// The most recent sample, if any.
    pub fn latest(&self) -> Option<&Sample> {
        self.chrono.back()
    }

    /// Most recent `plot_window` samples in chronological (ascending) order.
    pub fn plot_window(&self) -> Vec<&Sample> {
        let start = self.chrono.len().saturating_sub(self.limits.plot_window);
        self.chrono.range(start..).collect()
    }

    /// Most recent `history_window` samples, most recent first.
    pub fn history_window(&self) -> Vec<&Sample> {
        self.iter().take(self.limits.history_window).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Sample {
        let instant = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        Sample {
            ts: instant.to_rfc3339(),
            instant,
            x: secs as f64,
            y: 0.0,
            z: 0.0,
            temperature: None,
        }
    }

    fn secs(store: &SampleStore) -> Vec<i64> {
        store.iter().map(|s| s.x as i64).collect()
    }

    #[test]
    fn keeps_descending_order() {
        let mut store = SampleStore::new();
        for s in [5, 3, 9, 1] {
            store.insert(at(s));
        }
        assert_eq!(secs(&store), vec![9, 5, 3, 1]);
    }

    #[test]
    fn plot_window_is_chronological() {
        let mut store = SampleStore::new();
        store.insert_batch([5, 3, 9, 1].map(at));
        let xs: Vec<i64> = store.plot_window().iter().map(|s| s.x as i64).collect();
        assert_eq!(xs, vec![1, 3, 5, 9]);
    }

    #[test]
    fn windows_are_bounded() {
        let mut store = SampleStore::with_limits(StoreLimits {
            capacity: 100,
            plot_window: 10,
            history_window: 20,
        });
        store.insert_batch((0..50).map(at));
        let plot = store.plot_window();
        assert_eq!(plot.len(), 10);
        assert_eq!(plot.first().unwrap().x, 40.0);
        assert_eq!(plot.last().unwrap().x, 49.0);
        let hist = store.history_window();
        assert_eq!(hist.len(), 20);
        assert_eq!(hist[0].x, 49.0);
        assert_eq!(hist[19].x, 30.0);
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut store = SampleStore::with_limits(StoreLimits {
            capacity: 3,
            ..StoreLimits::default()
        });
        for s in [10, 1, 7, 4, 12] {
            store.insert(at(s));
        }
        assert_eq!(secs(&store), vec![12, 10, 7]);
        // an old sample arriving late is evicted straight away
        store.insert(at(0));
        assert_eq!(secs(&store), vec![12, 10, 7]);
    }

    #[test]
    fn batch_matches_sequential_inserts() {
        let input = [8, 2, 2, 15, 4, 8, 1, 30, 3];
        let limits = StoreLimits {
            capacity: 6,
            ..StoreLimits::default()
        };
        let mut seq = SampleStore::with_limits(limits);
        let mut batch = SampleStore::with_limits(limits);
        seq.insert(at(20));
        batch.insert(at(20));
        for (i, s) in input.iter().enumerate() {
            let mut sample = at(*s);
            sample.y = i as f64;
            seq.insert(sample);
        }
        batch.insert_batch(input.iter().enumerate().map(|(i, s)| {
            let mut sample = at(*s);
            sample.y = i as f64;
            sample
        }));
        let a: Vec<_> = seq.iter().map(|s| (s.x, s.y)).collect();
        let b: Vec<_> = batch.iter().map(|s| (s.x, s.y)).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn equal_instants_latest_insertion_first() {
        let mut store = SampleStore::new();
        let mut a = at(1);
        a.y = 1.0;
        let mut b = at(1);
        b.y = 2.0;
        store.insert(a);
        store.insert(b);
        let ys: Vec<f64> = store.iter().map(|s| s.y).collect();
        assert_eq!(ys, vec![2.0, 1.0]);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut store = SampleStore::new();
        store.insert_batch(std::iter::empty());
        assert!(store.is_empty());
        assert!(store.plot_window().is_empty());
        assert!(store.latest().is_none());
    }
}
