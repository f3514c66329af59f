//! Bounded, FIFO-evicting reading series.
//!
//! A [`BoundedSeries`] holds the most recent `capacity` readings of one stream
//! in arrival order. Appending past capacity evicts from the front; nothing is
//! compacted or downsampled, the discarded tail is simply gone.
//!
//! # Example
//!
//! ```rust
//! use vitals::schema::PayloadKind;
//! use vitals::series::BoundedSeries;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let series = BoundedSeries::new(3, PayloadKind::Numeric);
//! assert!(series.is_empty());
//!
//! // An empty series reports the sentinel instead of failing.
//! assert!(series.latest().is_sentinel());
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;

use crate::reading::Reading;
use crate::schema::PayloadKind;

/// Capacity-limited ordered sequence of readings, oldest first.
///
/// Invariant: `len() <= capacity()` at all times.
#[derive(Debug, Clone)]
pub struct BoundedSeries {
    /// Fixed at construction.
    capacity: usize,
    /// Determines the empty sentinel.
    kind: PayloadKind,
    /// Oldest at the front.
    items: VecDeque<Reading>,
}

impl BoundedSeries {
    /// Creates an empty series.
    ///
    /// A capacity of zero is treated as one; stream configuration rejects zero
    /// before it gets here.
    pub fn new(capacity: usize, kind: PayloadKind) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            kind,
            items: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Rebuilds a series from previously persisted readings.
    ///
    /// If more readings were persisted than `capacity` allows (e.g. capacity
    /// was lowered between runs), only the newest are kept.
    pub fn from_readings<I>(capacity: usize, kind: PayloadKind, readings: I) -> Self
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut series = Self::new(capacity, kind);
        for reading in readings {
            series.append(reading);
        }
        series
    }

    /// Appends a reading, evicting the oldest while over capacity.
    pub fn append(&mut self, reading: Reading) {
        self.items.push_back(reading);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// The newest reading, or the sentinel if none has arrived yet.
    pub fn latest(&self) -> Reading {
        self.items
            .back()
            .cloned()
            .unwrap_or_else(|| Reading::sentinel(self.kind))
    }

    /// The newest reading, if any.
    pub fn last(&self) -> Option<&Reading> {
        self.items.back()
    }

    /// The most recent `min(n, len)` readings in arrival order.
    ///
    /// `None` returns everything retained.
    pub fn window(&self, n: Option<usize>) -> Vec<Reading> {
        let take = n.map_or(self.items.len(), |n| n.min(self.items.len()));
        let skip = self.items.len() - take;
        self.items.iter().skip(skip).cloned().collect()
    }

    /// Iterates over all retained readings, oldest first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Reading> {
        self.items.iter()
    }

    /// Number of readings retained.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no reading has been retained.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of readings retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Payload kind of this series.
    pub fn kind(&self) -> PayloadKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn numeric(v: i64) -> Reading {
        Reading::stamp(Value::from(v))
    }

    fn values(readings: &[Reading]) -> Vec<i64> {
        readings.iter().filter_map(|r| r.value.as_i64()).collect()
    }

    #[test]
    fn test_empty_series() {
        let series = BoundedSeries::new(10, PayloadKind::Numeric);

        assert!(series.is_empty());
        assert_eq!(series.len(), 0);
        assert!(series.last().is_none());
        assert!(series.latest().is_sentinel());
        assert_eq!(series.latest().value, Value::from(0));
        assert!(series.window(None).is_empty());
        assert!(series.window(Some(5)).is_empty());
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut series = BoundedSeries::new(3, PayloadKind::Numeric);
        for v in 1..=4 {
            series.append(numeric(v));
        }

        assert_eq!(series.len(), 3);
        assert_eq!(values(&series.window(None)), vec![2, 3, 4]);
        assert_eq!(series.latest().value, Value::from(4));
    }

    #[test]
    fn test_length_is_min_of_appends_and_capacity() {
        for capacity in [1usize, 2, 5, 17] {
            for appends in 0..40usize {
                let mut series = BoundedSeries::new(capacity, PayloadKind::Numeric);
                let all: Vec<i64> = (0..appends).map(|v| i64::try_from(v).unwrap()).collect();
                for &v in &all {
                    series.append(numeric(v));
                }

                let window = series.window(None);
                let expected_len = appends.min(capacity);
                assert_eq!(window.len(), expected_len);
                assert_eq!(values(&window), all[appends - expected_len..].to_vec());
            }
        }
    }

    #[test]
    fn test_window_limits() {
        let mut series = BoundedSeries::new(10, PayloadKind::Numeric);
        for v in 0..6 {
            series.append(numeric(v));
        }

        assert_eq!(values(&series.window(Some(2))), vec![4, 5]);
        assert_eq!(values(&series.window(Some(100))), vec![0, 1, 2, 3, 4, 5]);
        assert!(series.window(Some(0)).is_empty());
    }

    #[test]
    fn test_from_readings_trims_to_capacity() {
        let readings: Vec<Reading> = (0..10).map(numeric).collect();
        let series = BoundedSeries::from_readings(4, PayloadKind::Numeric, readings);

        assert_eq!(series.capacity(), 4);
        assert_eq!(values(&series.window(None)), vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_structured_sentinel() {
        let series = BoundedSeries::new(5, PayloadKind::Structured);
        assert!(series.latest().value.is_null());
        assert_eq!(series.kind(), PayloadKind::Structured);
    }
}
