//! Fixed-capacity rolling history for one variable.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use opcsim_types::{HistoryEntry, TagValue};

/// Number of samples kept per variable unless configured otherwise.
pub const HISTORY_CAPACITY: usize = 100;

/// FIFO log of `(timestamp, value)` samples.
///
/// Appending beyond capacity evicts the oldest samples, so the buffer
/// always holds the most recent `capacity` entries in chronological order.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create an empty buffer. A zero capacity is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a sample, evicting the oldest ones past capacity.
    pub fn append(&mut self, timestamp: DateTime<Utc>, value: TagValue) {
        self.entries.push_back(HistoryEntry { timestamp, value });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Copy of all samples, most recent last.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of samples held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no sample has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of samples held.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn keeps_last_hundred_in_order() {
        let start = Utc::now();
        let mut buffer = HistoryBuffer::default();
        for i in 0..150_i32 {
            buffer.append(
                start + TimeDelta::seconds(i64::from(i)),
                TagValue::Numeric(f64::from(i)),
            );
            assert!(buffer.len() <= HISTORY_CAPACITY);
        }

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), HISTORY_CAPACITY);
        assert_eq!(snapshot.first().map(|e| e.value.clone()), Some(TagValue::Numeric(50.0)));
        assert_eq!(snapshot.last().map(|e| e.value.clone()), Some(TagValue::Numeric(149.0)));
        assert!(snapshot.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn small_capacity_evicts_oldest() {
        let now = Utc::now();
        let mut buffer = HistoryBuffer::with_capacity(2);
        buffer.append(now, TagValue::from("a"));
        buffer.append(now, TagValue::from("b"));
        buffer.append(now, TagValue::from("c"));
        let values: Vec<_> = buffer.snapshot().into_iter().map(|e| e.value).collect();
        assert_eq!(values, vec![TagValue::from("b"), TagValue::from("c")]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let buffer = HistoryBuffer::with_capacity(0);
        assert_eq!(buffer.capacity(), 1);
        assert!(buffer.is_empty());
    }
}
