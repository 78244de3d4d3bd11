//! Parsed readings and the bounded, thread-safe reading store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize)]
/// One parsed, timestamped telemetry sample.
pub struct SensorReading {
    /// Temperature value as transmitted
    pub temperature: f64,
    /// Pressure value as transmitted
    pub pressure: f64,
    /// Speed value as transmitted
    pub speed: f64,
    /// Time of the successful parse (not carried on the wire)
    pub timestamp: DateTime<Utc>,
    /// Raw source line, kept for diagnostics
    pub raw: String,
}

#[derive(Debug, Default)]
struct StoreInner {
    latest: Option<SensorReading>,
    last_received: Option<DateTime<Utc>>,
    history: VecDeque<SensorReading>,
    rejected: u64,
}

/// Bounded, insertion-ordered store of the most recent readings.
///
/// One writer (the ingestion thread) and any number of concurrent readers.
/// The latest pointer, the last-received timestamp and the history are updated
/// under a single write lock, so a reader never sees a latest reading that is
/// not also the last element of the history. Readers get snapshot copies that
/// are unaffected by later appends.
#[derive(Debug)]
pub struct ReadingStore {
    inner: RwLock<StoreInner>,
    capacity: usize,
}

impl ReadingStore {
    /// Creates an empty store holding at most `capacity` readings.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Records a reading, evicting the oldest entry when at capacity.
    pub fn record(&self, reading: SensorReading) {
        let mut inner = self.inner.write().unwrap();
        inner.last_received = Some(reading.timestamp);
        inner.latest = Some(reading.clone());
        inner.history.push_back(reading);
        while inner.history.len() > self.capacity {
            inner.history.pop_front();
        }
    }

    /// Returns the most recent reading, or `None` if nothing has arrived yet.
    pub fn latest(&self) -> Option<SensorReading> {
        self.inner.read().unwrap().latest.clone()
    }

    /// Timestamp of the most recent successfully parsed reading.
    pub fn last_received(&self) -> Option<DateTime<Utc>> {
        self.inner.read().unwrap().last_received
    }

    /// Returns a snapshot of the last `limit` readings, oldest first.
    /// With `limit = None` the whole history is returned.
    pub fn history(&self, limit: Option<usize>) -> Vec<SensorReading> {
        let inner = self.inner.read().unwrap();
        let skip = match limit {
            Some(limit) => inner.history.len().saturating_sub(limit),
            None => 0,
        };
        inner.history.iter().skip(skip).cloned().collect()
    }

    /// Number of readings currently held.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts one rejected (unparseable) line.
    pub fn note_rejected(&self) {
        self.inner.write().unwrap().rejected += 1;
    }

    /// Number of lines dropped because they failed to parse.
    pub fn rejected(&self) -> u64 {
        self.inner.read().unwrap().rejected
    }

    /// Configured history capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn reading(speed: f64) -> SensorReading {
        SensorReading {
            temperature: 25.5,
            pressure: 101.3,
            speed,
            timestamp: Utc::now(),
            raw: format!("TEMPERATURE:25.5,PRESSURE:101.3,SPEED:{speed}"),
        }
    }

    #[test]
    fn empty_store_has_no_latest() {
        let store = ReadingStore::new(100);
        assert!(store.latest().is_none());
        assert!(store.last_received().is_none());
        assert!(store.history(None).is_empty());
    }

    #[test]
    fn latest_matches_last_history_entry() {
        let store = ReadingStore::new(100);
        for i in 0..5 {
            store.record(reading(i as f64));
        }
        let latest = store.latest().unwrap();
        let history = store.history(None);
        assert_eq!(history.len(), 5);
        assert_eq!(history.last().unwrap(), &latest);
        assert_eq!(store.last_received().unwrap(), latest.timestamp);
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let store = ReadingStore::new(3);
        for i in 0..10 {
            store.record(reading(i as f64));
        }
        let history = store.history(None);
        assert_eq!(history.len(), 3);
        let speeds: Vec<f64> = history.iter().map(|r| r.speed).collect();
        assert_eq!(speeds, vec![7.0, 8.0, 9.0]);
        assert_eq!(store.latest().unwrap().speed, 9.0);
    }

    #[test]
    fn history_limit_returns_tail() {
        let store = ReadingStore::new(100);
        for i in 0..8 {
            store.record(reading(i as f64));
        }
        let tail = store.history(Some(3));
        let speeds: Vec<f64> = tail.iter().map(|r| r.speed).collect();
        assert_eq!(speeds, vec![5.0, 6.0, 7.0]);
        // Limit larger than the history is not an error.
        assert_eq!(store.history(Some(50)).len(), 8);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_records() {
        let store = ReadingStore::new(100);
        store.record(reading(1.0));
        let snapshot = store.history(None);
        store.record(reading(2.0));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].speed, 1.0);
    }

    #[test]
    fn rejected_counter_accumulates() {
        let store = ReadingStore::new(100);
        store.note_rejected();
        store.note_rejected();
        assert_eq!(store.rejected(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_readers_never_see_torn_state() {
        let store = Arc::new(ReadingStore::new(16));
        let writer_store = Arc::clone(&store);

        let writer = thread::spawn(move || {
            for i in 0..2000 {
                writer_store.record(reading(i as f64));
            }
        });

        let mut readers = Vec::new();
        for _ in 0..4 {
            let reader_store = Arc::clone(&store);
            readers.push(thread::spawn(move || {
                for _ in 0..500 {
                    let history = reader_store.history(None);
                    let latest = reader_store.latest();
                    if let Some(last) = history.last() {
                        // The latest pointer can only be the last history
                        // element or a newer one recorded after the snapshot.
                        let latest = latest.expect("history non-empty but no latest");
                        assert!(latest.speed >= last.speed);
                    }
                    let within = reader_store.history(None);
                    assert!(within.len() <= reader_store.capacity());
                }
            }));
        }

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(store.len(), 16);
        assert_eq!(store.latest().unwrap().speed, 1999.0);
    }
}
