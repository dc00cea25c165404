//! Cross-domain call counters.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// An ordered `(from, to)` domain pair.
pub type CallPair = (String, String);

/// Counts calls between distinct domains.
///
/// Increments for an already-seen pair take only the read lock; the write
/// lock is needed once per new pair.
#[derive(Debug, Default)]
pub struct CrossDomainCalls {
    counts: RwLock<HashMap<CallPair, AtomicU64>>,
}

impl CrossDomainCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one call. Same-domain calls are ignored.
    pub fn track(&self, from: &str, to: &str) {
        if from == to {
            return;
        }

        {
            let counts = self.counts.read();
            if let Some(count) = counts.get(&(from.to_string(), to.to_string())) {
                count.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }

        let mut counts = self.counts.write();
        counts
            .entry((from.to_string(), to.to_string()))
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of calls recorded for a pair.
    pub fn count(&self, from: &str, to: &str) -> u64 {
        self.counts
            .read()
            .get(&(from.to_string(), to.to_string()))
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    /// Returns a sorted snapshot of all counters.
    pub fn snapshot(&self) -> BTreeMap<CallPair, u64> {
        self.counts
            .read()
            .iter()
            .map(|(pair, count)| (pair.clone(), count.load(Ordering::Relaxed)))
            .collect()
    }

    /// Clears all counters.
    pub fn reset(&self) {
        self.counts.write().clear();
    }
}
