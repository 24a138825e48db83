//! Per-document generation counters for debounced decoration passes.
//!
//! Every edit bumps the document's generation. A pass remembers the
//! generation it was started for and only publishes while that generation is
//! still the latest one.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;

pub struct Debouncer<K: Eq + Hash> {
    generations: DashMap<K, u64>,
}

impl<K: Eq + Hash + Clone> Default for Debouncer<K> {
    fn default() -> Self {
        Self {
            generations: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> Debouncer<K> {
    /// Starts a new generation for `key` and returns it.
    pub fn bump(&self, key: &K) -> u64 {
        let mut entry = self.generations.entry(key.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn is_current(&self, key: &K, generation: u64) -> bool {
        self.generations
            .get(key)
            .is_some_and(|current| *current == generation)
    }

    /// Waits out `delay`, then reports whether `generation` survived it.
    pub async fn settle(&self, key: &K, generation: u64, delay: Duration) -> bool {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.is_current(key, generation)
    }

    pub fn forget(&self, key: &K) {
        self.generations.remove(key);
    }
}
