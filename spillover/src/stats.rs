//  Copyright 2026 spillover Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of a persisting cache.
#[derive(Debug, Default)]
pub(crate) struct Statistics {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    write_backs: AtomicU64,
    write_back_failures: AtomicU64,
}

impl Statistics {
    pub(crate) fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self, success: bool) {
        self.loads.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.load_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_write_back(&self, success: bool) {
        if success {
            self.write_backs.fetch_add(1, Ordering::Relaxed);
        } else {
            self.write_back_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            write_backs: self.write_backs.load(Ordering::Relaxed),
            write_back_failures: self.write_back_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of the counters of a persisting cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by the memory tier.
    pub memory_hits: u64,
    /// Lookups answered by promoting a persisted entry.
    pub disk_hits: u64,
    /// Lookups that found the key in neither tier.
    pub misses: u64,
    /// Calls to a value producer or cache loader.
    pub loads: u64,
    /// Calls to a value producer or cache loader that failed.
    pub load_failures: u64,
    /// Evicted entries written to the disk tier.
    pub write_backs: u64,
    /// Evicted entries that could not be written to the disk tier and are lost.
    pub write_back_failures: u64,
}

impl CacheStats {
    /// Number of lookups.
    pub fn requests(&self) -> u64 {
        self.memory_hits + self.disk_hits + self.misses
    }

    /// Ratio of lookups answered by either tier. `1.0` if there was no lookup.
    pub fn hit_ratio(&self) -> f64 {
        match self.requests() {
            0 => 1.0,
            requests => (self.memory_hits + self.disk_hits) as f64 / requests as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = Statistics::default();
        assert_eq!(stats.snapshot().hit_ratio(), 1.0);

        stats.record_memory_hit();
        stats.record_disk_hit();
        stats.record_disk_hit();
        stats.record_miss();
        stats.record_load(true);
        stats.record_load(false);
        stats.record_write_back(true);
        stats.record_write_back(false);

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot,
            CacheStats {
                memory_hits: 1,
                disk_hits: 2,
                misses: 1,
                loads: 2,
                load_failures: 1,
                write_backs: 1,
                write_back_failures: 1,
            }
        );
        assert_eq!(snapshot.requests(), 4);
        assert_eq!(snapshot.hit_ratio(), 0.75);
    }
}
