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

use std::sync::Arc;

use spillover_common::{
    code::{Key, StorageValue},
    event::{RemovalEvent, RemovalListener},
};
use spillover_storage::PersistedStore;

use crate::stats::Statistics;

/// Observes removals from the memory tier and writes evicted entries back to the disk tier.
///
/// An entry is written back if its removal cause is persistence relevant and the path mapper does not exclude its
/// key. Write-back failures are logged and dropped: the removal path of the memory tier never fails.
///
/// The caller's listener, if any, is notified of every removal whose value does not land on disk, so it sees each
/// logical removal once.
pub(crate) struct EvictionBridge<K, V> {
    store: Arc<PersistedStore<K, V>>,
    listener: Option<Arc<dyn RemovalListener<K, V>>>,
    stats: Arc<Statistics>,
}

impl<K, V> EvictionBridge<K, V>
where
    K: Key,
    V: StorageValue,
{
    pub(crate) fn new(
        store: Arc<PersistedStore<K, V>>,
        listener: Option<Arc<dyn RemovalListener<K, V>>>,
        stats: Arc<Statistics>,
    ) -> Self {
        Self { store, listener, stats }
    }

    /// Returns whether the value is on disk.
    fn write_back(&self, key: &K, value: &V) -> bool {
        match self.store.write(key, value) {
            Ok(()) => {
                self.stats.record_write_back(true);
                tracing::trace!("[eviction bridge]: wrote back evicted entry {:?}", key);
                true
            }
            Err(e) => {
                self.stats.record_write_back(false);
                tracing::warn!("[eviction bridge]: failed to write back evicted entry {:?}, drop it: {}", key, e);
                false
            }
        }
    }
}

impl<K, V> RemovalListener<K, V> for EvictionBridge<K, V>
where
    K: Key,
    V: StorageValue,
{
    fn on_removal(&self, event: RemovalEvent<K, V>) {
        let persisted = event.cause().is_persistence_relevant()
            && self.store.should_persist(event.key())
            && event.value().is_some_and(|value| self.write_back(event.key(), value));

        if !persisted {
            if let Some(listener) = &self.listener {
                listener.on_removal(event);
            }
        }
    }
}
