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
    error::{Error, Result},
};
use spillover_storage::PersistedStore;

use crate::stats::Statistics;

/// Outcome of a disk tier lookup.
///
/// `NotFound` only steers the read path to the value producer. It never leaves the crate.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup<V> {
    Found(V),
    NotFound,
}

/// The read path below a memory tier miss.
///
/// A persisted entry is promoted: its file is deleted before the value is handed to the memory tier for
/// insertion, so the value is never resident in both tiers. Without a persisted entry, the caller's producer runs.
pub(crate) struct FallbackLoader<K, V> {
    store: Arc<PersistedStore<K, V>>,
    stats: Arc<Statistics>,
}

impl<K, V> FallbackLoader<K, V>
where
    K: Key,
    V: StorageValue,
{
    pub(crate) fn new(store: Arc<PersistedStore<K, V>>, stats: Arc<Statistics>) -> Self {
        Self { store, stats }
    }

    /// Take the persisted entry of the key out of the disk tier.
    ///
    /// A key that cannot be mapped to a path has no persisted entry. A corrupt entry, or an entry that cannot be
    /// deleted, fails the lookup.
    pub(crate) fn load_persisted(&self, key: &K) -> Result<Lookup<V>> {
        let value = match self.store.read(key) {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(Lookup::NotFound),
            Err(e) if e.is_invalid_key_path() => {
                tracing::trace!("[fallback loader]: key {:?} has no valid path: {}", key, e);
                return Ok(Lookup::NotFound);
            }
            Err(e) => return Err(e),
        };

        // The entry may be deleted concurrently, the value read is still valid.
        self.store.delete(key)?;
        self.stats.record_disk_hit();
        tracing::debug!("[fallback loader]: promote persisted entry {:?}", key);
        Ok(Lookup::Found(value))
    }

    /// Take the persisted entry of the key out of the disk tier, or produce the value if there is none.
    ///
    /// `producer` runs at most once, and its failure is returned as [`Error::Load`].
    pub(crate) fn load_or_produce<F, E>(&self, key: &K, producer: F) -> Result<V>
    where
        F: FnOnce() -> std::result::Result<V, E>,
        E: Into<anyhow::Error>,
    {
        match self.load_persisted(key)? {
            Lookup::Found(value) => Ok(value),
            Lookup::NotFound => {
                self.stats.record_miss();
                let res = producer().map_err(Error::load);
                self.stats.record_load(res.is_ok());
                if let Err(e) = &res {
                    tracing::debug!("[fallback loader]: value producer failed for key {:?}: {}", key, e);
                }
                res
            }
        }
    }
}
