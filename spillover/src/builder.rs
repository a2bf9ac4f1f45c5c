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

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use spillover_common::{
    code::{Key, StorageValue},
    error::{Error, Result},
    event::RemovalListener,
};
use spillover_memory::{EvictionPolicy, MemoryTierBuilder, Weigher};
use spillover_storage::{KeyPathMapper, PathMapper, PersistedStoreBuilder};

use crate::{
    bridge::EvictionBridge,
    cache::{Inner, PersistingCache},
    loader::FallbackLoader,
    loading::{CacheLoader, LoadingPersistingCache},
    stats::Statistics,
};

/// Longest expiry the memory tier accepts.
const MAX_EXPIRY: Duration = Duration::from_secs(1000 * 365 * 24 * 3600);

/// Persisting cache builder.
pub struct PersistingCacheBuilder<K, V, M = KeyPathMapper> {
    name: String,
    max_capacity: u64,
    initial_capacity: Option<usize>,
    weigher: Option<Arc<dyn Weigher<K, V>>>,
    time_to_live: Option<Duration>,
    time_to_idle: Option<Duration>,
    eviction_policy: EvictionPolicy,
    listener: Option<Arc<dyn RemovalListener<K, V>>>,
    dir: Option<PathBuf>,
    mapper: M,
    sync: bool,
}

impl<K, V> PersistingCacheBuilder<K, V, KeyPathMapper> {
    /// Create a persisting cache builder with the capacity of the memory tier.
    ///
    /// The capacity is an entry count, or a total weight if a weigher is set. The disk tier is unbounded.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            name: "spillover".to_string(),
            max_capacity,
            initial_capacity: None,
            weigher: None,
            time_to_live: None,
            time_to_idle: None,
            eviction_policy: EvictionPolicy::default(),
            listener: None,
            dir: None,
            mapper: KeyPathMapper,
            sync: false,
        }
    }
}

impl<K, V, M> PersistingCacheBuilder<K, V, M>
where
    K: Key,
    V: StorageValue,
    M: PathMapper<K>,
{
    /// Set the name of the cache.
    ///
    /// Default: `spillover`.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the capacity of the memory tier.
    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Set the initial capacity of the memory tier index.
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = Some(initial_capacity);
        self
    }

    /// Set the weigher of the memory tier. The capacity becomes the total weight of the resident entries.
    ///
    /// Default: every entry weighs 1.
    pub fn with_weigher(mut self, weigher: impl Weigher<K, V>) -> Self {
        self.weigher = Some(Arc::new(weigher));
        self
    }

    /// Set how long an entry stays in memory after it is written. Expired entries are written back to disk.
    ///
    /// Default: no expiry.
    pub fn with_time_to_live(mut self, time_to_live: Duration) -> Self {
        self.time_to_live = Some(time_to_live);
        self
    }

    /// Set how long an entry stays in memory after it is last accessed. Expired entries are written back to disk.
    ///
    /// Default: no expiry.
    pub fn with_time_to_idle(mut self, time_to_idle: Duration) -> Self {
        self.time_to_idle = Some(time_to_idle);
        self
    }

    /// Set the eviction algorithm of the memory tier.
    ///
    /// Default: [`EvictionPolicy::Lru`].
    pub fn with_eviction_policy(mut self, eviction_policy: EvictionPolicy) -> Self {
        self.eviction_policy = eviction_policy;
        self
    }

    /// Set the removal listener.
    ///
    /// The listener is notified of every removal whose value is not written to disk, and of invalidations of
    /// persisted entries.
    ///
    /// Default: No removal listener installed.
    pub fn with_removal_listener(mut self, listener: Arc<dyn RemovalListener<K, V>>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Set the directory evicted entries are persisted to.
    ///
    /// The directory must not be shared with another cache. Entries found there are reachable from the new cache.
    ///
    /// Default: a fresh temporary directory, removed when the last handle of the cache is dropped.
    pub fn with_persistence_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().into());
        self
    }

    /// Set the mapping from keys to entry file paths.
    ///
    /// Default: [`KeyPathMapper`].
    pub fn with_path_mapper<OM>(self, mapper: OM) -> PersistingCacheBuilder<K, V, OM>
    where
        OM: PathMapper<K>,
    {
        PersistingCacheBuilder {
            name: self.name,
            max_capacity: self.max_capacity,
            initial_capacity: self.initial_capacity,
            weigher: self.weigher,
            time_to_live: self.time_to_live,
            time_to_idle: self.time_to_idle,
            eviction_policy: self.eviction_policy,
            listener: self.listener,
            dir: self.dir,
            mapper,
            sync: self.sync,
        }
    }

    /// Set whether every write-back is synced to the device.
    ///
    /// Default: `false`.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Build the persisting cache with the given configuration.
    pub fn build(self) -> Result<PersistingCache<K, V>> {
        for (option, duration) in [("time to live", self.time_to_live), ("time to idle", self.time_to_idle)] {
            if duration.is_some_and(|duration| duration > MAX_EXPIRY) {
                return Err(Error::config(format!("{option} must not exceed 1000 years")));
            }
        }

        let (dir, temp_dir) = match self.dir {
            Some(dir) => (dir, None),
            None => {
                let temp_dir = tempfile::Builder::new()
                    .prefix("spillover-")
                    .tempdir()
                    .map_err(|e| Error::io(std::env::temp_dir(), e))?;
                (temp_dir.path().to_path_buf(), Some(temp_dir))
            }
        };

        let store = Arc::new(
            PersistedStoreBuilder::new(&dir, self.mapper)
                .with_sync(self.sync)
                .build()?,
        );
        let stats = Arc::new(Statistics::default());

        let bridge = EvictionBridge::new(store.clone(), self.listener.clone(), stats.clone());
        let mut memory = MemoryTierBuilder::new(self.max_capacity)
            .with_name(&self.name)
            .with_eviction_policy(self.eviction_policy)
            .with_removal_listener(Arc::new(bridge));
        if let Some(initial_capacity) = self.initial_capacity {
            memory = memory.with_initial_capacity(initial_capacity);
        }
        if let Some(weigher) = self.weigher {
            memory = memory.with_weigher(move |key: &K, value: &V| weigher(key, value));
        }
        if let Some(time_to_live) = self.time_to_live {
            memory = memory.with_time_to_live(time_to_live);
        }
        if let Some(time_to_idle) = self.time_to_idle {
            memory = memory.with_time_to_idle(time_to_idle);
        }
        let memory = memory.build();

        tracing::info!(
            "[persisting cache]: cache {} is ready, memory capacity: {}, persistence dir: {:?}",
            self.name,
            self.max_capacity,
            dir
        );

        Ok(PersistingCache::new(Inner {
            name: self.name,
            memory,
            loader: FallbackLoader::new(store.clone(), stats.clone()),
            store,
            listener: self.listener,
            stats,
            _temp_dir: temp_dir,
        }))
    }

    /// Build a loading persisting cache that produces missing values with the loader.
    pub fn build_with_loader(self, loader: impl CacheLoader<K, V>) -> Result<LoadingPersistingCache<K, V>> {
        let cache = self.build()?;
        Ok(LoadingPersistingCache::new(cache, Arc::new(loader)))
    }
}
