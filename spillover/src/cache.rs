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

use std::{fmt::Debug, path::Path, sync::Arc};

use spillover_common::{
    code::{Key, StorageValue},
    error::Result,
    event::{RemovalEvent, RemovalListener},
};
use spillover_memory::MemoryTier;
use spillover_storage::PersistedStore;
use tempfile::TempDir;

use crate::{
    loader::{FallbackLoader, Lookup},
    stats::{CacheStats, Statistics},
};

pub(crate) struct Inner<K, V> {
    pub(crate) name: String,
    pub(crate) memory: MemoryTier<K, V>,
    pub(crate) store: Arc<PersistedStore<K, V>>,
    pub(crate) loader: FallbackLoader<K, V>,
    pub(crate) listener: Option<Arc<dyn RemovalListener<K, V>>>,
    pub(crate) stats: Arc<Statistics>,
    /// Removed after the tiers above are dropped.
    pub(crate) _temp_dir: Option<TempDir>,
}

/// A bounded in-memory cache that overflows to disk.
///
/// Entries evicted from the memory tier for capacity or expiry are written to one file per key below the
/// persistence directory. A lookup that misses in memory falls back to disk, and a disk hit is promoted back into
/// memory and deleted from disk. Entries the caller invalidates or overwrites are never written back.
///
/// The cache is cheap to clone. Clones share both tiers.
///
/// # Example
///
/// ```
/// use spillover::{PersistingCache, PersistingCacheBuilder};
///
/// let cache: PersistingCache<String, String> = PersistingCacheBuilder::new(1).build().unwrap();
///
/// cache.put("key0".to_string(), "value0".to_string()).unwrap();
/// cache.put("key1".to_string(), "value1".to_string()).unwrap();
///
/// // `key0` has been evicted to disk and is promoted back.
/// assert_eq!(cache.get_if_present(&"key0".to_string()).unwrap(), Some("value0".to_string()));
/// assert_eq!(cache.size(), 2);
/// ```
pub struct PersistingCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for PersistingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Debug for PersistingCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistingCache")
            .field("name", &self.inner.name)
            .field("memory", &self.inner.memory)
            .field("store", &self.inner.store)
            .finish()
    }
}

impl<K, V> PersistingCache<K, V>
where
    K: Key,
    V: StorageValue,
{
    pub(crate) fn new(inner: Inner<K, V>) -> Self {
        Self { inner: Arc::new(inner) }
    }

    pub(crate) fn statistics(&self) -> &Statistics {
        &self.inner.stats
    }

    /// Name of the cache.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Access the memory tier.
    pub fn memory(&self) -> &MemoryTier<K, V> {
        &self.inner.memory
    }

    /// Access the disk tier.
    pub fn persisted(&self) -> &PersistedStore<K, V> {
        &self.inner.store
    }

    /// The directory the disk tier persists entries to.
    pub fn persistence_dir(&self) -> &Path {
        self.inner.store.root()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    /// Get the value of the key from either tier.
    ///
    /// A value found on disk is promoted to the memory tier. Returns `Ok(None)` if the key is in neither tier, and
    /// fails if a persisted entry exists but cannot be read or removed.
    pub fn get_if_present(&self, key: &K) -> Result<Option<V>> {
        if let Some(value) = self.inner.memory.get(key) {
            self.inner.stats.record_memory_hit();
            return Ok(Some(value));
        }

        // Flush pending evictions, so a value that just left memory is found on disk.
        self.inner.memory.run_pending_tasks();

        let mut failure = None;
        let value = self.inner.memory.get_or_insert_with_opt(key.clone(), || {
            match self.inner.loader.load_persisted(key) {
                Ok(Lookup::Found(value)) => Some(value),
                Ok(Lookup::NotFound) => None,
                Err(e) => {
                    failure = Some(e);
                    None
                }
            }
        });

        if let Some(e) = failure {
            tracing::warn!("[persisting cache]: failed to load persisted entry {:?}: {}", key, e);
            return Err(e);
        }
        if value.is_none() {
            self.inner.stats.record_miss();
        }
        Ok(value)
    }

    /// Get the value of the key from either tier, or insert the value `producer` returns.
    ///
    /// `producer` runs at most once per call, and only if the key is in neither tier. Concurrent calls for the same
    /// key are coalesced by the memory tier. A failed producer is reported as
    /// [`Error::Load`](spillover_common::error::Error::Load).
    pub fn get_with<F, E>(&self, key: K, producer: F) -> Result<V>
    where
        F: FnOnce() -> std::result::Result<V, E>,
        E: Into<anyhow::Error>,
    {
        if let Some(value) = self.inner.memory.get(&key) {
            self.inner.stats.record_memory_hit();
            return Ok(value);
        }

        self.inner.memory.run_pending_tasks();

        self.inner
            .memory
            .get_or_try_insert_with(key.clone(), || self.inner.loader.load_or_produce(&key, producer))
            .map_err(Arc::unwrap_or_clone)
    }

    /// Get the values of the keys that are present in either tier.
    pub fn get_all_present<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Result<Vec<(K, V)>> {
        let mut present = vec![];
        for key in keys {
            if let Some(value) = self.get_if_present(key)? {
                present.push((key.clone(), value));
            }
        }
        Ok(present)
    }

    /// Check if the key is in either tier, without promoting it.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.memory.contains(key) || self.inner.store.contains(key)
    }

    /// Insert or replace the value of the key in the memory tier.
    ///
    /// A persisted entry of the key is stale and is deleted first. Fails if it cannot be deleted.
    pub fn put(&self, key: K, value: V) -> Result<()> {
        // Write back pending evictions before the stale entry is looked for.
        self.inner.memory.run_pending_tasks();

        match self.inner.store.delete(&key) {
            Ok(true) => tracing::debug!("[persisting cache]: drop stale persisted entry {:?}", key),
            Ok(false) => {}
            Err(e) if e.is_invalid_key_path() => {}
            Err(e) => return Err(e),
        }

        self.inner.memory.insert(key, value);
        Ok(())
    }

    /// Insert or replace the values of the keys.
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Remove the key from both tiers.
    ///
    /// The removal listener is notified once, whichever tier held the value. Fails if the persisted entry cannot be
    /// deleted.
    pub fn invalidate(&self, key: &K) -> Result<()> {
        self.inner.memory.invalidate(key);

        if let Some(listener) = &self.inner.listener {
            match self.inner.store.read(key) {
                Ok(Some(value)) => listener.on_removal(RemovalEvent::explicit(key.clone(), value)),
                Ok(None) => {}
                Err(e) if e.is_invalid_key_path() => return Ok(()),
                Err(e) => tracing::warn!(
                    "[persisting cache]: failed to read persisted entry {:?} for the removal listener: {}",
                    key,
                    e
                ),
            }
        }

        match self.inner.store.delete(key) {
            Ok(_) => Ok(()),
            Err(e) if e.is_invalid_key_path() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Remove the keys from both tiers.
    ///
    /// Stops at the first key whose persisted entry cannot be deleted.
    pub fn invalidate_keys<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Result<()> {
        for key in keys {
            self.invalidate(key)?;
        }
        Ok(())
    }

    /// Remove every entry from both tiers.
    ///
    /// Unlike [`PersistingCache::invalidate`] and [`PersistingCache::invalidate_keys`], this does **not** notify the
    /// removal listener once per removed entry. The listener sees the entries resident in memory only. Persisted
    /// entries are deleted without notification, since a key cannot be recovered from its entry file name.
    ///
    /// To observe every removal, invalidate the known keys with [`PersistingCache::invalidate_keys`] instead.
    pub fn invalidate_all(&self) -> Result<()> {
        self.inner.memory.invalidate_all();
        self.inner.store.delete_all()
    }

    /// Number of entries in both tiers.
    ///
    /// The two tiers are counted one after the other, so the sum may be off while other threads mutate the cache.
    pub fn size(&self) -> u64 {
        self.inner.memory.run_pending_tasks();
        self.inner.memory.entry_count() + self.inner.store.count() as u64
    }

    /// Run the pending maintenance of the memory tier, writing back entries that have expired.
    pub fn clean_up(&self) {
        self.inner.memory.run_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use spillover_common::error::Error;

    use super::*;
    use crate::PersistingCacheBuilder;

    fn cache(dir: &Path, capacity: u64) -> PersistingCache<String, String> {
        PersistingCacheBuilder::new(capacity)
            .with_persistence_dir(dir)
            .build()
            .unwrap()
    }

    fn kv(i: usize) -> (String, String) {
        (format!("key{i}"), format!("value{i}"))
    }

    #[test_log::test]
    fn test_put_drops_stale_persisted_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 1);

        cache.put("key0".to_string(), "old".to_string()).unwrap();
        cache.put("key1".to_string(), "value1".to_string()).unwrap();
        assert!(dir.path().join("key0").is_file());

        // `key1` goes to disk, the stale `key0` entry is deleted.
        cache.put("key0".to_string(), "new".to_string()).unwrap();
        assert!(!dir.path().join("key0").exists());
        assert!(dir.path().join("key1").is_file());
        assert_eq!(cache.get_if_present(&"key0".to_string()).unwrap(), Some("new".to_string()));
        assert_eq!(cache.size(), 2);
    }

    #[test_log::test]
    fn test_contains_does_not_promote() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 1);

        cache.put_all([kv(0), kv(1)]).unwrap();
        assert!(cache.contains(&"key0".to_string()));
        assert!(cache.contains(&"key1".to_string()));
        assert!(!cache.contains(&"key2".to_string()));
        assert!(dir.path().join("key0").is_file());
        assert!(!cache.memory().contains(&"key0".to_string()));
    }

    #[test_log::test]
    fn test_get_all_present() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 2);

        cache.put_all((0..4).map(kv)).unwrap();
        let keys = (0..6).map(|i| kv(i).0).collect::<Vec<_>>();
        let mut present = cache.get_all_present(&keys).unwrap();
        present.sort();
        assert_eq!(present, (0..4).map(kv).collect::<Vec<_>>());
        assert_eq!(cache.size(), 4);

        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.memory_hits + stats.disk_hits, 4);
    }

    #[test_log::test]
    fn test_corrupt_persisted_entry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 4);

        fs::write(dir.path().join("key0"), [0xffu8; 2]).unwrap();
        let err = cache.get_if_present(&"key0".to_string()).unwrap_err();
        assert!(matches!(err, Error::PersistRead { .. }), "{err}");
        assert!(!cache.memory().contains(&"key0".to_string()));

        let err = cache
            .get_with("key0".to_string(), || anyhow::Ok("produced".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::PersistRead { .. }), "{err}");

        // Invalidation removes the corrupt entry.
        cache.invalidate(&"key0".to_string()).unwrap();
        assert_eq!(cache.get_if_present(&"key0".to_string()).unwrap(), None);
    }

    #[test_log::test]
    fn test_delete_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 4);

        // A non-empty directory where the entry file of `key0` belongs cannot be removed as a file.
        fs::create_dir(dir.path().join("key0")).unwrap();
        fs::write(dir.path().join("key0").join("inner"), b"").unwrap();

        let err = cache.invalidate(&"key0".to_string()).unwrap_err();
        assert!(matches!(err, Error::PersistDelete { .. }), "{err}");

        let err = cache.put("key0".to_string(), "value0".to_string()).unwrap_err();
        assert!(matches!(err, Error::PersistDelete { .. }), "{err}");
        assert!(!cache.memory().contains(&"key0".to_string()));

        let err = cache.invalidate_keys([&"key1".to_string(), &"key0".to_string()]).unwrap_err();
        assert!(matches!(err, Error::PersistDelete { .. }), "{err}");
    }

    #[test_log::test]
    fn test_invalid_keys_live_in_memory_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 1);

        cache.put("../escape".to_string(), "value".to_string()).unwrap();
        assert_eq!(
            cache.get_if_present(&"../escape".to_string()).unwrap(),
            Some("value".to_string())
        );

        // Evicted without a valid path: dropped.
        cache.put("key0".to_string(), "value0".to_string()).unwrap();
        assert_eq!(cache.get_if_present(&"../escape".to_string()).unwrap(), None);
        assert_eq!(cache.stats().write_back_failures, 1);
        cache.invalidate(&"../escape".to_string()).unwrap();
        assert_eq!(cache.size(), 1);
    }

    #[test_log::test]
    fn test_time_to_idle_expiry_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let cache: PersistingCache<String, String> = PersistingCacheBuilder::new(16)
            .with_persistence_dir(dir.path())
            .with_time_to_idle(std::time::Duration::from_millis(50))
            .build()
            .unwrap();

        cache.put("key0".to_string(), "value0".to_string()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(200));
        cache.clean_up();

        assert!(dir.path().join("key0").is_file());
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get_if_present(&"key0".to_string()).unwrap(), Some("value0".to_string()));
        assert!(!dir.path().join("key0").exists());
        assert_eq!(cache.stats().disk_hits, 1);
    }
}
