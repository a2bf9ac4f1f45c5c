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

use std::{fmt::Debug, ops::Deref, sync::Arc};

use spillover_common::{
    code::{Key, StorageValue},
    error::{Error, Result},
};

use crate::cache::PersistingCache;

/// Produces the value of a key that is in neither tier.
pub trait CacheLoader<K, V>: Send + Sync + 'static {
    /// Load the value of the key.
    fn load(&self, key: &K) -> anyhow::Result<V>;
}

impl<K, V, F> CacheLoader<K, V> for F
where
    F: Fn(&K) -> anyhow::Result<V> + Send + Sync + 'static,
{
    fn load(&self, key: &K) -> anyhow::Result<V> {
        self(key)
    }
}

/// A persisting cache that produces missing values with its [`CacheLoader`].
///
/// Every operation of [`PersistingCache`] is available through [`Deref`].
pub struct LoadingPersistingCache<K, V> {
    cache: PersistingCache<K, V>,
    loader: Arc<dyn CacheLoader<K, V>>,
}

impl<K, V> Clone for LoadingPersistingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            loader: self.loader.clone(),
        }
    }
}

impl<K, V> Debug for LoadingPersistingCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingPersistingCache")
            .field("cache", &self.cache)
            .finish()
    }
}

impl<K, V> Deref for LoadingPersistingCache<K, V> {
    type Target = PersistingCache<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

impl<K, V> LoadingPersistingCache<K, V>
where
    K: Key,
    V: StorageValue,
{
    pub(crate) fn new(cache: PersistingCache<K, V>, loader: Arc<dyn CacheLoader<K, V>>) -> Self {
        Self { cache, loader }
    }

    /// Get the value of the key from either tier, or load it.
    pub fn get(&self, key: &K) -> Result<V> {
        self.cache.get_with(key.clone(), || self.loader.load(key))
    }

    /// Get the values of the keys from either tier, loading the missing ones.
    ///
    /// Stops at the first key that fails to load.
    pub fn get_all<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Result<Vec<(K, V)>> {
        keys.into_iter()
            .map(|key| self.get(key).map(|value| (key.clone(), value)))
            .collect()
    }

    /// Load the value of the key again and replace the cached one, in whichever tier it is.
    pub fn refresh(&self, key: &K) -> Result<V> {
        let res = self.loader.load(key).map_err(Error::load);
        self.cache.statistics().record_load(res.is_ok());
        let value = res?;
        self.cache.put(key.clone(), value.clone())?;
        Ok(value)
    }

    /// Access the underlying persisting cache.
    pub fn cache(&self) -> &PersistingCache<K, V> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::PersistingCacheBuilder;

    #[test_log::test]
    fn test_refresh_replaces_persisted_value() {
        let dir = tempfile::tempdir().unwrap();
        let version = Arc::new(AtomicUsize::new(0));
        let cache: LoadingPersistingCache<String, String> = PersistingCacheBuilder::new(1)
            .with_persistence_dir(dir.path())
            .build_with_loader({
                let version = version.clone();
                move |key: &String| anyhow::Ok(format!("{key}@{}", version.load(Ordering::SeqCst)))
            })
            .unwrap();

        assert_eq!(cache.get(&"key0".to_string()).unwrap(), "key0@0");
        assert_eq!(cache.get(&"key1".to_string()).unwrap(), "key1@0");
        assert!(dir.path().join("key0").is_file());

        version.store(1, Ordering::SeqCst);
        assert_eq!(cache.refresh(&"key0".to_string()).unwrap(), "key0@1");
        // The stale persisted copy is gone, `key1` is evicted in its place.
        assert!(!dir.path().join("key0").exists());
        assert!(dir.path().join("key1").is_file());
        assert_eq!(cache.get(&"key0".to_string()).unwrap(), "key0@1");
        assert_eq!(cache.size(), 2);
    }

    #[test_log::test]
    fn test_load_failure() {
        let cache: LoadingPersistingCache<u64, u64> = PersistingCacheBuilder::new(4)
            .build_with_loader(|key: &u64| match *key {
                0 => Err(anyhow::anyhow!("no value for key 0")),
                key => Ok(key * 10),
            })
            .unwrap();

        let values = cache.get_all(&[1, 2, 3]).unwrap();
        assert_eq!(values, vec![(1, 10), (2, 20), (3, 30)]);

        let err = cache.get(&0).unwrap_err();
        assert_eq!(err.loader_error().unwrap().to_string(), "no value for key 0");
        assert!(!cache.contains(&0));
        assert!(cache.get_all(&[1, 0]).is_err());

        let stats = cache.stats();
        assert_eq!(stats.loads, 5);
        assert_eq!(stats.load_failures, 2);
    }
}
