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

use std::{fmt::Debug, sync::Arc, time::Duration};

use spillover_common::{
    code::{Key, Value},
    event::{RemovalEvent, RemovalListener},
};

use crate::policy::{removal_cause, EvictionPolicy, Weigher};

/// Builder of the [`MemoryTier`].
pub struct MemoryTierBuilder<K, V>
where
    K: Key,
    V: Value,
{
    name: Option<String>,
    max_capacity: u64,
    initial_capacity: Option<usize>,
    weigher: Option<Arc<dyn Weigher<K, V>>>,
    time_to_live: Option<Duration>,
    time_to_idle: Option<Duration>,
    eviction_policy: EvictionPolicy,
    listener: Option<Arc<dyn RemovalListener<K, V>>>,
}

impl<K, V> MemoryTierBuilder<K, V>
where
    K: Key,
    V: Value,
{
    /// Create a memory tier builder with the given capacity.
    ///
    /// The capacity is an entry count, or a total weight if a weigher is set.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            name: None,
            max_capacity,
            initial_capacity: None,
            weigher: None,
            time_to_live: None,
            time_to_idle: None,
            eviction_policy: EvictionPolicy::default(),
            listener: None,
        }
    }

    /// Set the name of the memory tier.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the initial capacity of the memory tier index, to avoid rehashing while it warms up.
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = Some(initial_capacity);
        self
    }

    /// Set the weigher of the memory tier.
    pub fn with_weigher(mut self, weigher: impl Weigher<K, V>) -> Self {
        self.weigher = Some(Arc::new(weigher));
        self
    }

    /// Set how long an entry may live after it is inserted.
    pub fn with_time_to_live(mut self, time_to_live: Duration) -> Self {
        self.time_to_live = Some(time_to_live);
        self
    }

    /// Set how long an entry may live after it is last accessed.
    pub fn with_time_to_idle(mut self, time_to_idle: Duration) -> Self {
        self.time_to_idle = Some(time_to_idle);
        self
    }

    /// Set the eviction algorithm.
    ///
    /// The default value is [`EvictionPolicy::Lru`].
    pub fn with_eviction_policy(mut self, eviction_policy: EvictionPolicy) -> Self {
        self.eviction_policy = eviction_policy;
        self
    }

    /// Set the listener that is notified of every removal from the memory tier.
    pub fn with_removal_listener(mut self, listener: Arc<dyn RemovalListener<K, V>>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Build the memory tier with the given configuration.
    pub fn build(self) -> MemoryTier<K, V> {
        tracing::debug!(
            "[memory tier]: build memory tier {:?}, capacity: {}, policy: {:?}, weighed: {}",
            self.name,
            self.max_capacity,
            self.eviction_policy,
            self.weigher.is_some()
        );

        let mut builder = moka::sync::Cache::<K, V>::builder()
            .max_capacity(self.max_capacity)
            .eviction_policy(self.eviction_policy.into());

        if let Some(name) = &self.name {
            builder = builder.name(name);
        }
        if let Some(initial_capacity) = self.initial_capacity {
            builder = builder.initial_capacity(initial_capacity);
        }
        if let Some(weigher) = self.weigher {
            builder = builder.weigher(move |key: &K, value: &V| weigher(key, value));
        }
        if let Some(time_to_live) = self.time_to_live {
            builder = builder.time_to_live(time_to_live);
        }
        if let Some(time_to_idle) = self.time_to_idle {
            builder = builder.time_to_idle(time_to_idle);
        }
        if let Some(listener) = self.listener {
            builder = builder.eviction_listener(move |key: Arc<K>, value: V, cause| {
                listener.on_removal(RemovalEvent::new(key, Some(value), removal_cause(cause)))
            });
        }

        MemoryTier { cache: builder.build() }
    }
}

/// The bounded in-memory tier.
///
/// Removal notifications are delivered synchronously on the thread whose operation triggered them.
pub struct MemoryTier<K, V> {
    cache: moka::sync::Cache<K, V>,
}

impl<K, V> Debug for MemoryTier<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier").field("name", &self.cache.name()).finish()
    }
}

impl<K, V> Clone for MemoryTier<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<K, V> MemoryTier<K, V>
where
    K: Key,
    V: Value,
{
    /// Name of the memory tier, if set.
    pub fn name(&self) -> Option<&str> {
        self.cache.name()
    }

    /// Get the value of the key if it is resident and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key)
    }

    /// Check if the key is resident.
    ///
    /// Unlike [`MemoryTier::get`], this does not count as an access.
    pub fn contains(&self, key: &K) -> bool {
        self.cache.contains_key(key)
    }

    /// Insert or replace an entry, then run maintenance.
    ///
    /// Every removal caused by the insertion has been delivered to the listener when this returns.
    pub fn insert(&self, key: K, value: V) {
        self.cache.insert(key, value);
        self.cache.run_pending_tasks();
    }

    /// Remove an entry. The listener sees [`RemovalCause::Explicit`](spillover_common::event::RemovalCause).
    pub fn invalidate(&self, key: &K) {
        self.cache.invalidate(key);
    }

    /// Remove all entries. The listener sees one explicit removal per resident entry.
    pub fn invalidate_all(&self) {
        for (key, _) in self.cache.iter() {
            self.cache.invalidate(key.as_ref());
        }
        // Sweep entries that raced with the iteration.
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    /// Number of resident entries, as of the last maintenance.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Total weight of the resident entries, as of the last maintenance.
    pub fn weighted_size(&self) -> u64 {
        self.cache.weighted_size()
    }

    /// Apply pending writes, evict expired entries and enforce the capacity.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    /// Get the value of the key, or insert the value `init` returns if there is one.
    ///
    /// Concurrent calls for the same key are coalesced: only one of them runs `init`.
    pub fn get_or_insert_with_opt<F>(&self, key: K, init: F) -> Option<V>
    where
        F: FnOnce() -> Option<V>,
    {
        let value = self.cache.optionally_get_with(key, init);
        self.cache.run_pending_tasks();
        value
    }

    /// Get the value of the key, or insert the value `init` returns if it succeeds.
    ///
    /// Concurrent calls for the same key are coalesced: only one of them runs `init`, and its error is shared with
    /// every waiter.
    pub fn get_or_try_insert_with<F, E>(&self, key: K, init: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Result<V, E>,
        E: Send + Sync + 'static,
    {
        let res = self.cache.try_get_with(key, init);
        self.cache.run_pending_tasks();
        res
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use spillover_common::event::RemovalCause;

    use super::*;

    type Recorder = Arc<Mutex<Vec<(u64, Option<String>, RemovalCause)>>>;

    fn tier(capacity: u64) -> (MemoryTier<u64, String>, Recorder) {
        let recorder = Recorder::default();
        let tier = builder(capacity, recorder.clone()).build();
        (tier, recorder)
    }

    fn builder(capacity: u64, recorder: Recorder) -> MemoryTierBuilder<u64, String> {
        MemoryTierBuilder::new(capacity)
            .with_name("test")
            .with_removal_listener(Arc::new(move |event: RemovalEvent<u64, String>| {
                let (key, value, cause) = event.into_parts();
                recorder.lock().push((*key, value, cause));
            }))
    }

    #[test_log::test]
    fn test_size_eviction_is_lru() {
        let (tier, recorder) = tier(2);

        tier.insert(1, "one".to_string());
        tier.insert(2, "two".to_string());
        assert!(recorder.lock().is_empty());

        tier.insert(3, "three".to_string());
        assert_eq!(
            recorder.lock().drain(..).collect::<Vec<_>>(),
            vec![(1, Some("one".to_string()), RemovalCause::Size)]
        );
        assert_eq!(tier.entry_count(), 2);
        assert_eq!(tier.get(&1), None);
        assert_eq!(tier.get(&3), Some("three".to_string()));
        assert_eq!(tier.name(), Some("test"));
    }

    #[test_log::test]
    fn test_replace_and_invalidate() {
        let (tier, recorder) = tier(16);

        tier.insert(1, "v1".to_string());
        tier.insert(1, "v2".to_string());
        tier.invalidate(&1);
        tier.invalidate(&2);

        assert_eq!(
            *recorder.lock(),
            vec![
                (1, Some("v1".to_string()), RemovalCause::Replaced),
                (1, Some("v2".to_string()), RemovalCause::Explicit),
            ]
        );
        assert!(!tier.contains(&1));
    }

    #[test_log::test]
    fn test_invalidate_all_notifies_each_entry() {
        let (tier, recorder) = tier(16);

        for i in 0..8 {
            tier.insert(i, i.to_string());
        }
        tier.invalidate_all();

        let mut events = recorder.lock().drain(..).collect::<Vec<_>>();
        events.sort_by_key(|(key, _, _)| *key);
        assert_eq!(
            events,
            (0..8)
                .map(|i| (i, Some(i.to_string()), RemovalCause::Explicit))
                .collect::<Vec<_>>()
        );
        assert_eq!(tier.entry_count(), 0);
    }

    #[test_log::test]
    fn test_expired() {
        let recorder = Recorder::default();
        let tier = builder(16, recorder.clone())
            .with_time_to_live(Duration::from_millis(50))
            .build();

        tier.insert(1, "one".to_string());
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(tier.get(&1), None);
        tier.run_pending_tasks();
        assert_eq!(
            *recorder.lock(),
            vec![(1, Some("one".to_string()), RemovalCause::Expired)]
        );
    }

    #[test_log::test]
    fn test_weigher() {
        let recorder = Recorder::default();
        let tier = builder(10, recorder.clone())
            .with_weigher(|_: &u64, value: &String| value.len() as u32)
            .build();

        tier.insert(1, "aaaaa".to_string());
        tier.insert(2, "bbbbb".to_string());
        assert_eq!(tier.weighted_size(), 10);
        assert!(recorder.lock().is_empty());

        tier.insert(3, "cc".to_string());
        assert_eq!(
            *recorder.lock(),
            vec![(1, Some("aaaaa".to_string()), RemovalCause::Size)]
        );
        assert_eq!(tier.weighted_size(), 7);
    }

    #[test_log::test]
    fn test_get_or_insert() {
        let (tier, recorder) = tier(16);

        assert_eq!(tier.get_or_insert_with_opt(1, || None), None);
        assert!(!tier.contains(&1));
        assert_eq!(
            tier.get_or_insert_with_opt(1, || Some("one".to_string())),
            Some("one".to_string())
        );
        assert_eq!(tier.get_or_insert_with_opt(1, || unreachable!()), Some("one".to_string()));

        let err = tier
            .get_or_try_insert_with(2, || Err::<String, _>("producer failed".to_string()))
            .unwrap_err();
        assert_eq!(err.as_str(), "producer failed");
        assert!(!tier.contains(&2));

        let value = tier
            .get_or_try_insert_with(2, || Ok::<_, String>("two".to_string()))
            .unwrap();
        assert_eq!(value, "two");
        assert_eq!(tier.entry_count(), 2);
        assert!(recorder.lock().is_empty());
    }
}
