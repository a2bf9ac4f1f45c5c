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

/// The reason an entry left the memory tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// The entry outlived its time-to-live or time-to-idle.
    Expired,
    /// The entry was evicted to keep the memory tier within its capacity.
    Size,
    /// The entry was removed by the caller.
    Explicit,
    /// The entry was overwritten by the caller.
    Replaced,
    /// The memory tier reclaimed the entry for a value that is no longer reachable.
    Collected,
}

impl RemovalCause {
    /// Whether an entry removed for this cause must be written back to the disk tier.
    ///
    /// Capacity and lifetime driven removals are persisted. Removals initiated by the caller are not, the caller
    /// has already discarded or overwritten the value on purpose.
    pub fn is_persistence_relevant(&self) -> bool {
        !matches!(self, Self::Explicit | Self::Replaced)
    }

    /// Whether the entry was removed by the memory tier itself rather than by the caller.
    pub fn was_evicted(&self) -> bool {
        matches!(self, Self::Expired | Self::Size | Self::Collected)
    }
}

/// A removal notification.
#[derive(Debug, Clone)]
pub struct RemovalEvent<K, V> {
    key: Arc<K>,
    value: Option<V>,
    cause: RemovalCause,
}

impl<K, V> RemovalEvent<K, V> {
    /// Create a removal event.
    ///
    /// `value` is `None` when the memory tier has already dropped the value.
    pub fn new(key: impl Into<Arc<K>>, value: Option<V>, cause: RemovalCause) -> Self {
        Self {
            key: key.into(),
            value,
            cause,
        }
    }

    /// Create an event for an entry the caller invalidated while it only lived on disk.
    pub fn explicit(key: impl Into<Arc<K>>, value: V) -> Self {
        Self::new(key, Some(value), RemovalCause::Explicit)
    }

    /// Key of the removed entry.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Value of the removed entry, if still available.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Why the entry was removed.
    pub fn cause(&self) -> RemovalCause {
        self.cause
    }

    /// Split the event into its parts.
    pub fn into_parts(self) -> (Arc<K>, Option<V>, RemovalCause) {
        (self.key, self.value, self.cause)
    }
}

/// Trait for the customized removal listener.
///
/// Listeners are called synchronously on the thread that triggered the removal and must not call back into the
/// cache that notifies them.
pub trait RemovalListener<K, V>: Send + Sync + 'static {
    /// Called when an entry is removed and not archived to the disk tier.
    fn on_removal(&self, event: RemovalEvent<K, V>);
}

impl<K, V, F> RemovalListener<K, V> for F
where
    F: Fn(RemovalEvent<K, V>) + Send + Sync + 'static,
{
    fn on_removal(&self, event: RemovalEvent<K, V>) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_persistence_relevant_causes() {
        assert!(RemovalCause::Expired.is_persistence_relevant());
        assert!(RemovalCause::Size.is_persistence_relevant());
        assert!(RemovalCause::Collected.is_persistence_relevant());
        assert!(!RemovalCause::Explicit.is_persistence_relevant());
        assert!(!RemovalCause::Replaced.is_persistence_relevant());

        for cause in [
            RemovalCause::Expired,
            RemovalCause::Size,
            RemovalCause::Explicit,
            RemovalCause::Replaced,
            RemovalCause::Collected,
        ] {
            assert_eq!(cause.was_evicted(), cause.is_persistence_relevant());
        }
    }

    #[test]
    fn test_closure_listener() {
        let seen = Arc::new(Mutex::new(vec![]));
        let listener = {
            let seen = seen.clone();
            move |event: RemovalEvent<u64, String>| {
                let (key, value, cause) = event.into_parts();
                seen.lock().unwrap().push((*key, value, cause));
            }
        };

        listener.on_removal(RemovalEvent::explicit(1u64, "one".to_string()));
        listener.on_removal(RemovalEvent::new(2u64, None, RemovalCause::Collected));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (1, Some("one".to_string()), RemovalCause::Explicit),
                (2, None, RemovalCause::Collected),
            ]
        );
    }
}
