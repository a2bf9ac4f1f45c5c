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

use spillover_common::event::RemovalCause;

/// Eviction algorithm of the memory tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Least recently used. Every new entry is admitted and the least recently accessed entries are evicted.
    #[default]
    Lru,
    /// TinyLFU. New entries may be rejected in favor of frequently accessed ones.
    ///
    /// A rejected entry is reported as a size eviction and is written back like any other.
    TinyLfu,
}

impl From<EvictionPolicy> for moka::policy::EvictionPolicy {
    fn from(policy: EvictionPolicy) -> Self {
        match policy {
            EvictionPolicy::Lru => moka::policy::EvictionPolicy::lru(),
            EvictionPolicy::TinyLfu => moka::policy::EvictionPolicy::tiny_lfu(),
        }
    }
}

/// Weigher of the memory tier entries.
///
/// With a weigher, the capacity of the memory tier is the total weight of its entries instead of their count.
pub trait Weigher<K, V>: Fn(&K, &V) -> u32 + Send + Sync + 'static {}
impl<K, V, T> Weigher<K, V> for T where T: Fn(&K, &V) -> u32 + Send + Sync + 'static {}

pub(crate) fn removal_cause(cause: moka::notification::RemovalCause) -> RemovalCause {
    match cause {
        moka::notification::RemovalCause::Expired => RemovalCause::Expired,
        moka::notification::RemovalCause::Explicit => RemovalCause::Explicit,
        moka::notification::RemovalCause::Replaced => RemovalCause::Replaced,
        moka::notification::RemovalCause::Size => RemovalCause::Size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_cause_translation() {
        use moka::notification::RemovalCause as Engine;

        assert_eq!(removal_cause(Engine::Expired), RemovalCause::Expired);
        assert_eq!(removal_cause(Engine::Explicit), RemovalCause::Explicit);
        assert_eq!(removal_cause(Engine::Replaced), RemovalCause::Replaced);
        assert_eq!(removal_cause(Engine::Size), RemovalCause::Size);
    }
}
