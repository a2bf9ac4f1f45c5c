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

//! spillover is a bounded in-memory cache that overflows to disk.
//!
//! Entries the memory tier evicts for capacity or expiry are written to one file per key below a persistence
//! directory instead of being dropped. A lookup that misses in memory falls back to disk and promotes the entry back
//! into memory. Entries the caller invalidates or overwrites are never written back.
//!
//! ```
//! use spillover::{LoadingPersistingCache, PersistingCacheBuilder};
//!
//! let cache: LoadingPersistingCache<u64, String> = PersistingCacheBuilder::new(16)
//!     .with_name("squares")
//!     .build_with_loader(|key: &u64| anyhow::Ok((key * key).to_string()))
//!     .unwrap();
//!
//! for i in 0..64 {
//!     assert_eq!(cache.get(&i).unwrap(), (i * i).to_string());
//! }
//! // 16 entries in memory, the rest on disk.
//! assert_eq!(cache.size(), 64);
//! ```

mod bridge;
mod builder;
mod cache;
mod loader;
mod loading;
mod stats;

pub use spillover_common as common;
pub use spillover_memory as memory;
pub use spillover_storage as storage;

/// The prelude of spillover.
pub mod prelude;
pub use prelude::*;
