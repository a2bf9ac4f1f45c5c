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

//! The memory tier of spillover.
//!
//! The memory tier is a bounded concurrent cache engine (`moka`) behind a narrow adapter. The adapter translates
//! the engine's removal causes into [`RemovalCause`](spillover_common::event::RemovalCause) and drives the engine's
//! maintenance eagerly, so that every eviction a write causes is delivered to the removal listener before the write
//! returns.

mod policy;
mod tier;

pub use policy::{EvictionPolicy, Weigher};
pub use tier::{MemoryTier, MemoryTierBuilder};
