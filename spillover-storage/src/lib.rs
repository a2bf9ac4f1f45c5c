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

//! The disk overflow tier of spillover.
//!
//! Every persisted entry is one file below the persistence root, at the path a [`PathMapper`] derives from its key.
//! The file holds exactly the bytes the value's [`Code`](spillover_common::code::Code) implementation produces.
//! Readers and writers of the same entry are serialized with OS advisory file locks.

mod lock;
mod path;
mod store;

pub use lock::FileLock;
pub use path::{validate_segment, FanOutPathMapper, KeyPathMapper, PathMapper};
pub use store::{PersistedStore, PersistedStoreBuilder};
