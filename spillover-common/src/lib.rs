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

//! Shared components for spillover.
//!
//! This crate defines the pieces every tier agrees on: the bounds on keys and values, the serialization
//! collaborator used by the disk tier, the error taxonomy and the removal events emitted by the memory tier.

/// Key and value bounds and the serialization collaborator.
pub mod code;
/// Error taxonomy shared by all tiers.
pub mod error;
/// Removal causes, events and listeners.
pub mod event;
