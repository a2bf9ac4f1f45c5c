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

use std::{fmt::Debug, path::PathBuf, sync::Arc};

use crate::code::CodeError;

/// Error of spillover.
///
/// Sources are kept behind [`Arc`], so errors can be cloned and shared between the concurrent callers that wait on
/// the same load.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The key maps to a path that would escape the persistence root, or cannot be mapped at all.
    ///
    /// Raised before any I/O is issued.
    #[error("invalid key path for key {key}: {reason}")]
    InvalidKeyPath {
        /// Debug representation of the key.
        key: String,
        /// Why the key path is rejected.
        reason: String,
    },
    /// Writing an evicted entry back to disk failed.
    #[error("failed to persist entry to {path:?}: {source}")]
    PersistWrite {
        /// Path of the entry file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<CodeError>,
    },
    /// A persisted entry exists but cannot be read or decoded.
    #[error("failed to read persisted entry from {path:?}: {source}")]
    PersistRead {
        /// Path of the entry file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<CodeError>,
    },
    /// A persisted entry exists but cannot be removed.
    #[error("failed to delete persisted entry {path:?}: {source}")]
    PersistDelete {
        /// Path of the entry file or directory.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// The caller supplied value producer failed.
    #[error("value loader failed: {0:#}")]
    Load(Arc<anyhow::Error>),
    /// Config error.
    #[error("config error: {0}")]
    Config(String),
    /// Other I/O error on the persistence root.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// Path the operation was issued on.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl Error {
    /// Create an [`Error::InvalidKeyPath`] error.
    pub fn invalid_key_path(key: &impl Debug, reason: impl Into<String>) -> Self {
        Self::InvalidKeyPath {
            key: format!("{key:?}"),
            reason: reason.into(),
        }
    }

    /// Create an [`Error::PersistWrite`] error.
    pub fn persist_write(path: impl Into<PathBuf>, source: impl Into<CodeError>) -> Self {
        Self::PersistWrite {
            path: path.into(),
            source: Arc::new(source.into()),
        }
    }

    /// Create an [`Error::PersistRead`] error.
    pub fn persist_read(path: impl Into<PathBuf>, source: impl Into<CodeError>) -> Self {
        Self::PersistRead {
            path: path.into(),
            source: Arc::new(source.into()),
        }
    }

    /// Create an [`Error::PersistDelete`] error.
    pub fn persist_delete(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PersistDelete {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Create an [`Error::Load`] error that wraps the producer's failure verbatim.
    pub fn load(source: impl Into<anyhow::Error>) -> Self {
        Self::Load(Arc::new(source.into()))
    }

    /// Create an [`Error::Config`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an [`Error::Io`] error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Check if the error is an [`Error::InvalidKeyPath`] error.
    pub fn is_invalid_key_path(&self) -> bool {
        matches!(self, Self::InvalidKeyPath { .. })
    }

    /// Get the producer's failure if the error is an [`Error::Load`] error.
    pub fn loader_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Load(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Result type for spillover.
pub type Result<T> = std::result::Result<T, Error>;
