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

use std::{fs::File, io};

/// RAII guard of an OS advisory lock on an open file.
///
/// The lock is released when the guard is dropped. Lock acquisition blocks without a timeout.
#[derive(Debug)]
pub struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    /// Acquire a shared lock. Any number of shared locks can be held at once.
    pub fn shared(file: &'a File) -> io::Result<Self> {
        fs4::fs_std::FileExt::lock_shared(file)?;
        Ok(Self { file })
    }

    /// Acquire an exclusive lock. Waits for every other lock on the file to be released.
    pub fn exclusive(file: &'a File) -> io::Result<Self> {
        fs4::fs_std::FileExt::lock_exclusive(file)?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        // The OS releases the lock on close anyway.
        if let Err(e) = fs4::fs_std::FileExt::unlock(self.file) {
            tracing::warn!("[file lock]: failed to release file lock: {e}");
        }
    }
}
