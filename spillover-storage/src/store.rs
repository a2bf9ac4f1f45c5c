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

use std::{
    fmt::Debug,
    fs::{self, File, OpenOptions},
    io::{self, ErrorKind, Read, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use spillover_common::{
    code::{CodeError, Key, StorageValue},
    error::{Error, Result},
};

use crate::{
    lock::FileLock,
    path::{validate_segment, PathMapper},
};

/// Builder of the [`PersistedStore`].
pub struct PersistedStoreBuilder<K> {
    dir: PathBuf,
    mapper: Arc<dyn PathMapper<K>>,
    sync: bool,
}

impl<K> Debug for PersistedStoreBuilder<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedStoreBuilder")
            .field("dir", &self.dir)
            .field("sync", &self.sync)
            .finish()
    }
}

impl<K> PersistedStoreBuilder<K>
where
    K: Key,
{
    /// Create a persisted store builder with the persistence root and the path mapper.
    pub fn new(dir: impl AsRef<Path>, mapper: impl PathMapper<K>) -> Self {
        Self {
            dir: dir.as_ref().into(),
            mapper: Arc::new(mapper),
            sync: false,
        }
    }

    /// Set whether every write is synced to the device before the write returns.
    ///
    /// The default value is `false`.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Open the persisted store.
    ///
    /// The persistence root is created if absent and must be a writable directory. Entries left by a previous
    /// process are counted and stay readable.
    pub fn build<V>(self) -> Result<PersistedStore<K, V>>
    where
        V: StorageValue,
    {
        match fs::metadata(&self.dir) {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(Error::config(format!(
                    "persistence root {:?} is not a directory",
                    self.dir
                )))
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?
            }
            Err(e) => return Err(Error::io(&self.dir, e)),
        }
        let metadata = fs::metadata(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        if metadata.permissions().readonly() {
            return Err(Error::config(format!("persistence root {:?} is read-only", self.dir)));
        }

        let recovered = recover(&self.dir)?;
        tracing::info!(
            "[persisted store]: open persistence root {:?}, recovered {} entries",
            self.dir,
            recovered
        );

        Ok(PersistedStore {
            root: self.dir,
            mapper: self.mapper,
            sync: self.sync,
            count: AtomicI64::new(recovered as i64),
            _marker: PhantomData,
        })
    }
}

/// Count the entry files below the root.
fn recover(root: &Path) -> Result<usize> {
    let mut count = 0;
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))? {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
            if file_type.is_dir() {
                dirs.push(entry.path());
            } else if file_type.is_file() {
                count += 1;
            }
        }
    }
    Ok(count)
}

/// The disk overflow tier: one file per persisted entry below the persistence root.
///
/// Writes hold an exclusive lock on the entry file for the whole truncate, write and sync sequence. Reads hold a
/// shared lock, so a reader never observes a partially written entry.
///
/// The entry count is a maintained counter. It is exact when the store is quiescent and may lag behind concurrent
/// writes and deletes.
pub struct PersistedStore<K, V> {
    root: PathBuf,
    mapper: Arc<dyn PathMapper<K>>,
    sync: bool,
    count: AtomicI64,
    _marker: PhantomData<fn() -> V>,
}

impl<K, V> Debug for PersistedStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedStore")
            .field("root", &self.root)
            .field("sync", &self.sync)
            .field("count", &self.count)
            .finish()
    }
}

impl<K, V> PersistedStore<K, V>
where
    K: Key,
    V: StorageValue,
{
    /// The persistence root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the key may be written to the disk tier.
    pub fn should_persist(&self, key: &K) -> bool {
        self.mapper.should_persist(key)
    }

    /// Path of the entry file of the key.
    ///
    /// Every segment returned by the path mapper is validated before it is joined to the root.
    pub fn path_of(&self, key: &K) -> Result<PathBuf> {
        let segments = self.mapper.path_for(key)?;
        if segments.is_empty() {
            return Err(Error::invalid_key_path(key, "no path segments"));
        }
        let mut path = self.root.clone();
        for segment in segments {
            validate_segment(&segment).map_err(|reason| Error::invalid_key_path(key, reason))?;
            path.push(segment);
        }
        Ok(path)
    }

    /// Check if an entry file exists for the key.
    pub fn contains(&self, key: &K) -> bool {
        self.should_persist(key) && self.path_of(key).is_ok_and(|path| path.is_file())
    }

    /// Number of persisted entries.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire).max(0) as usize
    }

    /// Persist the value of the key, replacing any previous entry.
    ///
    /// Does nothing for keys the path mapper excludes. Serialization failures never leave a file behind, and an
    /// I/O failure removes the partially written file.
    pub fn write(&self, key: &K, value: &V) -> Result<()> {
        if !self.should_persist(key) {
            tracing::trace!("[persisted store]: skip write of excluded key {:?}", key);
            return Ok(());
        }
        let path = self.path_of(key)?;

        let mut buf = Vec::with_capacity(value.estimated_size());
        value.encode(&mut buf).map_err(|e| Error::persist_write(&path, e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::persist_write(&path, e))?;
        }

        let (file, created) = open_for_write(&path).map_err(|e| Error::persist_write(&path, e))?;
        let lock = match FileLock::exclusive(&file) {
            Ok(lock) => lock,
            Err(e) => return Err(self.discard_partial(&path, created, e)),
        };
        if let Err(e) = write_contents(&file, &buf, self.sync) {
            // Removed under the lock, so a complete entry of a concurrent writer is never removed.
            let e = self.discard_partial(&path, created, e);
            drop(lock);
            return Err(e);
        }
        drop(lock);

        if created {
            self.count.fetch_add(1, Ordering::AcqRel);
        }
        tracing::trace!("[persisted store]: wrote {} bytes to {:?}", buf.len(), path);
        Ok(())
    }

    /// Remove the entry file a write failed on and keep the count in line with what is left on disk.
    fn discard_partial(&self, path: &Path, created: bool, e: io::Error) -> Error {
        let exists = match fs::remove_file(path) {
            Ok(()) => false,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!("[persisted store]: failed to remove partial entry {:?}: {}", path, e);
                true
            }
        };
        match (created, exists) {
            (true, true) => {
                self.count.fetch_add(1, Ordering::AcqRel);
            }
            (false, false) => {
                self.count.fetch_sub(1, Ordering::AcqRel);
            }
            _ => {}
        }
        Error::persist_write(path, e)
    }

    /// Read the persisted value of the key.
    ///
    /// Returns `None` for keys the path mapper excludes and for keys without an entry file. An entry file that
    /// exists but cannot be decoded is reported as [`Error::PersistRead`].
    pub fn read(&self, key: &K) -> Result<Option<V>> {
        if !self.should_persist(key) {
            return Ok(None);
        }
        let path = self.path_of(key)?;

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::persist_read(&path, e)),
        };
        let mut buf = vec![];
        {
            let _lock = FileLock::shared(&file).map_err(|e| Error::persist_read(&path, e))?;
            (&file)
                .read_to_end(&mut buf)
                .map_err(|e| Error::persist_read(&path, e))?;
        }

        let mut slice = buf.as_slice();
        match V::decode(&mut slice) {
            Ok(value) if slice.is_empty() => Ok(Some(value)),
            Ok(_) => Err(Error::persist_read(&path, CodeError::TrailingBytes(slice.len()))),
            // A writer has created the file but not locked it yet.
            Err(_) if buf.is_empty() => Ok(None),
            Err(e) => Err(Error::persist_read(&path, e)),
        }
    }

    /// Delete the entry file of the key.
    ///
    /// Returns `true` if a file was removed and `false` if there was none.
    pub fn delete(&self, key: &K) -> Result<bool> {
        let path = self.path_of(key)?;

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::persist_delete(&path, e)),
        };
        let _lock = FileLock::exclusive(&file).map_err(|e| Error::persist_delete(&path, e))?;
        match fs::remove_file(&path) {
            Ok(()) => {
                self.count.fetch_sub(1, Ordering::AcqRel);
                tracing::trace!("[persisted store]: deleted {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::persist_delete(&path, e)),
        }
    }

    /// Delete every entry below the persistence root. The root itself is kept.
    pub fn delete_all(&self) -> Result<()> {
        let entries = fs::read_dir(&self.root).map_err(|e| Error::persist_delete(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::persist_delete(&self.root, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| Error::persist_delete(&path, e))?;
            let res = if file_type.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match res {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::persist_delete(&path, e)),
            }
        }
        self.count.store(0, Ordering::Release);
        tracing::debug!("[persisted store]: cleared persistence root {:?}", self.root);
        Ok(())
    }
}

/// Open the entry file for writing, creating it if absent. Returns whether the file was created.
fn open_for_write(path: &Path) -> io::Result<(File, bool)> {
    loop {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => return Ok((file, true)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
        match OpenOptions::new().write(true).open(path) {
            Ok(file) => return Ok((file, false)),
            // Deleted in between, retry creating it.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
}

/// Replace the content of an entry file. The caller holds the exclusive lock.
fn write_contents(mut file: &File, buf: &[u8], sync: bool) -> io::Result<()> {
    file.set_len(0)?;
    file.write_all(buf)?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}
