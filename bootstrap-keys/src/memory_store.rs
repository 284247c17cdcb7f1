//! In-memory key storage, for tests and dry runs
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::error::{KeyError, KeyResult};
use crate::key_types::{FileMode, KeyFilePaths, StackIdentity};
use crate::storage::{KeyStorage, LockGuard};
use bootstrap_types::LockMode;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredFile {
    contents: String,
    mode: FileMode,
}

#[derive(Default)]
struct LockTable {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

/// Key storage that keeps files in a map.
///
/// Mirrors the filesystem backend's contract, including exclusive locks,
/// and counts writes so tests can assert that a lookup left storage alone.
#[derive(Default)]
pub struct MemoryKeyStorage {
    files: Mutex<HashMap<PathBuf, StoredFile>>,
    /// Paths whose writes fail, to simulate a full or read-only disk
    failing_writes: Mutex<HashSet<PathBuf>>,
    locks: Arc<LockTable>,
    writes: AtomicUsize,
}

impl MemoryKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without counting it as a write
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>, mode: FileMode) {
        self.files_guard().insert(
            path.into(),
            StoredFile {
                contents: contents.into(),
                mode,
            },
        );
    }

    pub fn mode(&self, path: &Path) -> Option<FileMode> {
        self.files_guard().get(path).map(|f| f.mode)
    }

    /// Number of successful writes since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every later write to `path` fail
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.failing_writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into());
    }

    fn files_guard(&self) -> MutexGuard<'_, HashMap<PathBuf, StoredFile>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyStorage for MemoryKeyStorage {
    fn exists(&self, path: &Path) -> KeyResult<bool> {
        Ok(self.files_guard().contains_key(path))
    }

    fn read_to_string(&self, path: &Path) -> KeyResult<String> {
        self.files_guard()
            .get(path)
            .map(|f| f.contents.clone())
            .ok_or_else(|| KeyError::StorageRead {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            })
    }

    fn write(&self, path: &Path, contents: &str, mode: FileMode) -> KeyResult<()> {
        let failing = self
            .failing_writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(path);
        if failing {
            return Err(KeyError::StorageWrite {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::Other, "simulated write failure"),
            });
        }

        self.files_guard().insert(
            path.to_path_buf(),
            StoredFile {
                contents: contents.to_string(),
                mode,
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn lock(
        &self,
        stack: &StackIdentity,
        paths: &KeyFilePaths,
        mode: LockMode,
    ) -> KeyResult<Box<dyn LockGuard>> {
        let lock_path = paths.lock_path().to_path_buf();
        let mut held = self.locks.held.lock().unwrap_or_else(|e| e.into_inner());

        while held.contains(&lock_path) {
            if mode == LockMode::FailFast {
                return Err(KeyError::LockContention {
                    stack: stack.to_string(),
                    lock_path,
                });
            }
            held = self
                .locks
                .released
                .wait(held)
                .unwrap_or_else(|e| e.into_inner());
        }

        held.insert(lock_path.clone());
        Ok(Box::new(MemoryLockGuard {
            table: Arc::clone(&self.locks),
            path: lock_path,
        }))
    }

    fn root(&self) -> &Path {
        Path::new("")
    }
}

struct MemoryLockGuard {
    table: Arc<LockTable>,
    path: PathBuf,
}

impl LockGuard for MemoryLockGuard {}

impl Drop for MemoryLockGuard {
    fn drop(&mut self) {
        self.table
            .held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.path);
        self.table.released.notify_all();
    }
}
