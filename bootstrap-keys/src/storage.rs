//! Storage interface for stack key files
//!
//! Key files are persisted state shared between provisioning runs. This
//! module provides a trait-based interface so the key store can be backed by:
//! - The local filesystem (`FsKeyStorage`, used by the provisioning binary)
//! - Memory (`MemoryKeyStorage`, used by tests)
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


use crate::error::KeyResult;
use crate::key_types::{FileMode, KeyFilePaths, StackIdentity};
use bootstrap_types::LockMode;
use std::path::Path;

/// Held exclusive access to one stack's key files.
///
/// Access is released when the guard is dropped.
pub trait LockGuard: Send {}

/// Trait for key file storage backends
pub trait KeyStorage: Send + Sync {
    /// Check whether a file exists
    fn exists(&self, path: &Path) -> KeyResult<bool>;

    /// Read a whole file as UTF-8 text
    fn read_to_string(&self, path: &Path) -> KeyResult<String>;

    /// Create or replace a file, leaving it with exactly `mode` permissions
    fn write(&self, path: &Path, contents: &str, mode: FileMode) -> KeyResult<()>;

    /// Acquire exclusive access to a stack's key files
    fn lock(
        &self,
        stack: &StackIdentity,
        paths: &KeyFilePaths,
        mode: LockMode,
    ) -> KeyResult<Box<dyn LockGuard>>;

    /// Directory the stack key paths are derived under
    fn root(&self) -> &Path;
}
