//! Local filesystem key storage implementation
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
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Key storage backed by plain files
#[derive(Debug, Clone)]
pub struct FsKeyStorage {
    /// Directory key paths are derived under; empty means the working directory
    root: PathBuf,
}

impl FsKeyStorage {
    /// Storage rooted at the process working directory.
    ///
    /// Key paths stay relative (`<stack>_id_rsa`), so they resolve against
    /// whatever directory the provisioning run was started from.
    pub fn current_dir() -> Self {
        Self {
            root: PathBuf::new(),
        }
    }

    /// Storage rooted at an explicit directory, created if missing
    pub fn new<P: AsRef<Path>>(root: P) -> KeyResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| KeyError::StorageWrite {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Sibling file used to stage a write before renaming it into place
    fn staging_path(path: &Path) -> PathBuf {
        let mut raw: OsString = path.as_os_str().to_os_string();
        raw.push(".tmp");
        PathBuf::from(raw)
    }

    fn write_staged(staging: &Path, contents: &str, mode: FileMode) -> io::Result<()> {
        // A leftover from a crashed run, or a planted symlink, is unlinked so
        // key bytes only land in a freshly created inode
        match fs::remove_file(staging) {
            Ok(()) => warn!(path = %staging.display(), "Removed stale staging file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(mode.bits());

        let mut file = options.open(staging)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;

        // `mode` only applies on creation and is filtered by the umask
        #[cfg(unix)]
        fs::set_permissions(staging, fs::Permissions::from_mode(mode.bits()))?;
        #[cfg(not(unix))]
        let _ = mode;

        Ok(())
    }
}

impl KeyStorage for FsKeyStorage {
    fn exists(&self, path: &Path) -> KeyResult<bool> {
        path.try_exists().map_err(|source| KeyError::StorageRead {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_to_string(&self, path: &Path) -> KeyResult<String> {
        fs::read_to_string(path).map_err(|source| KeyError::StorageRead {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, contents: &str, mode: FileMode) -> KeyResult<()> {
        let staging = Self::staging_path(path);

        let result = Self::write_staged(&staging, contents, mode)
            .and_then(|()| fs::rename(&staging, path));

        if let Err(source) = result {
            if let Err(e) = fs::remove_file(&staging) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %staging.display(), error = %e, "Failed to remove staging file");
                }
            }
            return Err(KeyError::StorageWrite {
                path: path.to_path_buf(),
                source,
            });
        }

        debug!(path = %path.display(), mode = %format!("{:o}", mode.bits()), "Key file written");
        Ok(())
    }

    fn lock(
        &self,
        stack: &StackIdentity,
        paths: &KeyFilePaths,
        mode: LockMode,
    ) -> KeyResult<Box<dyn LockGuard>> {
        let lock_path = paths.lock_path().to_path_buf();
        let lock_error = |source: io::Error| KeyError::Lock {
            path: lock_path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(lock_error)?;

        match mode {
            LockMode::Wait => file.lock_exclusive().map_err(lock_error)?,
            LockMode::FailFast => {
                if let Err(e) = file.try_lock_exclusive() {
                    if e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
                        || e.kind() == io::ErrorKind::WouldBlock
                    {
                        return Err(KeyError::LockContention {
                            stack: stack.to_string(),
                            lock_path: lock_path.clone(),
                        });
                    }
                    return Err(lock_error(e));
                }
            }
        }

        debug!(path = %lock_path.display(), %mode, "Acquired key lock");
        Ok(Box::new(FileLockGuard {
            file,
            path: lock_path,
        }))
    }

    fn root(&self) -> &Path {
        &self.root
    }
}

/// Exclusive `flock` on a stack's lock file.
///
/// The lock file itself is left on disk; removing it would let a waiter
/// and a newcomer lock two different inodes.
struct FileLockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard for FileLockGuard {}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to release key lock");
        } else {
            debug!(path = %self.path.display(), "Released key lock");
        }
    }
}
