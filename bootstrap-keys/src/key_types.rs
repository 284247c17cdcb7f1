//! Key type definitions
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
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Suffix appended to a stack name to form the private key file name
pub const PRIVATE_KEY_SUFFIX: &str = "_id_rsa";
/// Suffix appended to the private key path to form the public key path
pub const PUBLIC_KEY_EXTENSION: &str = ".pub";
/// Suffix appended to the private key path to form the lock file path
pub const LOCK_EXTENSION: &str = ".lock";

/// Name of a deployment stack.
///
/// Opaque: the value is only ever used verbatim to derive file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackIdentity(String);

impl StackIdentity {
    pub fn new(name: impl Into<String>) -> KeyResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(KeyError::InvalidStackIdentity(
                "stack name must not be empty".to_string(),
            ));
        }
        if name.contains('\0') {
            return Err(KeyError::InvalidStackIdentity(format!(
                "stack name {:?} contains a NUL byte",
                name
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key file locations for this stack, relative to `root`
    pub fn key_paths(&self, root: &Path) -> KeyFilePaths {
        KeyFilePaths::derive(root, self)
    }
}

impl fmt::Display for StackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The file locations holding one stack's key pair.
///
/// The public and lock paths are always the private path with a fixed
/// suffix appended; there is no way to construct them independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilePaths {
    private: PathBuf,
    public: PathBuf,
    lock: PathBuf,
}

impl KeyFilePaths {
    pub fn derive(root: &Path, stack: &StackIdentity) -> Self {
        let file_name = format!("{}{}", stack.as_str(), PRIVATE_KEY_SUFFIX);
        let private = root.join(file_name);
        Self {
            public: with_suffix(&private, PUBLIC_KEY_EXTENSION),
            lock: with_suffix(&private, LOCK_EXTENSION),
            private,
        }
    }

    pub fn private_path(&self) -> &Path {
        &self.private
    }

    pub fn public_path(&self) -> &Path {
        &self.public
    }

    /// Advisory lock file guarding the pair against concurrent provisioning
    pub fn lock_path(&self) -> &Path {
        &self.lock
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Permission class of a stored key file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Owner read/write only (0600)
    Private,
    /// Owner read/write, group and other read (0644)
    Public,
}

impl FileMode {
    pub fn bits(&self) -> u32 {
        match self {
            FileMode::Private => 0o600,
            FileMode::Public => 0o644,
        }
    }
}

/// A freshly generated key pair in its on-disk encodings
pub struct EncodedKeyPair {
    /// PKCS#1 PEM (`RSA PRIVATE KEY`), wiped from memory on drop
    pub private_pem: Zeroizing<String>,
    /// OpenSSH authorized-keys line, newline-terminated
    pub public_openssh: String,
}

impl fmt::Debug for EncodedKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedKeyPair")
            .field("private_pem", &"<redacted>")
            .field("public_openssh", &self.public_openssh)
            .finish()
    }
}
