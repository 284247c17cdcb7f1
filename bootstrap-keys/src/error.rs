//! Error types for key provisioning
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


use std::path::PathBuf;
use thiserror::Error;

/// Which half of a key pair a message refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyHalf {
    Private,
    Public,
}

impl std::fmt::Display for KeyHalf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyHalf::Private => write!(f, "private"),
            KeyHalf::Public => write!(f, "public"),
        }
    }
}

/// Key provisioning errors
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid stack identity: {0}")]
    InvalidStackIdentity(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Failed to read {}: {source}", path.display())]
    StorageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Key files for stack '{stack}' are locked by another process ({})", lock_path.display())]
    LockContention { stack: String, lock_path: PathBuf },

    #[error("Failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid key format in {}: {reason}", path.display())]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Key pair for stack '{stack}' is incomplete: {missing} key file is missing")]
    IncompletePair { stack: String, missing: KeyHalf },
}

impl KeyError {
    /// True for failures of the random source or the RSA primitive
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, KeyError::KeyGeneration(_))
    }

    /// True for local filesystem read/write failures
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            KeyError::StorageRead { .. } | KeyError::StorageWrite { .. }
        )
    }
}

/// Result type for key operations
pub type KeyResult<T> = Result<T, KeyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_storage_errors_name_the_path() {
        let err = KeyError::StorageRead {
            path: PathBuf::from("prod_id_rsa.pub"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let message = err.to_string();
        assert!(message.contains("read"));
        assert!(message.contains("prod_id_rsa.pub"));
        assert!(err.is_storage_failure());
        assert!(!err.is_generation_failure());
    }

    #[test]
    fn test_incomplete_pair_message() {
        let err = KeyError::IncompletePair {
            stack: "ci-test".to_string(),
            missing: KeyHalf::Public,
        };
        assert_eq!(
            err.to_string(),
            "Key pair for stack 'ci-test' is incomplete: public key file is missing"
        );
    }
}
