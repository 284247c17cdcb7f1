//! High-level key store interface
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


use crate::error::{KeyError, KeyHalf, KeyResult};
use crate::generator::KeyPairGenerator;
use crate::key_types::{FileMode, KeyFilePaths, StackIdentity};
use crate::storage::KeyStorage;
use bootstrap_types::{LockMode, PartialPairPolicy};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

/// How a public key was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Both files were already present; nothing was written
    Existing,
    /// A new pair was generated and written
    Generated,
    /// The public file was rebuilt from the surviving private key
    Reconstructed,
}

/// Result of resolving a stack's key
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    /// OpenSSH authorized-keys line, exactly as stored
    pub public_key: String,
    pub outcome: KeyOutcome,
    pub paths: KeyFilePaths,
}

/// Get-or-create store for per-stack SSH key pairs
pub struct KeyStore {
    storage: Arc<dyn KeyStorage>,
    generator: Arc<dyn KeyPairGenerator>,
    lock_mode: LockMode,
    partial_pair_policy: PartialPairPolicy,
}

impl KeyStore {
    /// Create a key store that waits on contended locks and reconstructs
    /// missing public keys
    pub fn new(storage: Arc<dyn KeyStorage>, generator: Arc<dyn KeyPairGenerator>) -> Self {
        Self {
            storage,
            generator,
            lock_mode: LockMode::default(),
            partial_pair_policy: PartialPairPolicy::default(),
        }
    }

    pub fn with_lock_mode(mut self, lock_mode: LockMode) -> Self {
        self.lock_mode = lock_mode;
        self
    }

    pub fn with_partial_pair_policy(mut self, policy: PartialPairPolicy) -> Self {
        self.partial_pair_policy = policy;
        self
    }

    /// Key file locations for a stack in this store
    pub fn key_paths(&self, stack: &StackIdentity) -> KeyFilePaths {
        stack.key_paths(self.storage.root())
    }

    /// Get or create the public key for a stack.
    ///
    /// Returns the authorized-keys line verbatim, trailing newline included.
    pub fn resolve_public_key(&self, stack: &StackIdentity) -> KeyResult<String> {
        self.resolve(stack).map(|resolved| resolved.public_key)
    }

    /// Get or create the public key for a stack, reporting what happened.
    ///
    /// A complete pair is read without locking or writing anything. Otherwise
    /// the stack's lock is taken and both files are checked again; the lock
    /// is held until both files are written, so concurrent runs against the
    /// same stack generate at most one pair.
    pub fn resolve(&self, stack: &StackIdentity) -> KeyResult<ResolvedKey> {
        let span = info_span!("resolve_public_key", stack = %stack);
        let _enter = span.enter();

        let paths = self.key_paths(stack);

        // Key files are only ever published by rename, so both being present
        // means both are complete
        if self.pair_exists(&paths)? {
            debug!(path = %paths.public_path().display(), "Reusing existing key pair");
            return Ok(ResolvedKey {
                public_key: self.read_public(&paths)?,
                outcome: KeyOutcome::Existing,
                paths,
            });
        }

        let _lock = self.storage.lock(stack, &paths, self.lock_mode)?;

        let public_exists = self.storage.exists(paths.public_path())?;
        let private_exists = self.storage.exists(paths.private_path())?;

        let (public_key, outcome) = match (private_exists, public_exists) {
            (true, true) => {
                debug!(path = %paths.public_path().display(), "Key pair completed by another run");
                (self.read_public(&paths)?, KeyOutcome::Existing)
            }
            (false, false) => {
                info!(path = %paths.private_path().display(), "No key pair found, generating");
                (self.generate(&paths)?, KeyOutcome::Generated)
            }
            (true, false) => self.handle_missing_public(stack, &paths)?,
            (false, true) => self.handle_missing_private(stack, &paths)?,
        };

        Ok(ResolvedKey {
            public_key,
            outcome,
            paths,
        })
    }

    fn pair_exists(&self, paths: &KeyFilePaths) -> KeyResult<bool> {
        Ok(self.storage.exists(paths.private_path())? && self.storage.exists(paths.public_path())?)
    }

    fn read_public(&self, paths: &KeyFilePaths) -> KeyResult<String> {
        self.storage.read_to_string(paths.public_path())
    }

    fn generate(&self, paths: &KeyFilePaths) -> KeyResult<String> {
        let public_key = self.generator.generate_into(self.storage.as_ref(), paths)?;
        info!(
            private = %paths.private_path().display(),
            public = %paths.public_path().display(),
            "Key pair generated"
        );
        Ok(public_key)
    }

    fn handle_missing_public(
        &self,
        stack: &StackIdentity,
        paths: &KeyFilePaths,
    ) -> KeyResult<(String, KeyOutcome)> {
        warn!(
            path = %paths.public_path().display(),
            policy = %self.partial_pair_policy,
            "Public key missing but private key present"
        );

        match self.partial_pair_policy {
            PartialPairPolicy::Reconstruct => {
                let private_pem = zeroize::Zeroizing::new(
                    self.storage.read_to_string(paths.private_path())?,
                );
                let public_key = self
                    .generator
                    .public_from_private(&private_pem, paths.private_path())?;
                self.storage
                    .write(paths.public_path(), &public_key, FileMode::Public)?;
                info!(path = %paths.public_path().display(), "Public key reconstructed");
                Ok((public_key, KeyOutcome::Reconstructed))
            }
            PartialPairPolicy::Regenerate => {
                warn!(path = %paths.private_path().display(), "Replacing existing private key");
                Ok((self.generate(paths)?, KeyOutcome::Generated))
            }
            PartialPairPolicy::Fail => Err(KeyError::IncompletePair {
                stack: stack.to_string(),
                missing: KeyHalf::Public,
            }),
        }
    }

    fn handle_missing_private(
        &self,
        stack: &StackIdentity,
        paths: &KeyFilePaths,
    ) -> KeyResult<(String, KeyOutcome)> {
        warn!(
            path = %paths.private_path().display(),
            policy = %self.partial_pair_policy,
            "Private key missing but public key present"
        );

        match self.partial_pair_policy {
            PartialPairPolicy::Reconstruct => Ok((self.read_public(paths)?, KeyOutcome::Existing)),
            PartialPairPolicy::Regenerate => Ok((self.generate(paths)?, KeyOutcome::Generated)),
            PartialPairPolicy::Fail => Err(KeyError::IncompletePair {
                stack: stack.to_string(),
                missing: KeyHalf::Private,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_types::EncodedKeyPair;
    use crate::memory_store::MemoryKeyStorage;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zeroize::Zeroizing;

    /// Cheap deterministic generator: pair `n` is `PEM-n` / `ssh-rsa KEY-n`
    #[derive(Default)]
    struct SequenceGenerator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SequenceGenerator {
        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl KeyPairGenerator for SequenceGenerator {
        fn generate(&self) -> KeyResult<EncodedKeyPair> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(KeyError::KeyGeneration("entropy source unavailable".to_string()));
            }
            Ok(EncodedKeyPair {
                private_pem: Zeroizing::new(format!("PEM-{}", n)),
                public_openssh: format!("ssh-rsa KEY-{}\n", n),
            })
        }

        fn public_from_private(&self, private_pem: &str, source: &Path) -> KeyResult<String> {
            private_pem
                .strip_prefix("PEM-")
                .map(|n| format!("ssh-rsa KEY-{}\n", n))
                .ok_or_else(|| KeyError::InvalidFormat {
                    path: source.to_path_buf(),
                    reason: "unexpected private key".to_string(),
                })
        }
    }

    fn store_with(
        policy: PartialPairPolicy,
    ) -> (KeyStore, Arc<MemoryKeyStorage>, Arc<SequenceGenerator>) {
        let storage = Arc::new(MemoryKeyStorage::new());
        let generator = Arc::new(SequenceGenerator::default());
        let store = KeyStore::new(storage.clone(), generator.clone())
            .with_partial_pair_policy(policy);
        (store, storage, generator)
    }

    fn stack(name: &str) -> StackIdentity {
        StackIdentity::new(name).unwrap()
    }

    #[test]
    fn test_first_resolve_generates_both_files() {
        let (store, storage, generator) = store_with(PartialPairPolicy::Reconstruct);
        let stack = stack("dev");

        let resolved = store.resolve(&stack).unwrap();

        assert_eq!(resolved.outcome, KeyOutcome::Generated);
        assert_eq!(resolved.public_key, "ssh-rsa KEY-1\n");
        assert_eq!(generator.calls(), 1);
        assert_eq!(storage.write_count(), 2);
        assert_eq!(storage.mode(Path::new("dev_id_rsa")), Some(FileMode::Private));
        assert_eq!(storage.mode(Path::new("dev_id_rsa.pub")), Some(FileMode::Public));
        assert_eq!(
            storage.read_to_string(Path::new("dev_id_rsa.pub")).unwrap(),
            resolved.public_key
        );
    }

    #[test]
    fn test_second_resolve_reuses_key() {
        let (store, storage, generator) = store_with(PartialPairPolicy::Reconstruct);
        let stack = stack("dev");

        let first = store.resolve_public_key(&stack).unwrap();
        let second = store.resolve(&stack).unwrap();

        assert_eq!(first, second.public_key);
        assert_eq!(second.outcome, KeyOutcome::Existing);
        assert_eq!(generator.calls(), 1);
        assert_eq!(storage.write_count(), 2);
    }

    #[test]
    fn test_existing_pair_is_returned_verbatim_without_writes() {
        let (store, storage, generator) = store_with(PartialPairPolicy::Reconstruct);
        storage.insert("prod_id_rsa", "PEM-seeded", FileMode::Private);
        storage.insert("prod_id_rsa.pub", "ssh-rsa SEEDED operator@host\n", FileMode::Public);

        let key = store.resolve_public_key(&stack("prod")).unwrap();

        assert_eq!(key, "ssh-rsa SEEDED operator@host\n");
        assert_eq!(generator.calls(), 0);
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_missing_public_reconstructed_from_private() {
        let (store, storage, generator) = store_with(PartialPairPolicy::Reconstruct);
        storage.insert("ci-test_id_rsa", "PEM-7", FileMode::Private);

        let resolved = store.resolve(&stack("ci-test")).unwrap();

        assert_eq!(resolved.outcome, KeyOutcome::Reconstructed);
        assert_eq!(resolved.public_key, "ssh-rsa KEY-7\n");
        assert_eq!(generator.calls(), 0);
        // Only the public file is written; the private key is untouched
        assert_eq!(storage.write_count(), 1);
        assert_eq!(
            storage.read_to_string(Path::new("ci-test_id_rsa")).unwrap(),
            "PEM-7"
        );
    }

    #[test]
    fn test_missing_public_with_corrupt_private_fails() {
        let (store, storage, _) = store_with(PartialPairPolicy::Reconstruct);
        storage.insert("ci-test_id_rsa", "garbage", FileMode::Private);

        let err = store.resolve_public_key(&stack("ci-test")).unwrap_err();
        assert!(matches!(err, KeyError::InvalidFormat { .. }));
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_missing_public_regenerate_policy() {
        let (store, storage, generator) = store_with(PartialPairPolicy::Regenerate);
        storage.insert("ci-test_id_rsa", "PEM-old", FileMode::Private);

        let resolved = store.resolve(&stack("ci-test")).unwrap();

        assert_eq!(resolved.outcome, KeyOutcome::Generated);
        assert_eq!(generator.calls(), 1);
        assert_eq!(
            storage.read_to_string(Path::new("ci-test_id_rsa")).unwrap(),
            "PEM-1"
        );
    }

    #[test]
    fn test_missing_public_fail_policy() {
        let (store, storage, generator) = store_with(PartialPairPolicy::Fail);
        storage.insert("ci-test_id_rsa", "PEM-old", FileMode::Private);

        let err = store.resolve_public_key(&stack("ci-test")).unwrap_err();

        assert!(matches!(
            err,
            KeyError::IncompletePair { missing: KeyHalf::Public, .. }
        ));
        assert_eq!(generator.calls(), 0);
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_orphaned_public_key_policies() {
        let (store, storage, generator) = store_with(PartialPairPolicy::Reconstruct);
        storage.insert("orphan_id_rsa.pub", "ssh-rsa ORPHAN\n", FileMode::Public);
        assert_eq!(store.resolve_public_key(&stack("orphan")).unwrap(), "ssh-rsa ORPHAN\n");
        assert_eq!(generator.calls(), 0);

        let (store, storage, _) = store_with(PartialPairPolicy::Fail);
        storage.insert("orphan_id_rsa.pub", "ssh-rsa ORPHAN\n", FileMode::Public);
        assert!(matches!(
            store.resolve_public_key(&stack("orphan")),
            Err(KeyError::IncompletePair { missing: KeyHalf::Private, .. })
        ));

        let (store, storage, generator) = store_with(PartialPairPolicy::Regenerate);
        storage.insert("orphan_id_rsa.pub", "ssh-rsa ORPHAN\n", FileMode::Public);
        assert_eq!(store.resolve_public_key(&stack("orphan")).unwrap(), "ssh-rsa KEY-1\n");
        assert_eq!(generator.calls(), 1);
        assert!(storage.exists(Path::new("orphan_id_rsa")).unwrap());
    }

    #[test]
    fn test_generation_failure_writes_nothing() {
        let storage = Arc::new(MemoryKeyStorage::new());
        let store = KeyStore::new(storage.clone(), Arc::new(SequenceGenerator::failing()));

        let err = store.resolve_public_key(&stack("dev")).unwrap_err();

        assert!(err.is_generation_failure());
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_private_write_failure_skips_public() {
        let (store, storage, _) = store_with(PartialPairPolicy::Reconstruct);
        storage.fail_writes_to("dev_id_rsa");

        let err = store.resolve_public_key(&stack("dev")).unwrap_err();

        assert!(matches!(err, KeyError::StorageWrite { ref path, .. } if path == Path::new("dev_id_rsa")));
        assert!(!storage.exists(Path::new("dev_id_rsa.pub")).unwrap());
    }

    #[test]
    fn test_public_write_failure_leaves_private_only_then_recovers() {
        let (store, storage, generator) = store_with(PartialPairPolicy::Reconstruct);
        storage.fail_writes_to("dev_id_rsa.pub");

        let err = store.resolve_public_key(&stack("dev")).unwrap_err();
        assert!(err.is_storage_failure());
        assert!(storage.exists(Path::new("dev_id_rsa")).unwrap());
        assert!(!storage.exists(Path::new("dev_id_rsa.pub")).unwrap());

        // Once the disk is fixed the next run completes the same pair
        let storage_ok = Arc::new(MemoryKeyStorage::new());
        storage_ok.insert(
            "dev_id_rsa",
            storage.read_to_string(Path::new("dev_id_rsa")).unwrap(),
            FileMode::Private,
        );
        let retry = KeyStore::new(storage_ok.clone(), generator.clone());
        let resolved = retry.resolve(&stack("dev")).unwrap();
        assert_eq!(resolved.outcome, KeyOutcome::Reconstructed);
        assert_eq!(resolved.public_key, "ssh-rsa KEY-1\n");
        assert_eq!(generator.calls(), 1);
    }

    #[test]
    fn test_fail_fast_reports_contention() {
        let storage = Arc::new(MemoryKeyStorage::new());
        let store = KeyStore::new(storage.clone(), Arc::new(SequenceGenerator::default()))
            .with_lock_mode(LockMode::FailFast);
        let stack = stack("busy");

        let paths = store.key_paths(&stack);
        let _held = storage.lock(&stack, &paths, LockMode::Wait).unwrap();

        let err = store.resolve_public_key(&stack).unwrap_err();
        assert!(matches!(err, KeyError::LockContention { .. }));
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_complete_pair_is_read_without_taking_the_lock() {
        let storage = Arc::new(MemoryKeyStorage::new());
        let store = KeyStore::new(storage.clone(), Arc::new(SequenceGenerator::default()))
            .with_lock_mode(LockMode::FailFast);
        let stack = stack("prod");
        storage.insert("prod_id_rsa", "PEM-seeded", FileMode::Private);
        storage.insert("prod_id_rsa.pub", "ssh-rsa SEEDED\n", FileMode::Public);

        let paths = store.key_paths(&stack);
        let _held = storage.lock(&stack, &paths, LockMode::Wait).unwrap();

        let resolved = store.resolve(&stack).unwrap();
        assert_eq!(resolved.outcome, KeyOutcome::Existing);
        assert_eq!(resolved.public_key, "ssh-rsa SEEDED\n");
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_distinct_stacks_get_distinct_keys() {
        let (store, _, generator) = store_with(PartialPairPolicy::Reconstruct);

        let a = store.resolve(&stack("a")).unwrap();
        let b = store.resolve(&stack("b")).unwrap();

        assert_ne!(a.public_key, b.public_key);
        assert_ne!(a.paths.private_path(), b.paths.private_path());
        assert_eq!(generator.calls(), 2);
    }
}
