//! Helpers for wiring the key store into the provisioning run
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
use crate::generator::{fingerprint, RsaKeyPairGenerator};
use crate::key_store::{KeyOutcome, KeyStore};
use crate::key_types::StackIdentity;
use crate::local_store::FsKeyStorage;
use bootstrap_types::{LockMode, PartialPairPolicy, SshKeySpec};
use std::sync::Arc;
use tracing::info;

/// Initialize a key store over the working directory
pub fn init_key_store(lock_mode: LockMode, policy: PartialPairPolicy) -> Arc<KeyStore> {
    info!(%lock_mode, partial_pair_policy = %policy, "Initializing key store");

    let storage = Arc::new(FsKeyStorage::current_dir());
    let generator = Arc::new(RsaKeyPairGenerator::new());
    Arc::new(
        KeyStore::new(storage, generator)
            .with_lock_mode(lock_mode)
            .with_partial_pair_policy(policy),
    )
}

/// Resolve a stack's key and describe it as the provider's SSH key resource
pub fn ssh_key_spec(key_store: &KeyStore, stack: &str) -> KeyResult<SshKeySpec> {
    let stack = StackIdentity::new(stack)?;
    let resolved = key_store.resolve(&stack)?;
    let fingerprint = fingerprint(&resolved.public_key)?;

    match resolved.outcome {
        KeyOutcome::Existing => info!(stack = %stack, %fingerprint, "Using existing SSH key"),
        KeyOutcome::Generated => info!(stack = %stack, %fingerprint, "Using newly generated SSH key"),
        KeyOutcome::Reconstructed => {
            info!(stack = %stack, %fingerprint, "Using SSH key with reconstructed public half")
        }
    }

    Ok(SshKeySpec::for_stack(
        stack.as_str(),
        resolved.public_key,
        fingerprint,
    ))
}
