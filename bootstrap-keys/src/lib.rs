//! SSH key provisioning for droplet bootstrap runs
//!
//! Resolves the key pair for a deployment stack, generating a 2048-bit RSA
//! pair on first use and reusing the stored pair on every later run.
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


pub mod error;
pub mod generator;
pub mod key_store;
pub mod key_types;
pub mod local_store;
pub mod memory_store;
pub mod service_integration;
pub mod storage;

pub use error::{KeyError, KeyHalf, KeyResult};
pub use generator::{fingerprint, KeyPairGenerator, RsaKeyPairGenerator, RSA_KEY_BITS};
pub use key_store::{KeyOutcome, KeyStore, ResolvedKey};
pub use key_types::{EncodedKeyPair, FileMode, KeyFilePaths, StackIdentity};
pub use local_store::FsKeyStorage;
pub use memory_store::MemoryKeyStorage;
pub use service_integration::*;
pub use storage::{KeyStorage, LockGuard};

pub use bootstrap_types::{LockMode, PartialPairPolicy};
