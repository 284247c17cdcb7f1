//! Key pair generation and encoding
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
use crate::key_types::{EncodedKeyPair, FileMode, KeyFilePaths};
use crate::storage::KeyStorage;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use ssh_key::public::KeyData;
use ssh_key::{HashAlg, PublicKey};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Modulus size of generated keys
pub const RSA_KEY_BITS: usize = 2048;

/// Trait for key pair generators
pub trait KeyPairGenerator: Send + Sync {
    /// Create a new key pair in memory
    fn generate(&self) -> KeyResult<EncodedKeyPair>;

    /// Derive the OpenSSH public line from a stored private key
    fn public_from_private(&self, private_pem: &str, source: &Path) -> KeyResult<String>;

    /// Generate a key pair and persist both halves.
    ///
    /// The private key is written first; if that fails the public key is
    /// never written. Returns the public line exactly as written.
    fn generate_into(&self, storage: &dyn KeyStorage, paths: &KeyFilePaths) -> KeyResult<String> {
        let pair = self.generate()?;

        storage.write(paths.private_path(), &pair.private_pem, FileMode::Private)?;
        debug!(path = %paths.private_path().display(), "Private key written");

        storage.write(paths.public_path(), &pair.public_openssh, FileMode::Public)?;
        debug!(path = %paths.public_path().display(), "Public key written");

        Ok(pair.public_openssh)
    }
}

/// 2048-bit RSA generator emitting PKCS#1 PEM and OpenSSH encodings
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaKeyPairGenerator;

impl RsaKeyPairGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl KeyPairGenerator for RsaKeyPairGenerator {
    fn generate(&self) -> KeyResult<EncodedKeyPair> {
        info!(bits = RSA_KEY_BITS, "Generating RSA key pair");

        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| KeyError::KeyGeneration(format!("RSA key generation failed: {}", e)))?;

        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| KeyError::KeyGeneration(format!("PKCS#1 encoding failed: {}", e)))?;

        let public_openssh = authorized_key_line(&private_key.to_public_key())
            .map_err(KeyError::KeyGeneration)?;

        Ok(EncodedKeyPair {
            private_pem,
            public_openssh,
        })
    }

    fn public_from_private(&self, private_pem: &str, source: &Path) -> KeyResult<String> {
        let private_key =
            RsaPrivateKey::from_pkcs1_pem(private_pem).map_err(|e| KeyError::InvalidFormat {
                path: source.to_path_buf(),
                reason: format!("not a PKCS#1 RSA private key: {}", e),
            })?;

        authorized_key_line(&private_key.to_public_key()).map_err(|reason| {
            KeyError::InvalidFormat {
                path: source.to_path_buf(),
                reason,
            }
        })
    }
}

/// Encode an RSA public key as a newline-terminated authorized-keys line
fn authorized_key_line(public_key: &RsaPublicKey) -> Result<String, String> {
    let key_data = ssh_key::public::RsaPublicKey::try_from(public_key)
        .map_err(|e| format!("OpenSSH encoding failed: {}", e))?;

    let mut line = PublicKey::from(KeyData::Rsa(key_data))
        .to_openssh()
        .map_err(|e| format!("OpenSSH encoding failed: {}", e))?;
    line.push('\n');
    Ok(line)
}

/// `SHA256:` fingerprint of an authorized-keys line, as shown by `ssh-keygen -l`
pub fn fingerprint(public_openssh: &str) -> KeyResult<String> {
    let public_key = PublicKey::from_openssh(public_openssh.trim_end()).map_err(|e| {
        KeyError::InvalidFormat {
            path: PathBuf::from("<authorized-keys line>"),
            reason: format!("not an OpenSSH public key: {}", e),
        }
    })?;
    Ok(public_key.fingerprint(HashAlg::Sha256).to_string())
}
