//! Provisioning request handed to the infrastructure orchestration engine
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


use crate::error::{Result, TypesError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output name under which the engine exports the droplet's address
pub const DROPLET_IP_EXPORT: &str = "dropletIp";

// ============================================================================
// Resource Specs
// ============================================================================

/// SSH key resource registered with the cloud provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeySpec {
    /// Provider-side key name, `<stack>-ssh-key`
    pub name: String,
    /// OpenSSH authorized-keys line, passed through untouched
    pub public_key: String,
    /// `SHA256:` fingerprint of the public key
    pub fingerprint: String,
}

impl SshKeySpec {
    pub fn for_stack(stack: &str, public_key: String, fingerprint: String) -> Self {
        Self {
            name: format!("{}-ssh-key", stack),
            public_key,
            fingerprint,
        }
    }
}

/// Droplet (virtual machine) to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropletSpec {
    pub name: String,
    pub image: String,
    pub region: String,
    pub size: String,
    /// Boot-time cloud-init payload, opaque to the bootstrapper
    pub user_data: String,
}

// ============================================================================
// Request
// ============================================================================

/// Everything the orchestration engine needs to bring up one stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionRequest {
    pub stack: String,
    pub ssh_key: SshKeySpec,
    pub droplet: DropletSpec,
    /// Outputs the engine should export once the resources exist
    #[serde(default)]
    pub exports: Vec<String>,
    pub requested_at: DateTime<Utc>,
}

impl ProvisionRequest {
    /// Create a new request; the droplet is named after the stack
    pub fn new(
        stack: impl Into<String>,
        ssh_key: SshKeySpec,
        image: impl Into<String>,
        region: impl Into<String>,
        size: impl Into<String>,
        user_data: impl Into<String>,
    ) -> Self {
        let stack = stack.into();
        let droplet = DropletSpec {
            name: format!("{}-droplet", stack),
            image: image.into(),
            region: region.into(),
            size: size.into(),
            user_data: user_data.into(),
        };

        Self {
            stack,
            ssh_key,
            droplet,
            exports: vec![DROPLET_IP_EXPORT.to_string()],
            requested_at: Utc::now(),
        }
    }

    /// Validate the request structure
    pub fn validate(&self) -> Result<()> {
        if self.stack.is_empty() {
            return Err(TypesError::MissingField("stack".to_string()));
        }
        if self.ssh_key.public_key.trim().is_empty() {
            return Err(TypesError::MissingField("ssh_key.public_key".to_string()));
        }
        if self.ssh_key.public_key.trim_end().contains('\n') {
            return Err(TypesError::Validation(
                "ssh_key.public_key must be a single authorized-keys line".to_string(),
            ));
        }
        for (field, value) in [
            ("droplet.image", &self.droplet.image),
            ("droplet.region", &self.droplet.region),
            ("droplet.size", &self.droplet.size),
        ] {
            if value.is_empty() {
                return Err(TypesError::MissingField(field.to_string()));
            }
        }
        Ok(())
    }

    /// Serialize the request as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
