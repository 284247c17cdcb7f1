//! Policies governing how a stack's key pair is resolved
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


use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do when another process already holds a stack's key lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Block until the other holder releases the lock
    #[default]
    Wait,
    /// Return a lock contention error immediately
    FailFast,
}

impl FromStr for LockMode {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wait" => Ok(LockMode::Wait),
            "fail_fast" | "fail-fast" => Ok(LockMode::FailFast),
            other => Err(TypesError::UnknownLockMode(other.to_string())),
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Wait => write!(f, "wait"),
            LockMode::FailFast => write!(f, "fail_fast"),
        }
    }
}

/// Handling of a stack whose key files are only half present.
///
/// A pair is "partial" when exactly one of `<stack>_id_rsa` and
/// `<stack>_id_rsa.pub` exists, typically after an interrupted generation
/// or an operator deleting one of the files by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialPairPolicy {
    /// Derive the missing public half from the surviving private key.
    /// An orphaned public key is returned unchanged.
    #[default]
    Reconstruct,
    /// Replace whatever is on disk with a freshly generated pair
    Regenerate,
    /// Refuse to continue until the operator repairs the files
    Fail,
}

impl FromStr for PartialPairPolicy {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reconstruct" => Ok(PartialPairPolicy::Reconstruct),
            "regenerate" => Ok(PartialPairPolicy::Regenerate),
            "fail" => Ok(PartialPairPolicy::Fail),
            other => Err(TypesError::UnknownPartialPairPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for PartialPairPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialPairPolicy::Reconstruct => write!(f, "reconstruct"),
            PartialPairPolicy::Regenerate => write!(f, "regenerate"),
            PartialPairPolicy::Fail => write!(f, "fail"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_mode_parsing() {
        assert_eq!("wait".parse::<LockMode>().unwrap(), LockMode::Wait);
        assert_eq!("FAIL_FAST".parse::<LockMode>().unwrap(), LockMode::FailFast);
        assert_eq!("fail-fast".parse::<LockMode>().unwrap(), LockMode::FailFast);
        assert!("spin".parse::<LockMode>().is_err());
    }

    #[test]
    fn test_partial_pair_policy_parsing() {
        assert_eq!(
            "reconstruct".parse::<PartialPairPolicy>().unwrap(),
            PartialPairPolicy::Reconstruct
        );
        assert_eq!(
            " Regenerate ".parse::<PartialPairPolicy>().unwrap(),
            PartialPairPolicy::Regenerate
        );
        assert_eq!("fail".parse::<PartialPairPolicy>().unwrap(), PartialPairPolicy::Fail);

        let err = "ignore".parse::<PartialPairPolicy>().unwrap_err();
        assert!(matches!(err, TypesError::UnknownPartialPairPolicy(ref s) if s == "ignore"));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(LockMode::default(), LockMode::Wait);
        assert_eq!(PartialPairPolicy::default(), PartialPairPolicy::Reconstruct);
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&LockMode::FailFast).unwrap();
        assert_eq!(json, format!("\"{}\"", LockMode::FailFast));

        let policy: PartialPairPolicy = serde_json::from_str("\"regenerate\"").unwrap();
        assert_eq!(policy, PartialPairPolicy::Regenerate);
    }
}
