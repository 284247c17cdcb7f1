//! Bootstrap Types
//!
//! Shared type definitions used across the droplet bootstrap crates:
//! key-handling policies and the provisioning request handed to the
//! infrastructure orchestration engine.

pub mod error;
pub mod policy;
pub mod schemas;

pub use error::*;
pub use policy::*;
pub use schemas::*;
