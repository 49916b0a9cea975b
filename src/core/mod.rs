//! Core data structures for Kiln.
//!
//! This module contains the foundational types used throughout Kiln:
//! - Configurations and their derivation
//! - Targets, hooks and the registry that holds them
//! - The Kiln.toml build description

pub mod config;
pub mod manifest;
pub mod registry;
pub mod target;

pub use config::{ConfigError, ConfigValue, Configuration, Override, OverrideMode};
pub use manifest::{find_manifest, Manifest, ManifestError, Step, MANIFEST_NAME};
pub use registry::{Registry, RegistryError};
pub use target::{HookKind, Role, Target};
