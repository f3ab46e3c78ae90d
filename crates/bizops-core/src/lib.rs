//! Bizops Core — shared ids, permission names, configuration and errors.
//!
//! This crate provides the foundational types used across all Bizops crates.
//! It has no internal Bizops dependencies.
//!
//! # Modules
//!
//! - [`config`]: Process configuration loaded once at start-up
//! - [`error`]: Error types and Result alias
//! - [`ids`]: Identifier newtypes
//! - [`permission`]: `<resource>.<action>` names and seeding patterns
//! - [`util`]: Key normalization helpers

pub mod config;
pub mod error;
pub mod ids;
pub mod permission;
pub mod util;

#[cfg(test)]
mod proptests;

// Re-export key types at crate root for convenience
pub use config::{BizopsConfig, BootstrapAdmin, RolePolicy};
pub use error::{Error, Result};
pub use ids::{PermissionId, RoleId, UserId};
pub use permission::{PermissionName, PermissionPattern};

// Convenience re-exports from util
pub use util::ids::{name_key, normalize_email};
