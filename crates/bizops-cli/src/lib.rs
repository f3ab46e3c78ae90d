//! # bizops-cli
//!
//! Administration CLI for Bizops access control.
//!
//! This crate provides command-line tools for operators:
//! - Seeding the permission catalog, role policies and bootstrap administrator
//! - User, role and permission management
//! - Authorization checks and credential verification
//! - Audit trail inspection
//! - Configuration file inspection and creation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config_handlers;
pub mod error;

pub use cli::{Cli, Command};
pub use commands::{Context, Outcome};
pub use error::{Error, Result};
