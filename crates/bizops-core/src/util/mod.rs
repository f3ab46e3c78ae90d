//! Utility modules shared by the Bizops crates.
//!
//! # Modules
//!
//! - [`ids`]: Normalization of emails and names used as lookup keys

pub mod ids;
