//! Authentication boundary for Bizops.
//!
//! Bearer tokens and OAuth flows are validated elsewhere. This crate takes
//! the identity they yield and connects it to the access-control core:
//! - [`AuthenticatedUser`]: identity extracted from a validated token
//! - [`PrincipalResolver`]: identity to [`bizops_acl::Principal`], with SSO
//!   first-login provisioning
//! - [`bootstrap_admin`]: seeds the initial administrator
//! - [`AuthError`]: error type with HTTP status mapping and client-safe
//!   messages

mod bootstrap;
mod error;
mod provision;
mod user;

pub use bootstrap::{BootstrapOutcome, bootstrap_admin};
pub use error::{AUTHENTICATION_FAILED, AuthError, ErrorBody, status_for_kind};
pub use provision::PrincipalResolver;
pub use user::{AuthenticatedUser, email_from_parts, require_user, user_from_parts};
