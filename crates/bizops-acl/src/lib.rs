//! # bizops-acl
//!
//! Access control for Bizops:
//! - Identity store: accounts, credentials, one role per user
//! - Role/permission registry: roles, `<resource>.<action>` permissions, grants
//! - Authorization decisions: allow or deny for a principal and a permission
//! - Role policies seeded from configuration
//! - Audit trail of every committed mutation
//!
//! All three components share one [`AclStore`]. [`Acl`] bundles them over a
//! single store.
//!
//! ```no_run
//! # async fn demo() -> bizops_acl::Result<()> {
//! use bizops_acl::{Acl, MemoryStore, Principal};
//! use bizops_core::BizopsConfig;
//!
//! let config = BizopsConfig::default();
//! let acl = Acl::from_config(MemoryStore::new(), &config)?;
//! acl.registry().seed(&config).await?;
//!
//! let sales = acl.registry().find_role_by_name("Sales").await?;
//! # let sales = sales.unwrap();
//! let alice = acl
//!     .identity()
//!     .create_user("alice@example.com", "Alice", Some("s3cret"), sales.id)
//!     .await?;
//! let decision = acl
//!     .authorizer()
//!     .authorize(&Principal::new(alice.id), "orders", "create")
//!     .await?;
//! assert!(decision.is_allowed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

use std::sync::Arc;

use bizops_core::config::PasswordSettings;
use bizops_core::{BizopsConfig, UserId};

pub mod audit;
pub mod enforcement;
pub mod error;
pub mod identity;
pub mod model;
pub mod password;
pub mod policy;
pub mod principal;
pub mod registry;
pub mod state;
pub mod store;

#[cfg(test)]
mod proptests;

pub use audit::{AuditAction, AuditRecord, EntityKind};
pub use enforcement::{Authorizer, Decision, DenyReason, decide};
pub use error::{Error, ErrorKind, Result};
pub use identity::{IdentityStore, NewUser, ProfileUpdate};
pub use model::{Permission, Role, RolePermission, User};
pub use password::CredentialHasher;
pub use policy::{PolicyOutcome, SeedReport, expand_patterns};
pub use principal::Principal;
pub use registry::{Registry, RoleSettings};
pub use state::AclState;
pub use store::{AclStore, JsonFileStore, MemoryStore};

/// Settings the components need from process configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AclSettings {
    /// Default and superuser role names.
    pub roles: RoleSettings,
    /// Credential hashing cost.
    pub password: PasswordSettings,
}

impl AclSettings {
    /// Take the relevant sections of `config`.
    pub fn from_config(config: &BizopsConfig) -> Self {
        Self {
            roles: RoleSettings::from(&config.auth),
            password: config.password.clone(),
        }
    }
}

/// Identity store, registry and authorizer over one shared store.
pub struct Acl<S> {
    store: Arc<S>,
    identity: IdentityStore<S>,
    registry: Registry<S>,
    authorizer: Authorizer<S>,
}

impl<S> Clone for Acl<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            identity: self.identity.clone(),
            registry: self.registry.clone(),
            authorizer: self.authorizer.clone(),
        }
    }
}

impl<S: AclStore> Acl<S> {
    /// Build the components over `store`.
    pub fn new(store: S, settings: AclSettings) -> Result<Self> {
        Self::with_shared_store(Arc::new(store), settings)
    }

    /// Build from process configuration.
    pub fn from_config(store: S, config: &BizopsConfig) -> Result<Self> {
        Self::new(store, AclSettings::from_config(config))
    }

    /// Build over a store that is also used elsewhere.
    pub fn with_shared_store(store: Arc<S>, settings: AclSettings) -> Result<Self> {
        let hasher = Arc::new(CredentialHasher::new(&settings.password)?);
        Ok(Self {
            identity: IdentityStore::new(store.clone(), hasher),
            registry: Registry::new(store.clone(), settings.roles),
            authorizer: Authorizer::new(store.clone()),
            store,
        })
    }

    /// User accounts.
    pub fn identity(&self) -> &IdentityStore<S> {
        &self.identity
    }

    /// Roles, permissions and grants.
    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    /// Authorization decisions.
    pub fn authorizer(&self) -> &Authorizer<S> {
        &self.authorizer
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handles whose mutations are attributed to `actor` in the audit trail.
    pub fn acting_as(&self, actor: UserId) -> Self {
        Self {
            store: self.store.clone(),
            identity: self.identity.acting_as(actor),
            registry: self.registry.acting_as(actor),
            authorizer: self.authorizer.clone(),
        }
    }

    /// Shorthand for [`Authorizer::authorize`].
    pub async fn authorize(
        &self,
        principal: &Principal,
        resource: &str,
        action: &str,
    ) -> Result<Decision> {
        self.authorizer.authorize(principal, resource, action).await
    }

    /// The audit trail, oldest first.
    pub async fn audit_log(&self) -> Result<Vec<AuditRecord>> {
        Ok(self.store.snapshot().await?.audit().to_vec())
    }
}

impl<S> std::fmt::Debug for Acl<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acl").finish_non_exhaustive()
    }
}
