//! Records owned by the identity store and the registry.

use std::fmt;

use bizops_core::{PermissionId, PermissionName, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account.
///
/// Every user references exactly one role. The password credential is a
/// PHC-format Argon2id hash and is absent for SSO-provisioned accounts.
/// It never appears in `Debug` output or in this type's serialized form;
/// only the store persists it.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique id.
    pub id: UserId,
    /// Normalized (lowercase) email, unique.
    pub email: String,
    /// Display name.
    pub display_name: String,
    #[serde(skip)]
    pub(crate) password_hash: Option<String>,
    /// Subject of the linked SSO identity, unique when present.
    pub sso_subject: Option<String>,
    /// The user's single role.
    pub role_id: RoleId,
    /// Inactive accounts fail every credential and authorization check.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether password login is possible for this account.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "<redacted>"),
            )
            .field("sso_subject", &self.sso_subject)
            .field("role_id", &self.role_id)
            .field("active", &self.active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// A named role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Unique id.
    pub id: RoleId,
    /// Unique name, compared case-insensitively.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A grantable `<resource>.<action>` capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique id.
    pub id: PermissionId,
    /// Unique name.
    pub name: PermissionName,
    /// Human-readable description.
    pub description: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One (role, permission) grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RolePermission {
    /// Granted role.
    pub role_id: RoleId,
    /// Granted permission.
    pub permission_id: PermissionId,
}
