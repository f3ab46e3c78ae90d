//! The complete identity and registry state.
//!
//! An [`AclState`] value is what stores publish: readers get an immutable
//! snapshot, writers mutate a private copy that is swapped in whole. All
//! lookups here are pure reads of one snapshot.

use std::collections::{BTreeMap, BTreeSet};

use bizops_core::{PermissionId, PermissionName, RoleId, UserId, name_key, normalize_email};
use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;
use crate::model::{Permission, Role, RolePermission, User};
use crate::{Error, Result};

/// Users, roles, permissions, grants and the audit trail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclState {
    #[serde(with = "stored_users")]
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) roles: BTreeMap<RoleId, Role>,
    pub(crate) permissions: BTreeMap<PermissionId, Permission>,
    pub(crate) grants: BTreeMap<RoleId, BTreeSet<PermissionId>>,
    pub(crate) audit: Vec<AuditRecord>,
}

/// Persisted form of the user table, which unlike [`User`]'s own serde
/// form carries the password hash.
mod stored_users {
    use std::collections::BTreeMap;

    use bizops_core::UserId;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::model::User;

    #[derive(Serialize)]
    struct StoredUserRef<'a> {
        #[serde(flatten)]
        user: &'a User,
        password_hash: &'a Option<String>,
    }

    #[derive(Deserialize)]
    struct StoredUser {
        #[serde(flatten)]
        user: User,
        #[serde(default)]
        password_hash: Option<String>,
    }

    pub(super) fn serialize<S>(users: &BTreeMap<UserId, User>, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ser.collect_map(users.iter().map(|(id, user)| {
            let stored = StoredUserRef {
                user,
                password_hash: &user.password_hash,
            };
            (id, stored)
        }))
    }

    pub(super) fn deserialize<'de, D>(de: D) -> Result<BTreeMap<UserId, User>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = BTreeMap::<UserId, StoredUser>::deserialize(de)?;
        Ok(stored
            .into_iter()
            .map(|(id, s)| {
                let user = User {
                    password_hash: s.password_hash,
                    ..s.user
                };
                (id, user)
            })
            .collect())
    }
}

impl AclState {
    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    /// User by id.
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// User by email, compared case-insensitively.
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = normalize_email(email).ok()?;
        self.users.values().find(|u| u.email == email)
    }

    /// User linked to an SSO subject.
    pub fn user_by_sso_subject(&self, subject: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.sso_subject.as_deref() == Some(subject))
    }

    /// All users, ordered by id.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Users currently referencing `role_id`.
    pub fn users_with_role(&self, role_id: RoleId) -> impl Iterator<Item = &User> {
        self.users.values().filter(move |u| u.role_id == role_id)
    }

    pub(crate) fn require_user(&self, id: UserId) -> Result<&User> {
        self.users.get(&id).ok_or_else(|| Error::UnknownUser {
            key: id.to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------------

    /// Role by id.
    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id)
    }

    /// Role by name, compared case-insensitively.
    pub fn role_by_name(&self, name: &str) -> Option<&Role> {
        let key = name_key(name);
        self.roles.values().find(|r| name_key(&r.name) == key)
    }

    /// All roles, ordered by id.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub(crate) fn require_role(&self, id: RoleId) -> Result<&Role> {
        self.roles.get(&id).ok_or_else(|| Error::UnknownRole {
            key: id.to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------------

    /// Permission by id.
    pub fn permission(&self, id: PermissionId) -> Option<&Permission> {
        self.permissions.get(&id)
    }

    /// Permission by name.
    pub fn permission_by_name(&self, name: &PermissionName) -> Option<&Permission> {
        self.permissions.values().find(|p| &p.name == name)
    }

    /// All permissions, ordered by id.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.values()
    }

    pub(crate) fn require_permission(&self, id: PermissionId) -> Result<&Permission> {
        self.permissions
            .get(&id)
            .ok_or_else(|| Error::UnknownPermission {
                key: id.to_string(),
            })
    }

    // ------------------------------------------------------------------------
    // Grants
    // ------------------------------------------------------------------------

    /// Every (role, permission) grant.
    pub fn grants(&self) -> impl Iterator<Item = RolePermission> + '_ {
        self.grants.iter().flat_map(|(role_id, perms)| {
            perms.iter().map(move |permission_id| RolePermission {
                role_id: *role_id,
                permission_id: *permission_id,
            })
        })
    }

    /// Whether `role_id` holds `permission_id`.
    pub fn is_granted(&self, role_id: RoleId, permission_id: PermissionId) -> bool {
        self.grants
            .get(&role_id)
            .is_some_and(|perms| perms.contains(&permission_id))
    }

    /// The exact permissions granted to a role, sorted by name.
    pub fn effective_permissions(&self, role_id: RoleId) -> Result<Vec<&Permission>> {
        self.require_role(role_id)?;
        let mut perms: Vec<&Permission> = self
            .grants
            .get(&role_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.permissions.get(id))
            .collect();
        perms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(perms)
    }

    /// Names of the permissions granted to a role.
    pub fn effective_permission_names(&self, role_id: RoleId) -> Result<BTreeSet<PermissionName>> {
        Ok(self
            .effective_permissions(role_id)?
            .into_iter()
            .map(|p| p.name.clone())
            .collect())
    }

    // ------------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------------

    /// The audit trail, oldest first.
    pub fn audit(&self) -> &[AuditRecord] {
        &self.audit
    }
}
