//! Role/permission registry.
//!
//! Owns roles, permissions and the grants between them. A role's effective
//! permission set is exactly its grants: there are no deny entries and no
//! inheritance between roles.
//!
//! The configured superuser role is kept complete at write time. Defining
//! it grants every existing permission, and defining a permission grants it
//! to the superuser role in the same transaction. Decisions therefore never
//! need to look at role names.

use std::sync::Arc;

use bizops_core::config::AuthSettings;
use bizops_core::{PermissionId, PermissionName, RoleId, UserId, name_key};
use serde_json::json;
use tracing::instrument;

use crate::audit::{AuditAction, EntityKind, Stamp};
use crate::model::{Permission, Role};
use crate::state::AclState;
use crate::store::AclStore;
use crate::{Error, Result};

/// Role names with special meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSettings {
    /// Role given to SSO-provisioned accounts.
    pub default_role: String,
    /// Role kept granted with every permission.
    pub superuser_role: Option<String>,
}

impl RoleSettings {
    /// Whether `name` is the superuser role.
    pub fn is_superuser(&self, name: &str) -> bool {
        self.superuser_role
            .as_deref()
            .is_some_and(|s| name_key(s) == name_key(name))
    }

    /// Whether `name` may not be deleted or renamed.
    pub fn is_protected(&self, name: &str) -> bool {
        self.is_superuser(name) || name_key(&self.default_role) == name_key(name)
    }
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self::from(&AuthSettings::default())
    }
}

impl From<&AuthSettings> for RoleSettings {
    fn from(auth: &AuthSettings) -> Self {
        Self {
            default_role: auth.default_role.clone(),
            superuser_role: auth.superuser_role.clone(),
        }
    }
}

fn clean_role_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation_field("name", "role name must not be empty"));
    }
    Ok(name.to_string())
}

// ============================================================================
// State mutations
// ============================================================================

impl AclState {
    fn superuser_role_id(&self, settings: &RoleSettings) -> Option<RoleId> {
        let name = settings.superuser_role.as_deref()?;
        self.role_by_name(name).map(|r| r.id)
    }

    pub(crate) fn ensure_role_name_free(&self, name: &str, except: Option<RoleId>) -> Result<()> {
        match self.role_by_name(name) {
            Some(r) if Some(r.id) != except => Err(Error::DuplicateRole {
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn insert_grant(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
        stamp: &Stamp,
    ) -> bool {
        if !self.grants.entry(role_id).or_default().insert(permission_id) {
            return false;
        }
        self.audit.push(stamp.record(
            EntityKind::Role,
            role_id,
            AuditAction::Grant,
            json!({"permission_id": permission_id}),
        ));
        true
    }

    pub(crate) fn insert_permission(
        &mut self,
        name: PermissionName,
        description: &str,
        settings: &RoleSettings,
        stamp: &Stamp,
    ) -> Result<Permission> {
        if self.permission_by_name(&name).is_some() {
            return Err(Error::DuplicatePermission {
                name: name.to_string(),
            });
        }
        let permission = Permission {
            id: PermissionId::new(),
            name,
            description: description.trim().to_string(),
            created_at: stamp.at,
        };
        self.audit.push(stamp.record(
            EntityKind::Permission,
            permission.id,
            AuditAction::Create,
            json!({"name": permission.name, "description": permission.description}),
        ));
        self.permissions.insert(permission.id, permission.clone());

        if let Some(superuser) = self.superuser_role_id(settings) {
            self.insert_grant(superuser, permission.id, stamp);
        }
        Ok(permission)
    }

    pub(crate) fn insert_role(
        &mut self,
        name: &str,
        description: &str,
        settings: &RoleSettings,
        stamp: &Stamp,
    ) -> Result<Role> {
        let name = clean_role_name(name)?;
        self.ensure_role_name_free(&name, None)?;
        let role = Role {
            id: RoleId::new(),
            name,
            description: description.trim().to_string(),
            created_at: stamp.at,
        };
        self.audit.push(stamp.record(
            EntityKind::Role,
            role.id,
            AuditAction::Create,
            json!({"name": role.name, "description": role.description}),
        ));
        self.roles.insert(role.id, role.clone());

        if settings.is_superuser(&role.name) {
            let all: Vec<PermissionId> = self.permissions.keys().copied().collect();
            for permission_id in all {
                self.insert_grant(role.id, permission_id, stamp);
            }
        }
        Ok(role)
    }

    pub(crate) fn grant_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
        stamp: &Stamp,
    ) -> Result<bool> {
        self.require_role(role_id)?;
        self.require_permission(permission_id)?;
        Ok(self.insert_grant(role_id, permission_id, stamp))
    }

    pub(crate) fn revoke_permission(
        &mut self,
        role_id: RoleId,
        permission_id: PermissionId,
        stamp: &Stamp,
    ) -> Result<bool> {
        self.require_role(role_id)?;
        self.require_permission(permission_id)?;
        let removed = self
            .grants
            .get_mut(&role_id)
            .is_some_and(|perms| perms.remove(&permission_id));
        if removed {
            self.audit.push(stamp.record(
                EntityKind::Role,
                role_id,
                AuditAction::Revoke,
                json!({"permission_id": permission_id}),
            ));
        }
        Ok(removed)
    }

    fn ensure_role_unreferenced(&self, role: &Role) -> Result<()> {
        let users = self.users_with_role(role.id).count();
        if users > 0 {
            return Err(Error::RoleInUse {
                name: role.name.clone(),
                users,
            });
        }
        Ok(())
    }

    pub(crate) fn remove_role(
        &mut self,
        role_id: RoleId,
        settings: &RoleSettings,
        stamp: &Stamp,
    ) -> Result<Role> {
        let role = self.require_role(role_id)?.clone();
        if settings.is_protected(&role.name) {
            return Err(Error::ProtectedRole { name: role.name });
        }
        self.ensure_role_unreferenced(&role)?;

        self.roles.remove(&role_id);
        let revoked = self.grants.remove(&role_id).map_or(0, |g| g.len());
        self.audit.push(stamp.record(
            EntityKind::Role,
            role_id,
            AuditAction::Delete,
            json!({"name": role.name, "revoked": revoked}),
        ));
        Ok(role)
    }

    pub(crate) fn rename_role(
        &mut self,
        role_id: RoleId,
        new_name: &str,
        settings: &RoleSettings,
        stamp: &Stamp,
    ) -> Result<Role> {
        let new_name = clean_role_name(new_name)?;
        let role = self.require_role(role_id)?.clone();
        if settings.is_protected(&role.name) || settings.is_protected(&new_name) {
            return Err(Error::ProtectedRole { name: role.name });
        }
        self.ensure_role_unreferenced(&role)?;
        self.ensure_role_name_free(&new_name, Some(role_id))?;
        if new_name == role.name {
            return Ok(role);
        }

        self.audit.push(stamp.record(
            EntityKind::Role,
            role_id,
            AuditAction::Update,
            json!({"name": {"old": role.name, "new": new_name}}),
        ));
        let role = self
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| Error::UnknownRole {
                key: role_id.to_string(),
            })?;
        role.name = new_name;
        Ok(role.clone())
    }

    pub(crate) fn remove_permission(
        &mut self,
        permission_id: PermissionId,
        stamp: &Stamp,
    ) -> Result<Permission> {
        let permission = self
            .permissions
            .remove(&permission_id)
            .ok_or_else(|| Error::UnknownPermission {
                key: permission_id.to_string(),
            })?;
        let mut revoked = 0;
        for perms in self.grants.values_mut() {
            if perms.remove(&permission_id) {
                revoked += 1;
            }
        }
        self.audit.push(stamp.record(
            EntityKind::Permission,
            permission_id,
            AuditAction::Delete,
            json!({"name": permission.name, "revoked_from": revoked}),
        ));
        Ok(permission)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Operations on roles, permissions and grants.
pub struct Registry<S> {
    pub(crate) store: Arc<S>,
    pub(crate) settings: Arc<RoleSettings>,
    actor: Option<UserId>,
}

impl<S> Clone for Registry<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            settings: self.settings.clone(),
            actor: self.actor,
        }
    }
}

impl<S: AclStore> Registry<S> {
    /// Build over a shared store.
    pub fn new(store: Arc<S>, settings: RoleSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
            actor: None,
        }
    }

    /// A handle whose mutations are attributed to `actor`.
    pub fn acting_as(&self, actor: UserId) -> Self {
        Self {
            actor: Some(actor),
            ..self.clone()
        }
    }

    /// The special role names in effect.
    pub fn settings(&self) -> &RoleSettings {
        &self.settings
    }

    pub(crate) fn stamp(&self) -> Stamp {
        Stamp::now(self.actor)
    }

    /// Define a `<resource>.<action>` permission.
    ///
    /// Fails with `DuplicatePermission` if the name exists and `Validation`
    /// if it is malformed.
    #[instrument(level = "debug", skip(self))]
    pub async fn define_permission(&self, name: &str, description: &str) -> Result<Permission> {
        let name: PermissionName = name.parse()?;
        let description = description.to_string();
        let settings = self.settings.clone();
        let stamp = self.stamp();
        let permission = self
            .store
            .transact(move |s| s.insert_permission(name, &description, &settings, &stamp))
            .await?;
        tracing::info!(permission = %permission.name, "permission defined");
        Ok(permission)
    }

    /// Define a role. Names are unique case-insensitively.
    #[instrument(level = "debug", skip(self))]
    pub async fn define_role(&self, name: &str, description: &str) -> Result<Role> {
        let (name, description) = (name.to_string(), description.to_string());
        let settings = self.settings.clone();
        let stamp = self.stamp();
        let role = self
            .store
            .transact(move |s| s.insert_role(&name, &description, &settings, &stamp))
            .await?;
        tracing::info!(role = %role.name, role_id = %role.id, "role defined");
        Ok(role)
    }

    /// Grant a permission to a role. Granting twice is a no-op.
    #[instrument(level = "debug", skip(self))]
    pub async fn grant(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        let stamp = self.stamp();
        if self
            .store
            .transact(move |s| s.grant_permission(role_id, permission_id, &stamp))
            .await?
        {
            tracing::info!(%role_id, %permission_id, "permission granted");
        }
        Ok(())
    }

    /// Revoke a permission from a role. Revoking an ungranted permission is
    /// a no-op.
    #[instrument(level = "debug", skip(self))]
    pub async fn revoke(&self, role_id: RoleId, permission_id: PermissionId) -> Result<()> {
        let stamp = self.stamp();
        if self
            .store
            .transact(move |s| s.revoke_permission(role_id, permission_id, &stamp))
            .await?
        {
            tracing::info!(%role_id, %permission_id, "permission revoked");
        }
        Ok(())
    }

    /// The exact granted set of a role, sorted by name.
    pub async fn effective_permissions(&self, role_id: RoleId) -> Result<Vec<Permission>> {
        let snapshot = self.store.snapshot().await?;
        Ok(snapshot
            .effective_permissions(role_id)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// Delete a role together with its grants.
    ///
    /// Fails with `RoleInUse` while any user references it, and with
    /// `ProtectedRole` for the superuser and default roles.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete_role(&self, role_id: RoleId) -> Result<()> {
        let settings = self.settings.clone();
        let stamp = self.stamp();
        let role = self
            .store
            .transact(move |s| s.remove_role(role_id, &settings, &stamp))
            .await?;
        tracing::info!(role = %role.name, %role_id, "role deleted");
        Ok(())
    }

    /// Rename a role that no user references yet.
    #[instrument(level = "debug", skip(self))]
    pub async fn rename_role(&self, role_id: RoleId, new_name: &str) -> Result<Role> {
        let new_name = new_name.to_string();
        let settings = self.settings.clone();
        let stamp = self.stamp();
        self.store
            .transact(move |s| s.rename_role(role_id, &new_name, &settings, &stamp))
            .await
    }

    /// Delete a permission and every grant of it.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete_permission(&self, permission_id: PermissionId) -> Result<()> {
        let stamp = self.stamp();
        let permission = self
            .store
            .transact(move |s| s.remove_permission(permission_id, &stamp))
            .await?;
        tracing::info!(permission = %permission.name, "permission deleted");
        Ok(())
    }

    /// Role by id.
    pub async fn get_role(&self, role_id: RoleId) -> Result<Role> {
        Ok(self.store.snapshot().await?.require_role(role_id)?.clone())
    }

    /// Role by name (case-insensitive).
    pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self.store.snapshot().await?.role_by_name(name).cloned())
    }

    /// Permission by `<resource>.<action>` name.
    pub async fn find_permission(&self, name: &str) -> Result<Option<Permission>> {
        let name: PermissionName = name.parse()?;
        Ok(self
            .store
            .snapshot()
            .await?
            .permission_by_name(&name)
            .cloned())
    }

    /// All roles, sorted by name.
    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        let snapshot = self.store.snapshot().await?;
        let mut roles: Vec<Role> = snapshot.roles().cloned().collect();
        roles.sort_by_key(|r| name_key(&r.name));
        Ok(roles)
    }

    /// All permissions, sorted by name.
    pub async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let snapshot = self.store.snapshot().await?;
        let mut perms: Vec<Permission> = snapshot.permissions().cloned().collect();
        perms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(perms)
    }
}
