//! Authorization decisions.
//!
//! A decision is a pure function of one state snapshot: the principal's
//! active flag, its role, and that role's grants. Nothing is cached between
//! calls, so a grant, revoke or role change applies to the next check.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use bizops_core::PermissionName;
use serde::Serialize;
use tracing::instrument;

use crate::principal::Principal;
use crate::state::AclState;
use crate::store::AclStore;
use crate::{Error, Result};

/// Why access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The principal's account is deactivated.
    AccountInactive,
    /// The principal's role does not hold the permission.
    PermissionNotGranted,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AccountInactive => "account inactive",
            Self::PermissionNotGranted => "permission not granted",
        })
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    /// The request may proceed.
    Allow,
    /// The request must be rejected.
    Deny(DenyReason),
}

impl Decision {
    /// Whether this is [`Decision::Allow`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert a denial into the matching error.
    pub fn into_result(self, permission: &str) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::AccountInactive) => Err(Error::AccountInactive),
            Decision::Deny(DenyReason::PermissionNotGranted) => Err(Error::PermissionNotGranted {
                permission: permission.to_string(),
            }),
        }
    }
}

/// Decide against one snapshot.
///
/// Fails with `UnknownUser` if the principal does not resolve. Inactive
/// accounts are denied before grants are looked at.
pub fn decide(
    state: &AclState,
    principal: &Principal,
    permission: &PermissionName,
) -> Result<Decision> {
    let user = state.require_user(principal.user_id)?;
    if !user.active {
        return Ok(Decision::Deny(DenyReason::AccountInactive));
    }
    let granted = state
        .permission_by_name(permission)
        .is_some_and(|p| state.is_granted(user.role_id, p.id));
    Ok(if granted {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::PermissionNotGranted)
    })
}

/// Answers "may this principal do this?".
pub struct Authorizer<S> {
    store: Arc<S>,
}

impl<S> Clone for Authorizer<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: AclStore> Authorizer<S> {
    /// Build over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Decide whether `principal` may perform `action` on `resource`.
    ///
    /// A resource or action that cannot form a permission name is denied
    /// as not granted.
    #[instrument(level = "debug", skip(self, principal), fields(principal = %principal))]
    pub async fn authorize(
        &self,
        principal: &Principal,
        resource: &str,
        action: &str,
    ) -> Result<Decision> {
        match PermissionName::new(resource, action) {
            Ok(permission) => self.authorize_permission(principal, &permission).await,
            Err(_) => {
                let snapshot = self.store.snapshot().await?;
                let user = snapshot.require_user(principal.user_id)?;
                let reason = if user.active {
                    DenyReason::PermissionNotGranted
                } else {
                    DenyReason::AccountInactive
                };
                tracing::debug!(%reason, "malformed permission request denied");
                Ok(Decision::Deny(reason))
            }
        }
    }

    /// Decide for an already parsed permission name.
    pub async fn authorize_permission(
        &self,
        principal: &Principal,
        permission: &PermissionName,
    ) -> Result<Decision> {
        let snapshot = self.store.snapshot().await?;
        let decision = decide(&snapshot, principal, permission)?;
        match decision {
            Decision::Allow => {
                tracing::debug!(%principal, %permission, "access allowed");
            }
            Decision::Deny(reason) => {
                tracing::info!(%principal, %permission, %reason, "access denied");
            }
        }
        Ok(decision)
    }

    /// Like [`authorize`](Self::authorize), but a denial is an error.
    ///
    /// Meant for request handlers that bail out with `?`.
    pub async fn require(&self, principal: &Principal, resource: &str, action: &str) -> Result<()> {
        self.authorize(principal, resource, action)
            .await?
            .into_result(&format!("{resource}.{action}"))
    }

    /// Every permission the principal currently holds.
    ///
    /// Empty for inactive accounts, since every check would deny them.
    pub async fn permissions_for(&self, principal: &Principal) -> Result<BTreeSet<PermissionName>> {
        let snapshot = self.store.snapshot().await?;
        let user = snapshot.require_user(principal.user_id)?;
        if !user.active {
            return Ok(BTreeSet::new());
        }
        snapshot.effective_permission_names(user.role_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bizops_core::{PermissionId, RoleId, UserId};
    use chrono::Utc;

    use crate::model::{Permission, Role, User};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        principal: Principal,
        role_id: RoleId,
        perm_id: PermissionId,
    }

    async fn fixture() -> Fixture {
        let now = Utc::now();
        let role = Role {
            id: RoleId::new(),
            name: "Sales".into(),
            description: String::new(),
            created_at: now,
        };
        let perm = Permission {
            id: PermissionId::new(),
            name: "orders.create".parse().unwrap(),
            description: String::new(),
            created_at: now,
        };
        let user = User {
            id: UserId::new(),
            email: "alice@x.com".into(),
            display_name: "Alice".into(),
            password_hash: None,
            sso_subject: None,
            role_id: role.id,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let fx = Fixture {
            store: Arc::new(MemoryStore::new()),
            principal: Principal::new(user.id),
            role_id: role.id,
            perm_id: perm.id,
        };
        fx.store
            .transact(move |s| {
                s.grants.entry(role.id).or_default().insert(perm.id);
                s.roles.insert(role.id, role);
                s.permissions.insert(perm.id, perm);
                s.users.insert(user.id, user);
                Ok(())
            })
            .await
            .unwrap();
        fx
    }

    #[tokio::test]
    async fn test_allow_when_granted() {
        let fx = fixture().await;
        let auth = Authorizer::new(fx.store.clone());
        let decision = auth.authorize(&fx.principal, "orders", "create").await.unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_deny_when_not_granted() {
        let fx = fixture().await;
        let auth = Authorizer::new(fx.store.clone());
        let decision = auth.authorize(&fx.principal, "invoices", "delete").await.unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::PermissionNotGranted));
    }

    #[tokio::test]
    async fn test_revoke_applies_to_next_check() {
        let fx = fixture().await;
        let auth = Authorizer::new(fx.store.clone());
        let (role_id, perm_id) = (fx.role_id, fx.perm_id);
        fx.store
            .transact(move |s| {
                s.grants.entry(role_id).or_default().remove(&perm_id);
                Ok(())
            })
            .await
            .unwrap();
        let decision = auth.authorize(&fx.principal, "orders", "create").await.unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::PermissionNotGranted));
    }

    #[tokio::test]
    async fn test_inactive_denied_even_when_granted() {
        let fx = fixture().await;
        let auth = Authorizer::new(fx.store.clone());
        let user_id = fx.principal.user_id;
        fx.store
            .transact(move |s| {
                s.users.get_mut(&user_id).unwrap().active = false;
                Ok(())
            })
            .await
            .unwrap();
        let decision = auth.authorize(&fx.principal, "orders", "create").await.unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::AccountInactive));
        let err = auth.require(&fx.principal, "orders", "create").await.unwrap_err();
        assert!(matches!(err, Error::AccountInactive));
        assert!(auth.permissions_for(&fx.principal).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_principal_is_error() {
        let fx = fixture().await;
        let auth = Authorizer::new(fx.store.clone());
        let err = auth
            .authorize(&Principal::new(UserId::new()), "orders", "create")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownUser { .. }));
    }

    #[tokio::test]
    async fn test_malformed_request_denied() {
        let fx = fixture().await;
        let auth = Authorizer::new(fx.store.clone());
        let malformed = [
            ("", "create"),
            ("orders", ""),
            ("Orders", "create"),
            ("orders.x", "y"),
        ];
        for (resource, action) in malformed {
            let decision = auth.authorize(&fx.principal, resource, action).await.unwrap();
            assert_eq!(decision, Decision::Deny(DenyReason::PermissionNotGranted));
        }
    }

    #[tokio::test]
    async fn test_require_reports_permission() {
        let fx = fixture().await;
        let auth = Authorizer::new(fx.store.clone());
        auth.require(&fx.principal, "orders", "create").await.unwrap();
        let err = auth.require(&fx.principal, "orders", "delete").await.unwrap_err();
        assert!(matches!(
            err,
            Error::PermissionNotGranted { ref permission } if permission == "orders.delete"
        ));
    }

    #[tokio::test]
    async fn test_permissions_for() {
        let fx = fixture().await;
        let auth = Authorizer::new(fx.store.clone());
        let perms = auth.permissions_for(&fx.principal).await.unwrap();
        let names: Vec<String> = perms.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["orders.create"]);
    }

    #[test]
    fn test_decision_serializes() {
        let json = serde_json::to_value(Decision::Deny(DenyReason::AccountInactive)).unwrap();
        assert_eq!(json["decision"], "deny");
        assert_eq!(json["reason"], "account_inactive");
        assert!(Decision::Allow.is_allowed());
    }
}
