//! Pattern-based role policies.
//!
//! A [`RolePolicy`] names a role and a list of permission patterns
//! (`*.view`, `orders.*`, `*.*` or an exact name). Patterns are expanded
//! against a permission catalog when the policy is applied and stored as
//! ordinary explicit grants.

use std::collections::BTreeSet;

use bizops_core::{BizopsConfig, PermissionName, PermissionPattern, RoleId, RolePolicy};
use serde::Serialize;
use tracing::instrument;

use crate::audit::Stamp;
use crate::registry::{Registry, RoleSettings};
use crate::state::AclState;
use crate::store::AclStore;
use crate::Result;

/// Expand patterns into concrete permission names.
///
/// Wildcards match against `catalog`; an exact pattern always yields its
/// own name, whether or not the catalog lists it.
pub fn expand_patterns(
    patterns: &[PermissionPattern],
    catalog: &[PermissionName],
) -> BTreeSet<PermissionName> {
    let mut out = BTreeSet::new();
    for pattern in patterns {
        match pattern.as_exact() {
            Some(name) => {
                out.insert(name);
            }
            None => out.extend(catalog.iter().filter(|n| pattern.matches(n)).cloned()),
        }
    }
    out
}

/// What applying one policy changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyOutcome {
    /// The policy's role.
    pub role_id: RoleId,
    /// Whether the role had to be defined.
    pub role_created: bool,
    /// Permissions that had to be defined.
    pub permissions_defined: usize,
    /// New grants, not counting ones already present.
    pub grants_added: usize,
}

/// Totals of a [`Registry::seed`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Permissions defined.
    pub permissions_defined: usize,
    /// Roles defined.
    pub roles_defined: usize,
    /// Grants added.
    pub grants_added: usize,
}

impl AclState {
    fn ensure_permission(
        &mut self,
        name: &PermissionName,
        settings: &RoleSettings,
        stamp: &Stamp,
    ) -> Result<(bizops_core::PermissionId, bool)> {
        if let Some(existing) = self.permission_by_name(name) {
            return Ok((existing.id, false));
        }
        let created = self.insert_permission(name.clone(), "", settings, stamp)?;
        Ok((created.id, true))
    }

    fn ensure_role(
        &mut self,
        name: &str,
        description: &str,
        settings: &RoleSettings,
        stamp: &Stamp,
    ) -> Result<(RoleId, bool)> {
        if let Some(existing) = self.role_by_name(name) {
            return Ok((existing.id, false));
        }
        let created = self.insert_role(name, description, settings, stamp)?;
        Ok((created.id, true))
    }

    pub(crate) fn apply_policy(
        &mut self,
        policy: &RolePolicy,
        catalog: &[PermissionName],
        settings: &RoleSettings,
        stamp: &Stamp,
    ) -> Result<PolicyOutcome> {
        let patterns = policy.patterns()?;
        let mut universe: BTreeSet<PermissionName> = catalog.iter().cloned().collect();
        universe.extend(self.permissions().map(|p| p.name.clone()));
        let universe: Vec<PermissionName> = universe.into_iter().collect();
        let wanted = expand_patterns(&patterns, &universe);

        let (role_id, role_created) =
            self.ensure_role(&policy.name, &policy.description, settings, stamp)?;
        let mut outcome = PolicyOutcome {
            role_id,
            role_created,
            permissions_defined: 0,
            grants_added: 0,
        };
        for name in &wanted {
            let (permission_id, defined) = self.ensure_permission(name, settings, stamp)?;
            if defined {
                outcome.permissions_defined += 1;
            }
            if self.insert_grant(role_id, permission_id, stamp) {
                outcome.grants_added += 1;
            }
        }
        Ok(outcome)
    }

    pub(crate) fn seed(
        &mut self,
        config: &BizopsConfig,
        settings: &RoleSettings,
        stamp: &Stamp,
    ) -> Result<SeedReport> {
        let catalog = config.catalog.permissions()?;
        let mut report = SeedReport::default();
        for name in &catalog {
            if self.ensure_permission(name, settings, stamp)?.1 {
                report.permissions_defined += 1;
            }
        }

        for policy in &config.roles {
            let outcome = self.apply_policy(policy, &catalog, settings, stamp)?;
            report.roles_defined += usize::from(outcome.role_created);
            report.permissions_defined += outcome.permissions_defined;
            report.grants_added += outcome.grants_added;
        }

        let special = [
            Some(settings.default_role.as_str()),
            settings.superuser_role.as_deref(),
        ];
        for name in special.into_iter().flatten() {
            if self.ensure_role(name, "", settings, stamp)?.1 {
                report.roles_defined += 1;
            }
        }
        Ok(report)
    }
}

impl<S: AclStore> Registry<S> {
    /// Apply one policy: define missing permissions and the role, then
    /// grant the expansion. Idempotent.
    #[instrument(level = "debug", skip(self, policy, catalog), fields(role = %policy.name))]
    pub async fn apply_policy(
        &self,
        policy: &RolePolicy,
        catalog: &[PermissionName],
    ) -> Result<PolicyOutcome> {
        let (policy, catalog) = (policy.clone(), catalog.to_vec());
        let settings = self.settings.clone();
        let stamp = self.stamp();
        self.store
            .transact(move |s| s.apply_policy(&policy, &catalog, &settings, &stamp))
            .await
    }

    /// Seed the catalog permissions, every configured role policy, and the
    /// default and superuser roles, all in one transaction. Idempotent.
    #[instrument(level = "debug", skip_all)]
    pub async fn seed(&self, config: &BizopsConfig) -> Result<SeedReport> {
        let config = config.clone();
        let settings = self.settings.clone();
        let stamp = self.stamp();
        let report = self
            .store
            .transact(move |s| s.seed(&config, &settings, &stamp))
            .await?;
        tracing::info!(
            permissions = report.permissions_defined,
            roles = report.roles_defined,
            grants = report.grants_added,
            "registry seeded"
        );
        Ok(report)
    }
}
