//! Property-based tests for grants and decisions.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use bizops_core::{PermissionId, PermissionName, PermissionPattern, RoleId};
    use proptest::prelude::*;

    use crate::audit::{AuditAction, Stamp};
    use crate::identity::NewUser;
    use crate::policy::expand_patterns;
    use crate::registry::RoleSettings;
    use crate::{AclState, Decision, DenyReason, Principal, decide};

    const RESOURCES: [&str; 2] = ["orders", "invoices"];
    const ACTIONS: [&str; 2] = ["view", "edit"];

    struct World {
        state: AclState,
        roles: Vec<RoleId>,
        perms: Vec<(PermissionId, PermissionName)>,
        principals: Vec<Principal>,
    }

    fn world() -> World {
        let settings = RoleSettings {
            default_role: "User".into(),
            superuser_role: None,
        };
        let stamp = Stamp::now(None);
        let mut state = AclState::default();

        let roles: Vec<RoleId> = ["Sales", "Operations", "Accounts"]
            .iter()
            .map(|name| state.insert_role(name, "", &settings, &stamp).unwrap().id)
            .collect();

        let mut perms = Vec::new();
        for resource in RESOURCES {
            for action in ACTIONS {
                let name = PermissionName::new(resource, action).unwrap();
                let p = state
                    .insert_permission(name.clone(), "", &settings, &stamp)
                    .unwrap();
                perms.push((p.id, name));
            }
        }

        let principals = roles
            .iter()
            .enumerate()
            .map(|(i, role_id)| {
                let new = NewUser::new(format!("user{i}@example.com"), "U", *role_id);
                Principal::new(state.insert_user(new, None, &stamp).unwrap().id)
            })
            .collect();

        World {
            state,
            roles,
            perms,
            principals,
        }
    }

    proptest! {
        #[test]
        fn test_allow_iff_granted(ops in prop::collection::vec((0..3usize, 0..4usize, any::<bool>()), 0..40)) {
            let mut w = world();
            let stamp = Stamp::now(None);
            let mut model: BTreeSet<(usize, usize)> = BTreeSet::new();

            for (r, p, grant) in ops {
                let (role_id, perm_id) = (w.roles[r], w.perms[p].0);
                if grant {
                    w.state.grant_permission(role_id, perm_id, &stamp).unwrap();
                    model.insert((r, p));
                } else {
                    w.state.revoke_permission(role_id, perm_id, &stamp).unwrap();
                    model.remove(&(r, p));
                }
            }

            for (r, principal) in w.principals.iter().enumerate() {
                for (p, (_, name)) in w.perms.iter().enumerate() {
                    let decision = decide(&w.state, principal, name).unwrap();
                    let expected = if model.contains(&(r, p)) {
                        Decision::Allow
                    } else {
                        Decision::Deny(DenyReason::PermissionNotGranted)
                    };
                    prop_assert_eq!(decision, expected);
                }
            }
        }

        #[test]
        fn test_repeated_grant_is_single_grant(times in 1..6usize, r in 0..3usize, p in 0..4usize) {
            let mut w = world();
            let stamp = Stamp::now(None);
            let (role_id, perm_id) = (w.roles[r], w.perms[p].0);
            let before = w.state.audit().len();

            let changed: Vec<bool> = (0..times)
                .map(|_| w.state.grant_permission(role_id, perm_id, &stamp).unwrap())
                .collect();

            prop_assert!(changed[0]);
            prop_assert!(changed[1..].iter().all(|c| !c));
            prop_assert_eq!(w.state.grants().count(), 1);
            let grants = w.state.audit()[before..]
                .iter()
                .filter(|a| a.action == AuditAction::Grant)
                .count();
            prop_assert_eq!(grants, 1);
        }

        #[test]
        fn test_inactive_never_allowed(grant_all in any::<bool>(), r in 0..3usize) {
            let mut w = world();
            let stamp = Stamp::now(None);
            if grant_all {
                for (perm_id, _) in w.perms.clone() {
                    w.state.grant_permission(w.roles[r], perm_id, &stamp).unwrap();
                }
            }
            let principal = w.principals[r];
            w.state.set_active(principal.user_id, false, &stamp).unwrap();
            for (_, name) in &w.perms {
                prop_assert_eq!(
                    decide(&w.state, &principal, name).unwrap(),
                    Decision::Deny(DenyReason::AccountInactive)
                );
            }
        }

        #[test]
        fn test_decisions_are_deterministic(r in 0..3usize, p in 0..4usize, grant in any::<bool>()) {
            let mut w = world();
            if grant {
                w.state
                    .grant_permission(w.roles[r], w.perms[p].0, &Stamp::now(None))
                    .unwrap();
            }
            let name = &w.perms[p].1;
            let first = decide(&w.state, &w.principals[r], name).unwrap();
            let second = decide(&w.state, &w.principals[r], name).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn test_expansion_matches_patterns(
            resource_wild in any::<bool>(),
            action_wild in any::<bool>(),
            r in 0..2usize,
            a in 0..2usize,
        ) {
            let catalog: Vec<PermissionName> = RESOURCES
                .iter()
                .flat_map(|res| ACTIONS.iter().map(move |act| PermissionName::new(res, act).unwrap()))
                .collect();
            let resource = if resource_wild { "*" } else { RESOURCES[r] };
            let action = if action_wild { "*" } else { ACTIONS[a] };
            let pattern: PermissionPattern = format!("{resource}.{action}").parse().unwrap();

            let expanded = expand_patterns(std::slice::from_ref(&pattern), &catalog);
            for name in &catalog {
                prop_assert_eq!(expanded.contains(name), pattern.matches(name));
            }
        }
    }
}
