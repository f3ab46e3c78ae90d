//! End-to-end role, user and decision scenarios.

use bizops_acl::{AuditAction, Decision, DenyReason, EntityKind, Error, NewUser, Principal};

use crate::common::TestHarness;

#[tokio::test]
async fn test_sales_user_can_create_but_not_delete_orders() {
    let h = TestHarness::new();
    let registry = h.acl.registry();
    let sales = registry.define_role("Sales", "Order desk").await.unwrap();
    let create = registry
        .define_permission("orders.create", "Create orders")
        .await
        .unwrap();
    registry.define_permission("orders.delete", "").await.unwrap();
    registry.grant(sales.id, create.id).await.unwrap();

    let alice = h
        .acl
        .identity()
        .create_user("alice@x.com", "Alice", Some("pw"), sales.id)
        .await
        .unwrap();
    let alice = Principal::new(alice.id);

    assert_eq!(
        h.acl.authorize(&alice, "orders", "create").await.unwrap(),
        Decision::Allow
    );
    assert_eq!(
        h.acl.authorize(&alice, "orders", "delete").await.unwrap(),
        Decision::Deny(DenyReason::PermissionNotGranted)
    );
}

#[tokio::test]
async fn test_password_less_account_fails_generic_authentication() {
    let h = TestHarness::seeded().await;
    let user_role = h.role("User").await;
    h.acl
        .identity()
        .create(NewUser::new("bob@x.com", "Bob", user_role.id).with_sso_subject("google-42"))
        .await
        .unwrap();

    let err = h
        .acl
        .identity()
        .verify_credential("bob@x.com", "anything")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoPasswordCredential));
    assert!(err.is_authentication_failure());
}

#[tokio::test]
async fn test_double_grant_single_revoke() {
    let h = TestHarness::new();
    let registry = h.acl.registry();
    let role = registry.define_role("Sales", "").await.unwrap();
    let perm = registry.define_permission("orders.create", "").await.unwrap();

    registry.grant(role.id, perm.id).await.unwrap();
    registry.grant(role.id, perm.id).await.unwrap();
    let perms = registry.effective_permissions(role.id).await.unwrap();
    assert_eq!(perms.len(), 1);
    assert_eq!(perms[0].id, perm.id);

    registry.revoke(role.id, perm.id).await.unwrap();
    assert!(registry.effective_permissions(role.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deactivation_flips_every_decision() {
    let h = TestHarness::seeded().await;
    let admin_role = h.role("Admin").await;
    let admin = h
        .acl
        .identity()
        .create_user("root@x.com", "Root", Some("pw"), admin_role.id)
        .await
        .unwrap();
    let principal = Principal::new(admin.id);
    assert!(h.acl.authorize(&principal, "payments", "delete").await.unwrap().is_allowed());

    h.acl.identity().deactivate(admin.id).await.unwrap();
    for permission in h.acl.registry().list_permissions().await.unwrap() {
        let decision = h
            .acl
            .authorizer()
            .authorize_permission(&principal, &permission.name)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Deny(DenyReason::AccountInactive));
    }
    let err = h
        .acl
        .identity()
        .verify_credential("root@x.com", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AccountInactive));
}

#[tokio::test]
async fn test_role_change_applies_to_next_check() {
    let h = TestHarness::seeded().await;
    let (sales, accounts) = (h.role("Sales").await, h.role("Accounts").await);
    let user = h
        .acl
        .identity()
        .create_user("carol@x.com", "Carol", None, sales.id)
        .await
        .unwrap();
    let principal = Principal::new(user.id);

    assert!(h.acl.authorize(&principal, "orders", "create").await.unwrap().is_allowed());
    assert!(!h.acl.authorize(&principal, "invoices", "edit").await.unwrap().is_allowed());

    h.acl.identity().set_role(user.id, accounts.id).await.unwrap();

    assert!(!h.acl.authorize(&principal, "orders", "create").await.unwrap().is_allowed());
    assert!(h.acl.authorize(&principal, "invoices", "edit").await.unwrap().is_allowed());
}

#[tokio::test]
async fn test_delete_role_blocked_until_unreferenced() {
    let h = TestHarness::seeded().await;
    let ops = h.role("Operations").await;
    let sales = h.role("Sales").await;
    let user = h
        .acl
        .identity()
        .create_user("dan@x.com", "Dan", None, ops.id)
        .await
        .unwrap();

    let err = h.acl.registry().delete_role(ops.id).await.unwrap_err();
    assert!(matches!(err, Error::RoleInUse { users: 1, .. }));

    h.acl.identity().set_role(user.id, sales.id).await.unwrap();
    h.acl.registry().delete_role(ops.id).await.unwrap();
    assert!(h.acl.registry().find_role_by_name("Operations").await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_permission_reaches_admin_only() {
    let h = TestHarness::seeded().await;
    let admin = h.role("Admin").await;
    let sales = h.role("Sales").await;
    let (a, s) = (
        h.acl
            .identity()
            .create_user("a@x.com", "A", None, admin.id)
            .await
            .unwrap(),
        h.acl
            .identity()
            .create_user("s@x.com", "S", None, sales.id)
            .await
            .unwrap(),
    );
    h.acl
        .registry()
        .define_permission("reports.export", "Export reports")
        .await
        .unwrap();

    let (a, s) = (Principal::new(a.id), Principal::new(s.id));
    assert!(h.acl.authorize(&a, "reports", "export").await.unwrap().is_allowed());
    assert!(!h.acl.authorize(&s, "reports", "export").await.unwrap().is_allowed());
}

#[tokio::test]
async fn test_audit_trail_records_actor() {
    let h = TestHarness::seeded().await;
    let admin_role = h.role("Admin").await;
    let admin = h
        .acl
        .identity()
        .create_user("root@x.com", "Root", Some("pw"), admin_role.id)
        .await
        .unwrap();

    let as_admin = h.acl.acting_as(admin.id);
    let role = as_admin.registry().define_role("Support", "").await.unwrap();

    let log = h.acl.audit_log().await.unwrap();
    let last = log.last().unwrap();
    assert_eq!(last.entity, EntityKind::Role);
    assert_eq!(last.action, AuditAction::Create);
    assert_eq!(last.entity_id, role.id.to_string());
    assert_eq!(last.actor, Some(admin.id));

    let serialized = serde_json::to_string(&log).unwrap();
    assert!(!serialized.contains("$argon2"));
}

#[tokio::test]
async fn test_failed_mutation_leaves_no_audit() {
    let h = TestHarness::seeded().await;
    let before = h.acl.audit_log().await.unwrap().len();
    let err = h.acl.registry().define_role("sales", "").await.unwrap_err();
    assert!(matches!(err, Error::DuplicateRole { .. }));
    assert_eq!(h.acl.audit_log().await.unwrap().len(), before);
}
