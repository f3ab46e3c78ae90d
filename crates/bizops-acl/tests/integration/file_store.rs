//! The JSON file backend keeps the same guarantees across restarts.

use bizops_acl::{Acl, Decision, JsonFileStore, Principal};

use crate::common::{role_named, test_config};

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let config = test_config();

    let user_id = {
        let acl = Acl::from_config(JsonFileStore::open(&path).await.unwrap(), &config).unwrap();
        acl.registry().seed(&config).await.unwrap();
        let sales = role_named(&acl, "Sales").await;
        acl.identity()
            .create_user("alice@x.com", "Alice", Some("s3cret"), sales.id)
            .await
            .unwrap()
            .id
    };

    let acl = Acl::from_config(JsonFileStore::open(&path).await.unwrap(), &config).unwrap();
    let user = acl
        .identity()
        .verify_credential("alice@x.com", "s3cret")
        .await
        .unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(
        acl.authorize(&Principal::new(user_id), "orders", "create")
            .await
            .unwrap(),
        Decision::Allow
    );
    assert!(!acl.audit_log().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_password_hash_not_plaintext_on_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let config = test_config();
    let acl = Acl::from_config(JsonFileStore::open(&path).await.unwrap(), &config).unwrap();
    acl.registry().seed(&config).await.unwrap();
    let user_role = role_named(&acl, "User").await;
    acl.identity()
        .create_user("a@x.com", "A", Some("plaintext-secret"), user_role.id)
        .await
        .unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("plaintext-secret"));
    assert!(raw.contains("$argon2id$"));
}
