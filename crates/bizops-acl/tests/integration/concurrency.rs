//! Readers running alongside writers only ever see whole mutations.

use std::collections::BTreeMap;

use bizops_acl::Principal;
use bizops_core::{PermissionName, RolePolicy};

use crate::common::TestHarness;

const ACTIONS: [&str; 4] = ["view", "create", "edit", "delete"];
const BATCHES: usize = 25;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_half_applied_policy() {
    let h = TestHarness::seeded().await;
    let sales = h.role("Sales").await;
    let user = h
        .acl
        .identity()
        .create_user("eve@x.com", "Eve", None, sales.id)
        .await
        .unwrap();
    let principal = Principal::new(user.id);

    let writer = {
        let acl = h.acl.clone();
        tokio::spawn(async move {
            for i in 0..BATCHES {
                let resource = format!("batch{i}");
                let catalog: Vec<PermissionName> = ACTIONS
                    .iter()
                    .map(|a| PermissionName::new(&resource, a).unwrap())
                    .collect();
                let pattern = format!("{resource}.*");
                let policy = RolePolicy::new("Sales", "", &[pattern.as_str()]);
                acl.registry().apply_policy(&policy, &catalog).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let acl = h.acl.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let perms = acl.authorizer().permissions_for(&principal).await.unwrap();
                    let mut per_batch: BTreeMap<String, usize> = BTreeMap::new();
                    for p in perms.iter().filter(|p| p.resource().starts_with("batch")) {
                        *per_batch.entry(p.resource().to_string()).or_default() += 1;
                    }
                    for (batch, count) in per_batch {
                        assert_eq!(count, ACTIONS.len(), "{batch} partially visible");
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    let perms = h.acl.authorizer().permissions_for(&principal).await.unwrap();
    let batch_perms = perms.iter().filter(|p| p.resource().starts_with("batch")).count();
    assert_eq!(batch_perms, BATCHES * ACTIONS.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_emails_admit_one() {
    let h = TestHarness::seeded().await;
    let role_id = h.role("User").await.id;

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let acl = h.acl.clone();
            let email = if i % 2 == 0 { "Same@x.com" } else { "same@X.com" };
            tokio::spawn(async move {
                acl.identity()
                    .create_user(email, "Same", Some("pw"), role_id)
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(h.acl.identity().list_users().await.unwrap().len(), 1);
}
