//! Common test utilities for bizops-acl integration tests.

use bizops_acl::{Acl, AclStore, MemoryStore, Role};
use bizops_core::BizopsConfig;
use bizops_core::config::PasswordSettings;

/// Configuration with cheap hashing so tests stay fast.
pub fn test_config() -> BizopsConfig {
    let mut config = BizopsConfig::default();
    config.password = PasswordSettings {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    };
    config
}

/// Test harness over an in-memory store.
pub struct TestHarness {
    /// The components under test.
    pub acl: Acl<MemoryStore>,
    /// The configuration they were built from.
    pub config: BizopsConfig,
}

impl TestHarness {
    /// An empty store with default role settings.
    pub fn new() -> Self {
        let config = test_config();
        let acl = Acl::from_config(MemoryStore::new(), &config).expect("valid test config");
        Self { acl, config }
    }

    /// A store seeded with the default catalog and role policies.
    pub async fn seeded() -> Self {
        let harness = Self::new();
        harness
            .acl
            .registry()
            .seed(&harness.config)
            .await
            .expect("seeding succeeds");
        harness
    }

    /// Look up a role that must exist.
    pub async fn role(&self, name: &str) -> Role {
        role_named(&self.acl, name).await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up a role that must exist, on any backend.
pub async fn role_named<S: AclStore>(acl: &Acl<S>, name: &str) -> Role {
    acl.registry()
        .find_role_by_name(name)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("role {name} should exist"))
}
