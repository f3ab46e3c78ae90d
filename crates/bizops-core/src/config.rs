//! Process configuration.
//!
//! [`BizopsConfig`] is read once at start-up from a TOML file (optional),
//! then overlaid with `BIZOPS_*` environment variables. Nothing mutates it
//! afterwards.
//!
//! ```toml
//! [auth]
//! default_role = "User"
//! superuser_role = "Admin"
//!
//! [auth.bootstrap_admin]
//! email = "admin@example.com"
//! password = "change-me"
//! name = "Administrator"
//!
//! [[roles]]
//! name = "Sales"
//! description = "Order desk"
//! permissions = ["*.view", "orders.*"]
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::permission::{PermissionName, PermissionPattern};
use crate::util::ids::{name_key, normalize_email};
use crate::{Error, Result};

/// Name used for the config directory and environment prefix.
pub const PROJECT_NAME: &str = "bizops";

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG_PATH: &str = "BIZOPS_CONFIG";
/// Overrides [`AuthSettings::default_role`].
pub const ENV_DEFAULT_ROLE: &str = "BIZOPS_DEFAULT_ROLE";
/// Overrides [`AuthSettings::superuser_role`]. An empty value disables it.
pub const ENV_SUPERUSER_ROLE: &str = "BIZOPS_SUPERUSER_ROLE";
/// Overrides [`StoreSettings::path`].
pub const ENV_STATE_PATH: &str = "BIZOPS_STATE_PATH";
/// Bootstrap administrator email.
pub const ENV_BOOTSTRAP_EMAIL: &str = "BIZOPS_BOOTSTRAP_ADMIN_EMAIL";
/// Bootstrap administrator password.
pub const ENV_BOOTSTRAP_PASSWORD: &str = "BIZOPS_BOOTSTRAP_ADMIN_PASSWORD";
/// Bootstrap administrator display name.
pub const ENV_BOOTSTRAP_NAME: &str = "BIZOPS_BOOTSTRAP_ADMIN_NAME";

// ============================================================================
// BizopsConfig
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BizopsConfig {
    /// Role defaults and the bootstrap administrator.
    pub auth: AuthSettings,
    /// Credential hashing cost.
    pub password: PasswordSettings,
    /// Where the CLI keeps its state.
    pub store: StoreSettings,
    /// Permissions created by `init`.
    pub catalog: CatalogSettings,
    /// Roles created by `init` and the permissions they receive.
    pub roles: Vec<RolePolicy>,
}

impl Default for BizopsConfig {
    fn default() -> Self {
        Self {
            auth: AuthSettings::default(),
            password: PasswordSettings::default(),
            store: StoreSettings::default(),
            catalog: CatalogSettings::default(),
            roles: default_roles(),
        }
    }
}

impl BizopsConfig {
    /// Load configuration.
    ///
    /// Resolution order for the file: `config_path`, then `$BIZOPS_CONFIG`,
    /// then the platform default path if it exists. Without a file the
    /// built-in defaults are used. Environment overrides are applied last
    /// and the result is validated.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an injectable environment lookup.
    pub fn load_with<F>(config_path: Option<&str>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = config_path
            .map(PathBuf::from)
            .or_else(|| env(ENV_CONFIG_PATH).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    tracing::debug!("no config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// `<config dir>/bizops/config.toml`, when the platform has a config dir.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(PROJECT_NAME).join("config.toml"))
    }

    /// Resolve the path a config command should act on.
    pub fn resolve_config_path(config_path: Option<&str>) -> Option<PathBuf> {
        match config_path {
            Some(p) => Some(PathBuf::from(p)),
            None => std::env::var(ENV_CONFIG_PATH)
                .ok()
                .map(PathBuf::from)
                .or_else(Self::default_config_path),
        }
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Overlay `BIZOPS_*` environment values.
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(role) = env(ENV_DEFAULT_ROLE) {
            self.auth.default_role = role;
        }
        if let Some(role) = env(ENV_SUPERUSER_ROLE) {
            self.auth.superuser_role = if role.trim().is_empty() {
                None
            } else {
                Some(role)
            };
        }
        if let Some(path) = env(ENV_STATE_PATH) {
            self.store.path = PathBuf::from(path);
        }

        let email = env(ENV_BOOTSTRAP_EMAIL);
        let password = env(ENV_BOOTSTRAP_PASSWORD);
        let name = env(ENV_BOOTSTRAP_NAME);
        if let Some(admin) = self.auth.bootstrap_admin.as_mut() {
            if let Some(email) = email {
                admin.email = email;
            }
            if let Some(password) = password {
                admin.password = password;
            }
            if let Some(name) = name {
                admin.name = name;
            }
        } else if let (Some(email), Some(password)) = (email, password) {
            self.auth.bootstrap_admin = Some(BootstrapAdmin {
                email,
                password,
                name: name.unwrap_or_else(default_admin_name),
            });
        }
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.auth.default_role.trim().is_empty() {
            return Err(Error::config("auth.default_role must not be empty"));
        }
        if let Some(superuser) = &self.auth.superuser_role {
            if superuser.trim().is_empty() {
                return Err(Error::config("auth.superuser_role must not be empty when set"));
            }
        }
        if let Some(admin) = &self.auth.bootstrap_admin {
            normalize_email(&admin.email)
                .map_err(|e| Error::config(format!("auth.bootstrap_admin.email: {e}")))?;
            if admin.password.is_empty() {
                return Err(Error::config("auth.bootstrap_admin.password must not be empty"));
            }
        }
        if self.password.memory_kib == 0
            || self.password.iterations == 0
            || self.password.parallelism == 0
        {
            return Err(Error::config("password hashing parameters must be non-zero"));
        }

        self.catalog.permissions()?;

        let mut seen = HashSet::new();
        for role in &self.roles {
            if role.name.trim().is_empty() {
                return Err(Error::config("role names must not be empty"));
            }
            if !seen.insert(name_key(&role.name)) {
                return Err(Error::config(format!("role '{}' is listed twice", role.name)));
            }
            role.patterns()
                .map_err(|e| Error::config(format!("role '{}': {e}", role.name)))?;
        }
        Ok(())
    }

    /// Policy for a role, looked up case-insensitively.
    pub fn role_policy(&self, name: &str) -> Option<&RolePolicy> {
        let key = name_key(name);
        self.roles.iter().find(|r| name_key(&r.name) == key)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Role defaults and bootstrap identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Role given to accounts provisioned through SSO on first login.
    pub default_role: String,
    /// Role that is granted every defined permission.
    pub superuser_role: Option<String>,
    /// Administrator seeded on first deployment.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            default_role: "User".to_string(),
            superuser_role: Some("Admin".to_string()),
            bootstrap_admin: None,
        }
    }
}

/// Initial administrator account.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    /// Login email.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// Display name.
    #[serde(default = "default_admin_name")]
    pub name: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSettings {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// State file location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// JSON state file used by the CLI.
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("bizops-state.json"),
        }
    }
}

/// Resources and actions whose cross product forms the seeded permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Business resources, e.g. `orders`.
    pub resources: Vec<String>,
    /// Actions available on every resource, e.g. `view`.
    pub actions: Vec<String>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        let resources = [
            "users",
            "products",
            "inventory",
            "orders",
            "invoices",
            "contacts",
            "organizations",
            "payments",
        ];
        let actions = ["view", "create", "edit", "delete"];
        Self {
            resources: resources.iter().map(|s| s.to_string()).collect(),
            actions: actions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CatalogSettings {
    /// Every `<resource>.<action>` pair, resources outermost.
    pub fn permissions(&self) -> Result<Vec<PermissionName>> {
        let mut out = Vec::with_capacity(self.resources.len() * self.actions.len());
        for resource in &self.resources {
            for action in &self.actions {
                out.push(
                    PermissionName::new(resource, action)
                        .map_err(|e| Error::config(format!("catalog: {e}")))?,
                );
            }
        }
        Ok(out)
    }
}

/// A role and the permission patterns it is seeded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePolicy {
    /// Role name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Exact permission names or patterns (`*.view`, `orders.*`, `*.*`).
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl RolePolicy {
    /// Build a policy from string slices.
    pub fn new(name: &str, description: &str, permissions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parse the permission entries.
    pub fn patterns(&self) -> Result<Vec<PermissionPattern>> {
        self.permissions.iter().map(|p| p.parse()).collect()
    }
}

fn default_roles() -> Vec<RolePolicy> {
    vec![
        RolePolicy::new("Admin", "Full access to every resource", &["*.*"]),
        RolePolicy::new(
            "Sales",
            "Views everything, manages orders and contacts",
            &["*.view", "orders.*", "contacts.*", "organizations.*"],
        ),
        RolePolicy::new(
            "Operations",
            "Manages inventory and delivery",
            &["*.view", "inventory.*", "products.view", "orders.view", "orders.edit"],
        ),
        RolePolicy::new(
            "Accounts",
            "Manages invoices and payments",
            &["*.view", "invoices.*", "payments.*"],
        ),
        RolePolicy::new("User", "Default role for new accounts", &[]),
    ]
}

// ============================================================================
// Tests
// ============================================================================
