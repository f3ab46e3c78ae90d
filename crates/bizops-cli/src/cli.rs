//! Command-line definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Bizops - users, roles and permission checks
#[derive(Parser, Debug)]
#[command(name = "bizops", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "BIZOPS_CONFIG")]
    pub config: Option<String>,

    /// State file (overrides `[store] path`)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Attribute changes to this user in the audit trail
    #[arg(long = "as", value_name = "EMAIL", global = true)]
    pub actor: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Seed the permission catalog, role policies and bootstrap administrator
    Init,
    /// User account operations
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Role operations
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },
    /// Permission operations
    Permission {
        #[command(subcommand)]
        action: PermissionAction,
    },
    /// Decide whether a user may perform an action on a resource
    Check {
        /// User email
        email: String,
        /// Resource, e.g. `orders`
        resource: String,
        /// Action, e.g. `create`
        action: String,
    },
    /// Verify an email/password pair
    Login {
        /// User email
        email: String,
        /// Password
        #[arg(long, env = "BIZOPS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Simulate an SSO login, provisioning the account on first use
    SsoLogin {
        /// Email reported by the identity provider
        email: String,
        /// Subject (`sub` claim) reported by the identity provider
        subject: String,
        /// Display name reported by the identity provider
        #[arg(long)]
        name: Option<String>,
    },
    /// Show the audit trail
    Audit {
        /// Only the most recent N entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Configuration file operations
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `bizops user ...`
#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Create an account
    Create {
        /// Login email
        #[arg(long)]
        email: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Role name (defaults to `auth.default_role`)
        #[arg(long)]
        role: Option<String>,
        /// Password; omit for an SSO-only account
        #[arg(long, env = "BIZOPS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// SSO subject to link
        #[arg(long)]
        sso_subject: Option<String>,
    },
    /// List accounts
    List,
    /// Show one account
    Show {
        /// User email
        email: String,
    },
    /// Move a user to another role
    SetRole {
        /// User email
        email: String,
        /// Role name
        role: String,
    },
    /// Deactivate an account
    Deactivate {
        /// User email
        email: String,
    },
    /// Reactivate an account
    Activate {
        /// User email
        email: String,
    },
    /// Replace an account's password
    SetPassword {
        /// User email
        email: String,
        /// New password
        #[arg(long, env = "BIZOPS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Change one's own password (refused for SSO-linked accounts)
    ChangePassword {
        /// User email
        email: String,
        /// Current password; required when one is set
        #[arg(long, env = "BIZOPS_CURRENT_PASSWORD", hide_env_values = true)]
        current: Option<String>,
        /// New password
        #[arg(long, env = "BIZOPS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Change display name or email
    Update {
        /// Current email
        email: String,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New email
        #[arg(long)]
        new_email: Option<String>,
    },
}

/// `bizops role ...`
#[derive(Subcommand, Debug)]
pub enum RoleAction {
    /// Define a role
    Create {
        /// Role name
        name: String,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Delete a role no user references
    Delete {
        /// Role name
        name: String,
    },
    /// Rename a role no user references
    Rename {
        /// Current name
        name: String,
        /// New name
        new_name: String,
    },
    /// Grant a permission
    Grant {
        /// Role name
        role: String,
        /// Permission name, e.g. `orders.create`
        permission: String,
    },
    /// Revoke a permission
    Revoke {
        /// Role name
        role: String,
        /// Permission name
        permission: String,
    },
    /// List a role's effective permissions
    Permissions {
        /// Role name
        role: String,
    },
    /// List roles
    List,
}

/// `bizops permission ...`
#[derive(Subcommand, Debug)]
pub enum PermissionAction {
    /// Define a permission
    Define {
        /// `<resource>.<action>`
        name: String,
        /// Description
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List permissions
    List,
    /// Delete a permission and its grants
    Delete {
        /// `<resource>.<action>`
        name: String,
    },
}

/// `bizops config ...`
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path
    Path,
    /// Print one value by dotted key, e.g. `auth.default_role`
    Get {
        /// Dotted key
        key: String,
    },
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Target file (defaults to the platform config directory)
        #[arg(long)]
        file: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
