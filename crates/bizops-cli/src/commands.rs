//! Handlers for the store-backed commands.
//!
//! Every handler writes to `out` so tests can capture what a user would
//! see. Entities are addressed by email or name on the command line and
//! resolved to ids here.

use std::io::Write;

use bizops_acl::{
    Acl, AclStore, AuditRecord, Decision, Error as AclError, NewUser, Permission, Principal,
    ProfileUpdate, Role, User,
};
use bizops_auth::{AuthError, AuthenticatedUser, PrincipalResolver, bootstrap_admin};
use bizops_core::BizopsConfig;
use serde::Serialize;

use crate::cli::{Command, PermissionAction, RoleAction, UserAction};
use crate::{Error, Result};

/// What a command needs to run.
pub struct Context<S> {
    /// Components over the opened store.
    pub acl: Acl<S>,
    /// Effective configuration.
    pub config: BizopsConfig,
    /// Emit JSON instead of text.
    pub json: bool,
}

/// Outcome that decides the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command did what was asked.
    Success,
    /// A check or login was refused.
    Refused,
}

// ============================================================================
// Output views
// ============================================================================

/// Account as shown to operators. Never includes the credential.
#[derive(Debug, Serialize)]
struct UserView {
    id: String,
    email: String,
    display_name: String,
    role: String,
    active: bool,
    password: bool,
    sso_linked: bool,
    created_at: String,
}

impl UserView {
    fn new(user: &User, role: &str) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: role.to_string(),
            active: user.active,
            password: user.has_password(),
            sso_linked: user.sso_subject.is_some(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(AclError::from)?;
    writeln!(out, "{text}")?;
    Ok(())
}

// ============================================================================
// Lookups
// ============================================================================

async fn user_by_email<S: AclStore>(acl: &Acl<S>, email: &str) -> Result<User> {
    acl.identity()
        .find_by_email(email)
        .await?
        .ok_or_else(|| {
            AclError::UnknownUser {
                key: email.to_string(),
            }
            .into()
        })
}

async fn role_by_name<S: AclStore>(acl: &Acl<S>, name: &str) -> Result<Role> {
    acl.registry()
        .find_role_by_name(name)
        .await?
        .ok_or_else(|| {
            AclError::UnknownRole {
                key: name.to_string(),
            }
            .into()
        })
}

async fn permission_by_name<S: AclStore>(acl: &Acl<S>, name: &str) -> Result<Permission> {
    acl.registry()
        .find_permission(name)
        .await?
        .ok_or_else(|| {
            AclError::UnknownPermission {
                key: name.to_string(),
            }
            .into()
        })
}

async fn role_name<S: AclStore>(acl: &Acl<S>, user: &User) -> Result<String> {
    Ok(acl.registry().get_role(user.role_id).await?.name)
}

/// Handles attributed to `actor`, when given.
pub async fn acting_as<S: AclStore>(acl: &Acl<S>, actor: Option<&str>) -> Result<Acl<S>> {
    match actor {
        Some(email) => Ok(acl.acting_as(user_by_email(acl, email).await?.id)),
        None => Ok(acl.clone()),
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Run a store-backed command.
///
/// `config` subcommands never reach this function.
pub async fn run<S: AclStore>(
    ctx: &Context<S>,
    command: Command,
    out: &mut dyn Write,
) -> Result<Outcome> {
    match command {
        Command::Init => cmd_init(ctx, out).await,
        Command::User { action } => cmd_user(ctx, action, out).await,
        Command::Role { action } => cmd_role(ctx, action, out).await,
        Command::Permission { action } => cmd_permission(ctx, action, out).await,
        Command::Check {
            email,
            resource,
            action,
        } => cmd_check(ctx, &email, &resource, &action, out).await,
        Command::Login { email, password } => cmd_login(ctx, &email, &password, out).await,
        Command::SsoLogin {
            email,
            subject,
            name,
        } => cmd_sso_login(ctx, &email, &subject, name, out).await,
        Command::Audit { limit } => cmd_audit(ctx, limit, out).await,
        Command::Config { .. } => Err(Error::usage("config commands do not use the state file")),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Seed catalog, role policies, special roles and the bootstrap admin.
pub async fn cmd_init<S: AclStore>(ctx: &Context<S>, out: &mut dyn Write) -> Result<Outcome> {
    let report = ctx.acl.registry().seed(&ctx.config).await?;
    let boot = bootstrap_admin(&ctx.acl, &ctx.config).await?;
    if ctx.json {
        print_json(out, &report)?;
    } else {
        writeln!(
            out,
            "Seeded {} permission(s), {} role(s), {} grant(s)",
            report.permissions_defined, report.roles_defined, report.grants_added
        )?;
        match (&boot.admin, boot.admin_created) {
            (Some(admin), true) => writeln!(out, "Created administrator {}", admin.email)?,
            (Some(admin), false) => writeln!(out, "Administrator {} already exists", admin.email)?,
            (None, _) => {}
        }
    }
    Ok(Outcome::Success)
}

/// `bizops user ...`
pub async fn cmd_user<S: AclStore>(
    ctx: &Context<S>,
    action: UserAction,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let acl = &ctx.acl;
    let ids = acl.identity();
    match action {
        UserAction::Create {
            email,
            name,
            role,
            password,
            sso_subject,
        } => {
            let role_name = role.unwrap_or_else(|| ctx.config.auth.default_role.clone());
            let role = role_by_name(acl, &role_name).await?;
            let mut new = NewUser::new(email, name, role.id);
            new.password = password;
            new.sso_subject = sso_subject;
            let user = ids.create(new).await?;
            show_user(ctx, &user, &role.name, out)?;
        }
        UserAction::List => {
            let users = ids.list_users().await?;
            let mut views = Vec::with_capacity(users.len());
            for user in &users {
                views.push(UserView::new(user, &role_name(acl, user).await?));
            }
            if ctx.json {
                print_json(out, &views)?;
            } else {
                for v in views {
                    writeln!(
                        out,
                        "{}\t{}\t{}\t{}",
                        v.email,
                        v.display_name,
                        v.role,
                        if v.active { "active" } else { "inactive" }
                    )?;
                }
            }
        }
        UserAction::Show { email } => {
            let user = user_by_email(acl, &email).await?;
            let role = role_name(acl, &user).await?;
            show_user(ctx, &user, &role, out)?;
        }
        UserAction::SetRole { email, role } => {
            let user = user_by_email(acl, &email).await?;
            let role = role_by_name(acl, &role).await?;
            ids.set_role(user.id, role.id).await?;
            writeln!(out, "{} now has role {}", user.email, role.name)?;
        }
        UserAction::Deactivate { email } => {
            let user = user_by_email(acl, &email).await?;
            ids.deactivate(user.id).await?;
            writeln!(out, "Deactivated {}", user.email)?;
        }
        UserAction::Activate { email } => {
            let user = user_by_email(acl, &email).await?;
            ids.activate(user.id).await?;
            writeln!(out, "Activated {}", user.email)?;
        }
        UserAction::SetPassword { email, password } => {
            let user = user_by_email(acl, &email).await?;
            ids.set_password(user.id, &password).await?;
            writeln!(out, "Password updated for {}", user.email)?;
        }
        UserAction::ChangePassword {
            email,
            current,
            password,
        } => {
            let user = user_by_email(acl, &email).await?;
            ids.change_password(user.id, current.as_deref(), &password)
                .await?;
            writeln!(out, "Password changed for {}", user.email)?;
        }
        UserAction::Update {
            email,
            name,
            new_email,
        } => {
            let user = user_by_email(acl, &email).await?;
            let updated = ids
                .update_profile(
                    user.id,
                    ProfileUpdate {
                        display_name: name,
                        email: new_email,
                    },
                )
                .await?;
            let role = role_name(acl, &updated).await?;
            show_user(ctx, &updated, &role, out)?;
        }
    }
    Ok(Outcome::Success)
}

fn show_user<S>(ctx: &Context<S>, user: &User, role: &str, out: &mut dyn Write) -> Result<()> {
    let view = UserView::new(user, role);
    if ctx.json {
        return print_json(out, &view);
    }
    writeln!(out, "id:           {}", view.id)?;
    writeln!(out, "email:        {}", view.email)?;
    writeln!(out, "name:         {}", view.display_name)?;
    writeln!(out, "role:         {}", view.role)?;
    writeln!(out, "active:       {}", view.active)?;
    writeln!(out, "password:     {}", if view.password { "set" } else { "none" })?;
    writeln!(out, "sso:          {}", if view.sso_linked { "linked" } else { "-" })?;
    Ok(())
}

/// `bizops role ...`
pub async fn cmd_role<S: AclStore>(
    ctx: &Context<S>,
    action: RoleAction,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let acl = &ctx.acl;
    let registry = acl.registry();
    match action {
        RoleAction::Create { name, description } => {
            let role = registry.define_role(&name, &description).await?;
            writeln!(out, "Created role {} ({})", role.name, role.id)?;
        }
        RoleAction::Delete { name } => {
            let role = role_by_name(acl, &name).await?;
            registry.delete_role(role.id).await?;
            writeln!(out, "Deleted role {}", role.name)?;
        }
        RoleAction::Rename { name, new_name } => {
            let role = role_by_name(acl, &name).await?;
            let renamed = registry.rename_role(role.id, &new_name).await?;
            writeln!(out, "Renamed role {} to {}", role.name, renamed.name)?;
        }
        RoleAction::Grant { role, permission } => {
            let role = role_by_name(acl, &role).await?;
            let permission = permission_by_name(acl, &permission).await?;
            registry.grant(role.id, permission.id).await?;
            writeln!(out, "Granted {} to {}", permission.name, role.name)?;
        }
        RoleAction::Revoke { role, permission } => {
            let role = role_by_name(acl, &role).await?;
            let permission = permission_by_name(acl, &permission).await?;
            registry.revoke(role.id, permission.id).await?;
            writeln!(out, "Revoked {} from {}", permission.name, role.name)?;
        }
        RoleAction::Permissions { role } => {
            let role = role_by_name(acl, &role).await?;
            let perms = registry.effective_permissions(role.id).await?;
            print_permissions(ctx, &perms, out)?;
        }
        RoleAction::List => {
            let roles = registry.list_roles().await?;
            if ctx.json {
                print_json(out, &roles)?;
            } else {
                for role in roles {
                    writeln!(out, "{}\t{}", role.name, role.description)?;
                }
            }
        }
    }
    Ok(Outcome::Success)
}

fn print_permissions<S>(ctx: &Context<S>, perms: &[Permission], out: &mut dyn Write) -> Result<()> {
    if ctx.json {
        return print_json(out, perms);
    }
    for p in perms {
        if p.description.is_empty() {
            writeln!(out, "{}", p.name)?;
        } else {
            writeln!(out, "{}\t{}", p.name, p.description)?;
        }
    }
    Ok(())
}

/// `bizops permission ...`
pub async fn cmd_permission<S: AclStore>(
    ctx: &Context<S>,
    action: PermissionAction,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let registry = ctx.acl.registry();
    match action {
        PermissionAction::Define { name, description } => {
            let permission = registry.define_permission(&name, &description).await?;
            writeln!(out, "Defined permission {}", permission.name)?;
        }
        PermissionAction::List => {
            let perms = registry.list_permissions().await?;
            print_permissions(ctx, &perms, out)?;
        }
        PermissionAction::Delete { name } => {
            let permission = permission_by_name(&ctx.acl, &name).await?;
            registry.delete_permission(permission.id).await?;
            writeln!(out, "Deleted permission {}", permission.name)?;
        }
    }
    Ok(Outcome::Success)
}

/// `bizops check`
pub async fn cmd_check<S: AclStore>(
    ctx: &Context<S>,
    email: &str,
    resource: &str,
    action: &str,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let user = user_by_email(&ctx.acl, email).await?;
    let decision = ctx
        .acl
        .authorize(&Principal::new(user.id), resource, action)
        .await?;
    if ctx.json {
        print_json(out, &decision)?;
    } else {
        match decision {
            Decision::Allow => writeln!(out, "allow")?,
            Decision::Deny(reason) => writeln!(out, "deny: {reason}")?,
        }
    }
    Ok(if decision.is_allowed() {
        Outcome::Success
    } else {
        Outcome::Refused
    })
}

/// `bizops login`
pub async fn cmd_login<S: AclStore>(
    ctx: &Context<S>,
    email: &str,
    password: &str,
    out: &mut dyn Write,
) -> Result<Outcome> {
    match ctx.acl.identity().verify_credential(email, password).await {
        Ok(user) => {
            writeln!(out, "authenticated {} ({})", user.email, user.id)?;
            Ok(Outcome::Success)
        }
        Err(e) if !e.is_internal() => {
            writeln!(out, "{}", AuthError::from(e).public_message())?;
            Ok(Outcome::Refused)
        }
        Err(e) => Err(e.into()),
    }
}

/// `bizops sso-login`
pub async fn cmd_sso_login<S: AclStore>(
    ctx: &Context<S>,
    email: &str,
    subject: &str,
    name: Option<String>,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let mut identity = AuthenticatedUser::new(email, subject);
    identity.name = name;
    let resolver = PrincipalResolver::new(ctx.acl.clone());
    let user = resolver.provision_sso(&identity).await?;
    let role = role_name(&ctx.acl, &user).await?;
    show_user(ctx, &user, &role, out)?;
    Ok(Outcome::Success)
}

/// `bizops audit`
pub async fn cmd_audit<S: AclStore>(
    ctx: &Context<S>,
    limit: Option<usize>,
    out: &mut dyn Write,
) -> Result<Outcome> {
    let log = ctx.acl.audit_log().await?;
    let start = limit.map_or(0, |n| log.len().saturating_sub(n));
    let entries: &[AuditRecord] = &log[start..];
    if ctx.json {
        print_json(out, entries)?;
        return Ok(Outcome::Success);
    }
    for r in entries {
        let actor = r.actor.map_or_else(|| "-".to_string(), |a| a.to_string());
        writeln!(
            out,
            "{}\t{}\t{:?}\t{:?}\t{}\t{}",
            r.at.to_rfc3339(),
            actor,
            r.entity,
            r.action,
            r.entity_id,
            r.details
        )?;
    }
    Ok(Outcome::Success)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bizops_acl::MemoryStore;
    use bizops_core::BootstrapAdmin;
    use bizops_core::config::PasswordSettings;

    async fn context() -> Context<MemoryStore> {
        let mut config = BizopsConfig::default();
        config.password = PasswordSettings {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        };
        config.auth.bootstrap_admin = Some(BootstrapAdmin {
            email: "root@x.com".into(),
            password: "rootpw".into(),
            name: "Root".into(),
        });
        let acl = Acl::from_config(MemoryStore::new(), &config).unwrap();
        let ctx = Context {
            acl,
            config,
            json: false,
        };
        cmd_init(&ctx, &mut Vec::new()).await.unwrap();
        ctx
    }

    async fn run_text(ctx: &Context<MemoryStore>, command: Command) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = run(ctx, command, &mut out).await.unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    fn create_user(email: &str, role: &str, password: Option<&str>) -> Command {
        Command::User {
            action: UserAction::Create {
                email: email.into(),
                name: "Test".into(),
                role: Some(role.into()),
                password: password.map(str::to_string),
                sso_subject: None,
            },
        }
    }

    fn check(email: &str, resource: &str, action: &str) -> Command {
        Command::Check {
            email: email.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }

    #[tokio::test]
    async fn test_init_is_repeatable() {
        let ctx = context().await;
        let mut out = Vec::new();
        cmd_init(&ctx, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Seeded 0 permission(s), 0 role(s), 0 grant(s)"));
        assert!(text.contains("already exists"));
    }

    #[tokio::test]
    async fn test_check_allow_and_deny() {
        let ctx = context().await;
        run_text(&ctx, create_user("alice@x.com", "Sales", Some("pw"))).await;

        let (outcome, text) = run_text(&ctx, check("alice@x.com", "orders", "create")).await;
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(text.trim(), "allow");

        let (outcome, text) = run_text(&ctx, check("alice@x.com", "invoices", "delete")).await;
        assert_eq!(outcome, Outcome::Refused);
        assert_eq!(text.trim(), "deny: permission not granted");
    }

    #[tokio::test]
    async fn test_login_messages_are_uniform() {
        let ctx = context().await;
        run_text(&ctx, create_user("alice@x.com", "Sales", Some("pw"))).await;
        run_text(&ctx, create_user("bob@x.com", "Sales", None)).await;

        let login = |email: &str, password: &str| Command::Login {
            email: email.into(),
            password: password.into(),
        };
        let (_, wrong) = run_text(&ctx, login("alice@x.com", "nope")).await;
        let (_, no_pw) = run_text(&ctx, login("bob@x.com", "anything")).await;
        let (_, unknown) = run_text(&ctx, login("carol@x.com", "x")).await;
        assert_eq!(wrong, no_pw);
        assert_eq!(wrong, unknown);

        let (outcome, ok) = run_text(&ctx, login("alice@x.com", "pw")).await;
        assert_eq!(outcome, Outcome::Success);
        assert!(ok.starts_with("authenticated alice@x.com"));
    }

    #[tokio::test]
    async fn test_grant_then_check() {
        let ctx = context().await;
        run_text(&ctx, create_user("op@x.com", "Operations", None)).await;
        let (outcome, _) = run_text(&ctx, check("op@x.com", "invoices", "edit")).await;
        assert_eq!(outcome, Outcome::Refused);

        run_text(
            &ctx,
            Command::Role {
                action: RoleAction::Grant {
                    role: "operations".into(),
                    permission: "invoices.edit".into(),
                },
            },
        )
        .await;
        let (outcome, _) = run_text(&ctx, check("op@x.com", "invoices", "edit")).await;
        assert_eq!(outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn test_delete_role_in_use_reports_error() {
        let ctx = context().await;
        run_text(&ctx, create_user("a@x.com", "Accounts", None)).await;
        let mut out = Vec::new();
        let err = run(
            &ctx,
            Command::Role {
                action: RoleAction::Delete {
                    name: "Accounts".into(),
                },
            },
            &mut out,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Acl(AclError::RoleInUse { .. })));
    }

    #[tokio::test]
    async fn test_user_list_json_has_no_credentials() {
        let mut ctx = context().await;
        ctx.json = true;
        let (_, text) = run_text(
            &ctx,
            Command::User {
                action: UserAction::List,
            },
        )
        .await;
        let users: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(users[0]["email"], "root@x.com");
        assert_eq!(users[0]["role"], "Admin");
        assert!(!text.contains("argon2"));
    }

    #[tokio::test]
    async fn test_sso_login_provisions_default_role() {
        let ctx = context().await;
        let (_, text) = run_text(
            &ctx,
            Command::SsoLogin {
                email: "new@x.com".into(),
                subject: "google-1".into(),
                name: None,
            },
        )
        .await;
        assert!(text.contains("role:         User"));
        assert!(text.contains("password:     none"));
    }

    #[tokio::test]
    async fn test_actor_attribution() {
        let ctx = context().await;
        let admin = acting_as(&ctx.acl, Some("root@x.com")).await.unwrap();
        let ctx = Context {
            acl: admin,
            config: ctx.config.clone(),
            json: false,
        };
        run_text(
            &ctx,
            Command::Role {
                action: RoleAction::Create {
                    name: "Support".into(),
                    description: String::new(),
                },
            },
        )
        .await;
        let log = ctx.acl.audit_log().await.unwrap();
        assert!(log.last().unwrap().actor.is_some());
    }

    #[tokio::test]
    async fn test_change_password_refused_for_sso_account() {
        let ctx = context().await;
        run_text(
            &ctx,
            Command::SsoLogin {
                email: "sso@x.com".into(),
                subject: "google-7".into(),
                name: None,
            },
        )
        .await;
        let err = run(
            &ctx,
            Command::User {
                action: UserAction::ChangePassword {
                    email: "sso@x.com".into(),
                    current: None,
                    password: "pw".into(),
                },
            },
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Acl(AclError::PasswordManagedBySso)));
    }

    #[tokio::test]
    async fn test_audit_limit() {
        let ctx = context().await;
        let (_, text) = run_text(&ctx, Command::Audit { limit: Some(2) }).await;
        assert_eq!(text.lines().count(), 2);
    }
}
