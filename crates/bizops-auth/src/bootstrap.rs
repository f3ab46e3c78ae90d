//! First-deployment administrator seeding.

use bizops_acl::{Acl, AclStore, Error, Role, User};
use bizops_core::BizopsConfig;

use crate::AuthError;

/// What [`bootstrap_admin`] did.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    /// The superuser role, if one is configured.
    pub role: Option<Role>,
    /// Whether the role had to be defined.
    pub role_created: bool,
    /// The administrator account, if one is configured.
    pub admin: Option<User>,
    /// Whether the account had to be created.
    pub admin_created: bool,
}

/// Make sure the superuser role and the configured administrator exist.
///
/// Safe to run on every start. An existing account with the bootstrap
/// email is left exactly as it is, password and role included.
pub async fn bootstrap_admin<S: AclStore>(
    acl: &Acl<S>,
    config: &BizopsConfig,
) -> Result<BootstrapOutcome, AuthError> {
    let admin_config = config.auth.bootstrap_admin.as_ref();
    let Some(role_name) = config.auth.superuser_role.as_deref() else {
        if admin_config.is_some() {
            return Err(AuthError::Config(
                "a bootstrap administrator needs auth.superuser_role".to_string(),
            ));
        }
        return Ok(BootstrapOutcome {
            role: None,
            role_created: false,
            admin: None,
            admin_created: false,
        });
    };

    let registry = acl.registry();
    let (role, role_created) = match registry.find_role_by_name(role_name).await? {
        Some(role) => (role, false),
        None => match registry
            .define_role(role_name, "Full access to every resource")
            .await
        {
            Ok(role) => (role, true),
            Err(Error::DuplicateRole { .. }) => (
                registry
                    .find_role_by_name(role_name)
                    .await?
                    .ok_or_else(|| Error::UnknownRole {
                        key: role_name.to_string(),
                    })?,
                false,
            ),
            Err(e) => return Err(e.into()),
        },
    };

    let Some(admin) = admin_config else {
        return Ok(BootstrapOutcome {
            role: Some(role),
            role_created,
            admin: None,
            admin_created: false,
        });
    };

    let identity = acl.identity();
    let (user, admin_created) = match identity.find_by_email(&admin.email).await? {
        Some(existing) => {
            tracing::info!(user_id = %existing.id, "bootstrap administrator already exists");
            (existing, false)
        }
        None => {
            let user = identity
                .create_user(&admin.email, &admin.name, Some(admin.password.as_str()), role.id)
                .await?;
            tracing::info!(
                user_id = %user.id,
                email = %user.email,
                "bootstrap administrator created"
            );
            (user, true)
        }
    };

    Ok(BootstrapOutcome {
        role: Some(role),
        role_created,
        admin: Some(user),
        admin_created,
    })
}
