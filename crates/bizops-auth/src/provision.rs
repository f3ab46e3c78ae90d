//! Mapping token identities to principals, with SSO first-login
//! provisioning.

use bizops_acl::{Acl, AclStore, Error, NewUser, Principal, Role, User};
use tracing::instrument;

use crate::{AuthError, AuthenticatedUser, user::require_user};

/// Resolves externally authenticated identities to principals.
pub struct PrincipalResolver<S> {
    acl: Acl<S>,
}

impl<S> Clone for PrincipalResolver<S> {
    fn clone(&self) -> Self {
        Self {
            acl: self.acl.clone(),
        }
    }
}

impl<S: AclStore> PrincipalResolver<S> {
    /// Resolver over the given components.
    pub fn new(acl: Acl<S>) -> Self {
        Self { acl }
    }

    /// Find the account behind a token identity.
    ///
    /// Looks up the SSO subject first, then the email. Fails with
    /// `NotProvisioned` when neither matches and with `AccountInactive`
    /// for deactivated accounts.
    #[instrument(level = "debug", skip(self, identity), fields(email = %identity.email))]
    pub async fn resolve(&self, identity: &AuthenticatedUser) -> Result<Principal, AuthError> {
        if identity.email.trim().is_empty() {
            return Err(AuthError::MissingEmail);
        }
        let user = self
            .lookup(identity)
            .await?
            .ok_or_else(|| AuthError::NotProvisioned {
                email: identity.email.clone(),
            })?;
        if !user.active {
            tracing::warn!(user_id = %user.id, "inactive account presented a valid token");
            return Err(Error::AccountInactive.into());
        }
        Ok(Principal::new(user.id))
    }

    /// [`resolve`](Self::resolve) for the identity stored in request parts.
    pub async fn resolve_parts(
        &self,
        parts: &http::request::Parts,
    ) -> Result<Principal, AuthError> {
        self.resolve(require_user(parts)?).await
    }

    /// Resolve, provisioning an account on first SSO login.
    pub async fn resolve_or_provision(
        &self,
        identity: &AuthenticatedUser,
    ) -> Result<Principal, AuthError> {
        Ok(Principal::new(self.provision_sso(identity).await?.id))
    }

    async fn lookup(&self, identity: &AuthenticatedUser) -> Result<Option<User>, AuthError> {
        let ids = self.acl.identity();
        if !identity.subject.is_empty() {
            if let Some(user) = ids.find_by_sso_subject(&identity.subject).await? {
                return Ok(Some(user));
            }
        }
        Ok(ids.find_by_email(&identity.email).await?)
    }

    /// Find or create the account for an SSO login.
    ///
    /// An account found by email gets the subject linked if it has none;
    /// one found by subject gets its email updated if the provider reports
    /// a new one. A new account has no password and the default role, which
    /// is defined on demand. Inactive accounts are not reactivated.
    #[instrument(level = "debug", skip(self, identity), fields(email = %identity.email))]
    pub async fn provision_sso(&self, identity: &AuthenticatedUser) -> Result<User, AuthError> {
        if identity.email.trim().is_empty() {
            return Err(AuthError::MissingEmail);
        }
        let ids = self.acl.identity();
        let existing = match ids.find_by_email(&identity.email).await? {
            Some(user) => Some(user),
            None if !identity.subject.is_empty() => {
                ids.find_by_sso_subject(&identity.subject).await?
            }
            None => None,
        };

        let Some(user) = existing else {
            let role = self.default_role().await?;
            let mut new = NewUser::new(&identity.email, identity.display_name(), role.id);
            if !identity.subject.is_empty() {
                new = new.with_sso_subject(&identity.subject);
            }
            let user = ids.create(new).await?;
            tracing::info!(user_id = %user.id, role = %role.name, "account provisioned via SSO");
            return Ok(user);
        };

        if !user.active {
            tracing::warn!(user_id = %user.id, "SSO login for inactive account refused");
            return Err(Error::AccountInactive.into());
        }
        match user.sso_subject.as_deref() {
            None if !identity.subject.is_empty() => {
                ids.link_sso(user.id, &identity.subject).await?;
            }
            Some(linked) if linked == identity.subject => {
                let email = bizops_core::normalize_email(&identity.email)?;
                if email != user.email {
                    tracing::info!(user_id = %user.id, "SSO email changed, updating account");
                    ids.update_profile(
                        user.id,
                        bizops_acl::ProfileUpdate {
                            email: Some(email),
                            display_name: None,
                        },
                    )
                    .await?;
                }
            }
            Some(_) => {
                tracing::warn!(user_id = %user.id, "account already linked to another SSO subject");
            }
            None => {}
        }
        Ok(ids.get_user(user.id).await?)
    }

    async fn default_role(&self) -> Result<Role, AuthError> {
        let registry = self.acl.registry();
        let name = registry.settings().default_role.clone();
        if let Some(role) = registry.find_role_by_name(&name).await? {
            return Ok(role);
        }
        match registry
            .define_role(&name, "Default role for new accounts")
            .await
        {
            Ok(role) => Ok(role),
            Err(Error::DuplicateRole { .. }) => registry
                .find_role_by_name(&name)
                .await?
                .ok_or_else(|| Error::UnknownRole { key: name }.into()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::test_acl;
    use bizops_acl::MemoryStore;

    fn resolver() -> PrincipalResolver<MemoryStore> {
        PrincipalResolver::new(test_acl())
    }

    #[tokio::test]
    async fn test_first_login_creates_account_with_default_role() {
        let r = resolver();
        let user = r
            .provision_sso(&AuthenticatedUser::new("Bob@X.com", "google-1").with_name("Bob"))
            .await
            .unwrap();
        assert_eq!(user.email, "bob@x.com");
        assert_eq!(user.display_name, "Bob");
        assert_eq!(user.sso_subject.as_deref(), Some("google-1"));
        assert!(!user.has_password());

        let role = r.acl.registry().get_role(user.role_id).await.unwrap();
        assert_eq!(role.name, "User");

        let err = r
            .acl
            .identity()
            .verify_credential("bob@x.com", "anything")
            .await
            .unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[tokio::test]
    async fn test_second_login_reuses_account() {
        let r = resolver();
        let identity = AuthenticatedUser::new("bob@x.com", "google-1");
        let first = r.provision_sso(&identity).await.unwrap();
        let second = r.provision_sso(&identity).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(r.acl.identity().list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_password_account_gets_linked() {
        let r = resolver();
        let role = r.acl.registry().define_role("Sales", "").await.unwrap();
        let created = r
            .acl
            .identity()
            .create_user("carol@x.com", "Carol", Some("pw"), role.id)
            .await
            .unwrap();
        let user = r
            .provision_sso(&AuthenticatedUser::new("carol@x.com", "google-7"))
            .await
            .unwrap();
        assert_eq!(user.id, created.id);
        assert_eq!(user.role_id, role.id);
        assert_eq!(user.sso_subject.as_deref(), Some("google-7"));
        assert!(user.has_password());
    }

    #[tokio::test]
    async fn test_subject_match_updates_email() {
        let r = resolver();
        let first = r
            .provision_sso(&AuthenticatedUser::new("old@x.com", "google-9"))
            .await
            .unwrap();
        let moved = r
            .provision_sso(&AuthenticatedUser::new("new@x.com", "google-9"))
            .await
            .unwrap();
        assert_eq!(moved.id, first.id);
        assert_eq!(moved.email, "new@x.com");
    }

    #[tokio::test]
    async fn test_inactive_account_not_reactivated() {
        let r = resolver();
        let identity = AuthenticatedUser::new("dan@x.com", "google-3");
        let user = r.provision_sso(&identity).await.unwrap();
        r.acl.identity().deactivate(user.id).await.unwrap();

        let err = r.provision_sso(&identity).await.unwrap_err();
        assert!(matches!(err, AuthError::Acl(Error::AccountInactive)));
        assert!(!r.acl.identity().get_user(user.id).await.unwrap().active);
        assert!(matches!(
            r.resolve(&identity).await,
            Err(AuthError::Acl(Error::AccountInactive))
        ));
    }

    #[tokio::test]
    async fn test_resolve_unknown_identity() {
        let r = resolver();
        let err = r
            .resolve(&AuthenticatedUser::new("ghost@x.com", "nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotProvisioned { .. }));
        assert_eq!(err.status_code(), http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_resolve_parts() {
        let r = resolver();
        let identity = AuthenticatedUser::new("erin@x.com", "google-5");
        let principal = r.resolve_or_provision(&identity).await.unwrap();

        let (mut parts, _body) = http::Request::new(()).into_parts();
        assert!(matches!(
            r.resolve_parts(&parts).await,
            Err(AuthError::MissingToken)
        ));
        parts.extensions.insert(identity);
        assert_eq!(r.resolve_parts(&parts).await.unwrap(), principal);
    }

    #[tokio::test]
    async fn test_missing_email_rejected() {
        let r = resolver();
        let err = r
            .provision_sso(&AuthenticatedUser::new("", "google-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingEmail));
    }
}
