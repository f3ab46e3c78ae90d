//! Identity store: user accounts, credentials and role assignment.
//!
//! The store exclusively owns [`User`] records. Users reference their role
//! by id; every user has exactly one role at all times.

use std::sync::Arc;

use bizops_core::{RoleId, UserId, normalize_email};
use serde_json::json;
use tracing::instrument;

use crate::audit::{AuditAction, EntityKind, Stamp};
use crate::model::User;
use crate::password::CredentialHasher;
use crate::state::AclState;
use crate::store::AclStore;
use crate::{Error, Result};

// ============================================================================
// Inputs
// ============================================================================

/// Fields for a new account.
#[derive(Clone)]
pub struct NewUser {
    /// Login email; normalized before storage.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Password, or `None` for SSO-only accounts.
    pub password: Option<String>,
    /// SSO subject to link immediately.
    pub sso_subject: Option<String>,
    /// The account's role.
    pub role_id: RoleId,
}

impl NewUser {
    /// An account without credentials yet.
    pub fn new(email: impl Into<String>, display_name: impl Into<String>, role_id: RoleId) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
            password: None,
            sso_subject: None,
            role_id,
        }
    }

    /// Set a password credential.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Link an SSO subject.
    pub fn with_sso_subject(mut self, subject: impl Into<String>) -> Self {
        self.sso_subject = Some(subject.into());
        self
    }
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("sso_subject", &self.sso_subject)
            .field("role_id", &self.role_id)
            .finish()
    }
}

/// Profile fields to change; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    /// New display name.
    pub display_name: Option<String>,
    /// New email; uniqueness is re-checked.
    pub email: Option<String>,
}

// ============================================================================
// State mutations
// ============================================================================

fn clean_display_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation_field("display_name", "must not be empty"));
    }
    Ok(name.to_string())
}

impl AclState {
    fn ensure_email_free(&self, email: &str, except: Option<UserId>) -> Result<()> {
        match self.users.values().find(|u| u.email == email) {
            Some(u) if Some(u.id) != except => Err(Error::DuplicateEmail {
                email: email.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_subject_free(&self, subject: &str, except: Option<UserId>) -> Result<()> {
        match self.user_by_sso_subject(subject) {
            Some(u) if Some(u.id) != except => Err(Error::DuplicateSsoSubject),
            _ => Ok(()),
        }
    }

    pub(crate) fn insert_user(
        &mut self,
        new: NewUser,
        password_hash: Option<String>,
        stamp: &Stamp,
    ) -> Result<User> {
        let email = normalize_email(&new.email)?;
        let display_name = clean_display_name(&new.display_name)?;
        self.ensure_email_free(&email, None)?;
        self.require_role(new.role_id)?;
        if let Some(subject) = &new.sso_subject {
            self.ensure_subject_free(subject, None)?;
        }

        let user = User {
            id: UserId::new(),
            email,
            display_name,
            password_hash,
            sso_subject: new.sso_subject,
            role_id: new.role_id,
            active: true,
            created_at: stamp.at,
            updated_at: stamp.at,
        };
        self.audit.push(stamp.record(
            EntityKind::User,
            user.id,
            AuditAction::Create,
            json!({
                "email": user.email,
                "display_name": user.display_name,
                "role_id": user.role_id,
                "password": user.has_password(),
                "sso": user.sso_subject.is_some(),
            }),
        ));
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut User> {
        self.users.get_mut(&id).ok_or_else(|| Error::UnknownUser {
            key: id.to_string(),
        })
    }

    pub(crate) fn assign_role(
        &mut self,
        user_id: UserId,
        role_id: RoleId,
        stamp: &Stamp,
    ) -> Result<bool> {
        self.require_role(role_id)?;
        let user = self.user_mut(user_id)?;
        if user.role_id == role_id {
            return Ok(false);
        }
        let old = std::mem::replace(&mut user.role_id, role_id);
        user.updated_at = stamp.at;
        self.audit.push(stamp.record(
            EntityKind::User,
            user_id,
            AuditAction::Update,
            json!({"role_id": {"old": old, "new": role_id}}),
        ));
        Ok(true)
    }

    pub(crate) fn set_active(
        &mut self,
        user_id: UserId,
        active: bool,
        stamp: &Stamp,
    ) -> Result<bool> {
        let user = self.user_mut(user_id)?;
        if user.active == active {
            return Ok(false);
        }
        user.active = active;
        user.updated_at = stamp.at;
        self.audit.push(stamp.record(
            EntityKind::User,
            user_id,
            AuditAction::Update,
            json!({"active": {"old": !active, "new": active}}),
        ));
        Ok(true)
    }

    pub(crate) fn update_profile(
        &mut self,
        user_id: UserId,
        update: ProfileUpdate,
        stamp: &Stamp,
    ) -> Result<User> {
        let email = update.email.as_deref().map(normalize_email).transpose()?;
        let display_name = update
            .display_name
            .as_deref()
            .map(clean_display_name)
            .transpose()?;
        if let Some(email) = &email {
            self.ensure_email_free(email, Some(user_id))?;
        }

        let user = self.user_mut(user_id)?;
        let mut changes = serde_json::Map::new();
        if let Some(email) = email.filter(|e| *e != user.email) {
            changes.insert("email".into(), json!({"old": user.email, "new": email}));
            user.email = email;
        }
        if let Some(name) = display_name.filter(|n| *n != user.display_name) {
            changes.insert(
                "display_name".into(),
                json!({"old": user.display_name, "new": name}),
            );
            user.display_name = name;
        }
        if !changes.is_empty() {
            user.updated_at = stamp.at;
        }
        let user = user.clone();
        if !changes.is_empty() {
            self.audit.push(stamp.record(
                EntityKind::User,
                user_id,
                AuditAction::Update,
                serde_json::Value::Object(changes),
            ));
        }
        Ok(user)
    }

    pub(crate) fn replace_password(
        &mut self,
        user_id: UserId,
        hash: String,
        stamp: &Stamp,
    ) -> Result<()> {
        let user = self.user_mut(user_id)?;
        user.password_hash = Some(hash);
        user.updated_at = stamp.at;
        self.audit.push(stamp.record(
            EntityKind::User,
            user_id,
            AuditAction::Update,
            json!({"password": "changed"}),
        ));
        Ok(())
    }

    /// Self-service replacement. `expected` is the hash the caller checked
    /// the current password against; a concurrent change makes it stale.
    pub(crate) fn change_own_password(
        &mut self,
        user_id: UserId,
        expected: Option<&str>,
        hash: String,
        stamp: &Stamp,
    ) -> Result<()> {
        let user = self.require_user(user_id)?;
        if user.sso_subject.is_some() {
            return Err(Error::PasswordManagedBySso);
        }
        if user.password_hash.as_deref() != expected {
            return Err(Error::InvalidCredential);
        }
        self.replace_password(user_id, hash, stamp)
    }

    pub(crate) fn link_sso_subject(
        &mut self,
        user_id: UserId,
        subject: &str,
        stamp: &Stamp,
    ) -> Result<bool> {
        if subject.trim().is_empty() {
            return Err(Error::validation_field("sso_subject", "must not be empty"));
        }
        self.ensure_subject_free(subject, Some(user_id))?;
        let user = self.user_mut(user_id)?;
        if user.sso_subject.as_deref() == Some(subject) {
            return Ok(false);
        }
        user.sso_subject = Some(subject.to_string());
        user.updated_at = stamp.at;
        self.audit.push(stamp.record(
            EntityKind::User,
            user_id,
            AuditAction::Update,
            json!({"sso": "linked"}),
        ));
        Ok(true)
    }
}

// ============================================================================
// IdentityStore
// ============================================================================

/// Operations on user accounts.
pub struct IdentityStore<S> {
    store: Arc<S>,
    hasher: Arc<CredentialHasher>,
    actor: Option<UserId>,
}

impl<S> Clone for IdentityStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hasher: self.hasher.clone(),
            actor: self.actor,
        }
    }
}

impl<S: AclStore> IdentityStore<S> {
    /// Build over a shared store and hasher.
    pub fn new(store: Arc<S>, hasher: Arc<CredentialHasher>) -> Self {
        Self {
            store,
            hasher,
            actor: None,
        }
    }

    /// A handle whose mutations are attributed to `actor` in the audit trail.
    pub fn acting_as(&self, actor: UserId) -> Self {
        Self {
            actor: Some(actor),
            ..self.clone()
        }
    }

    fn stamp(&self) -> Stamp {
        Stamp::now(self.actor)
    }

    /// Create an account with an optional password.
    ///
    /// Fails with `DuplicateEmail` if the email is taken (case-insensitive)
    /// and `UnknownRole` if `role_id` does not resolve. Without a password
    /// the account can only sign in through SSO.
    pub async fn create_user(
        &self,
        email: &str,
        display_name: &str,
        password: Option<&str>,
        role_id: RoleId,
    ) -> Result<User> {
        let mut new = NewUser::new(email, display_name, role_id);
        new.password = password.map(str::to_string);
        self.create(new).await
    }

    /// Create an account from a [`NewUser`].
    #[instrument(level = "debug", skip(self, new), fields(email = %new.email))]
    pub async fn create(&self, mut new: NewUser) -> Result<User> {
        let hash = match new.password.take() {
            Some(password) => Some(self.hasher.hash_async(&password).await?),
            None => None,
        };
        let stamp = self.stamp();
        let user = self
            .store
            .transact(move |s| s.insert_user(new, hash, &stamp))
            .await?;
        tracing::info!(user_id = %user.id, email = %user.email, "user created");
        Ok(user)
    }

    /// Check an email/password pair.
    ///
    /// Unknown email and wrong password both fail with `InvalidCredential`;
    /// an account without a password fails with `NoPasswordCredential`.
    /// `AccountInactive` is only reported once the password has matched.
    #[instrument(level = "debug", skip(self, password))]
    pub async fn verify_credential(&self, email: &str, password: &str) -> Result<User> {
        let snapshot = self.store.snapshot().await?;
        let Some(user) = snapshot.user_by_email(email) else {
            self.hasher.verify_decoy_async(password).await;
            tracing::warn!(reason = "unknown_email", "authentication failed");
            return Err(Error::InvalidCredential);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            self.hasher.verify_decoy_async(password).await;
            tracing::warn!(user_id = %user.id, reason = "no_password", "authentication failed");
            return Err(Error::NoPasswordCredential);
        };
        if !self.hasher.verify_async(password, hash).await? {
            tracing::warn!(user_id = %user.id, reason = "wrong_password", "authentication failed");
            return Err(Error::InvalidCredential);
        }
        if !user.active {
            tracing::warn!(user_id = %user.id, reason = "inactive", "authentication failed");
            return Err(Error::AccountInactive);
        }
        Ok(user.clone())
    }

    /// Move a user to another role.
    ///
    /// Takes effect on the next authorization check; tokens already issued
    /// are not revoked.
    #[instrument(level = "debug", skip(self))]
    pub async fn set_role(&self, user_id: UserId, role_id: RoleId) -> Result<()> {
        let stamp = self.stamp();
        if self
            .store
            .transact(move |s| s.assign_role(user_id, role_id, &stamp))
            .await?
        {
            tracing::info!(%user_id, %role_id, "role assigned");
        }
        Ok(())
    }

    /// Deactivate an account. Idempotent.
    #[instrument(level = "debug", skip(self))]
    pub async fn deactivate(&self, user_id: UserId) -> Result<()> {
        let stamp = self.stamp();
        if self
            .store
            .transact(move |s| s.set_active(user_id, false, &stamp))
            .await?
        {
            tracing::info!(%user_id, "user deactivated");
        }
        Ok(())
    }

    /// Reactivate an account. Idempotent.
    #[instrument(level = "debug", skip(self))]
    pub async fn activate(&self, user_id: UserId) -> Result<()> {
        let stamp = self.stamp();
        if self
            .store
            .transact(move |s| s.set_active(user_id, true, &stamp))
            .await?
        {
            tracing::info!(%user_id, "user activated");
        }
        Ok(())
    }

    /// Change display name and/or email.
    #[instrument(level = "debug", skip(self))]
    pub async fn update_profile(&self, user_id: UserId, update: ProfileUpdate) -> Result<User> {
        let stamp = self.stamp();
        self.store
            .transact(move |s| s.update_profile(user_id, update, &stamp))
            .await
    }

    /// Replace the password credential (administrative reset).
    ///
    /// Applies to any account, SSO-linked ones included. Account holders
    /// go through [`change_password`](Self::change_password) instead.
    #[instrument(level = "debug", skip(self, password))]
    pub async fn set_password(&self, user_id: UserId, password: &str) -> Result<()> {
        self.store.snapshot().await?.require_user(user_id)?;
        let hash = self.hasher.hash_async(password).await?;
        let stamp = self.stamp();
        self.store
            .transact(move |s| s.replace_password(user_id, hash, &stamp))
            .await?;
        tracing::info!(%user_id, "password replaced");
        Ok(())
    }

    /// Change one's own password.
    ///
    /// Accounts linked to an SSO identity fail with `PasswordManagedBySso`.
    /// When a password is set, `current` must match it or the call fails
    /// with `InvalidCredential`; an account without one may set a first
    /// password directly.
    #[instrument(level = "debug", skip(self, current, new))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: Option<&str>,
        new: &str,
    ) -> Result<()> {
        let user = self.get_user(user_id).await?;
        if user.sso_subject.is_some() {
            tracing::warn!(%user_id, "password change refused for sso account");
            return Err(Error::PasswordManagedBySso);
        }
        if let Some(stored) = user.password_hash.as_deref() {
            let matches = match current {
                Some(current) => self.hasher.verify_async(current, stored).await?,
                None => false,
            };
            if !matches {
                tracing::warn!(%user_id, reason = "wrong_password", "password change refused");
                return Err(Error::InvalidCredential);
            }
        }

        let hash = self.hasher.hash_async(new).await?;
        let stamp = self.stamp();
        let expected = user.password_hash;
        self.store
            .transact(move |s| s.change_own_password(user_id, expected.as_deref(), hash, &stamp))
            .await?;
        tracing::info!(%user_id, "password changed");
        Ok(())
    }

    /// Link an SSO subject to an existing account.
    #[instrument(level = "debug", skip(self))]
    pub async fn link_sso(&self, user_id: UserId, subject: &str) -> Result<()> {
        let stamp = self.stamp();
        let subject = subject.to_string();
        if self
            .store
            .transact(move |s| s.link_sso_subject(user_id, &subject, &stamp))
            .await?
        {
            tracing::info!(%user_id, "sso identity linked");
        }
        Ok(())
    }

    /// Account by id.
    pub async fn get_user(&self, user_id: UserId) -> Result<User> {
        Ok(self.store.snapshot().await?.require_user(user_id)?.clone())
    }

    /// Account by email (case-insensitive).
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.store.snapshot().await?.user_by_email(email).cloned())
    }

    /// Account linked to an SSO subject.
    pub async fn find_by_sso_subject(&self, subject: &str) -> Result<Option<User>> {
        Ok(self
            .store
            .snapshot()
            .await?
            .user_by_sso_subject(subject)
            .cloned())
    }

    /// All accounts, sorted by email.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let snapshot = self.store.snapshot().await?;
        let mut users: Vec<User> = snapshot.users().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }
}
