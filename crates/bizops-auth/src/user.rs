//! Authenticated user identity and extraction helpers.

use crate::AuthError;

/// An authenticated user identity, extracted from a validated token.
///
/// Produced by the external token resolver and stored in HTTP request
/// extensions. Bizops only maps it to a [`bizops_acl::Principal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The user's email address.
    pub email: String,
    /// The user's unique subject identifier (from the `sub` claim).
    pub subject: String,
    /// Display name from the identity provider, if it sent one.
    pub name: Option<String>,
}

impl AuthenticatedUser {
    /// Identity without a display name.
    pub fn new(email: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            subject: subject.into(),
            name: None,
        }
    }

    /// Attach the provider's display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Provider name, or the local part of the email.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or(&self.email))
    }
}

/// Extract the `AuthenticatedUser` from HTTP request `Parts`, if present.
pub fn user_from_parts(parts: &http::request::Parts) -> Option<&AuthenticatedUser> {
    parts.extensions.get::<AuthenticatedUser>()
}

/// Like [`user_from_parts`], failing with `MissingToken` when absent.
pub fn require_user(parts: &http::request::Parts) -> Result<&AuthenticatedUser, AuthError> {
    user_from_parts(parts).ok_or(AuthError::MissingToken)
}

/// Extract the user's email from HTTP request `Parts`.
///
/// Returns `"anonymous"` if no authenticated user is present.
pub fn email_from_parts(parts: &http::request::Parts) -> &str {
    user_from_parts(parts)
        .map(|u| u.email.as_str())
        .unwrap_or("anonymous")
}
