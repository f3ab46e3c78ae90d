//! Error types for bizops-acl
//!
//! Every business-rule failure has its own variant so the request layer can
//! map it to a status code. [`Error::kind`] gives the stable name of each.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for bizops-acl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bizops-acl
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Another account already uses this email (case-insensitive)
    #[error("Email already registered: {email}")]
    DuplicateEmail {
        /// Normalized email
        email: String,
    },

    /// A role with this name already exists (case-insensitive)
    #[error("Role already exists: {name}")]
    DuplicateRole {
        /// Requested role name
        name: String,
    },

    /// A permission with this name already exists
    #[error("Permission already exists: {name}")]
    DuplicatePermission {
        /// Requested permission name
        name: String,
    },

    /// Another account is already linked to this SSO subject
    #[error("SSO subject already linked to another account")]
    DuplicateSsoSubject,

    /// No user with this id
    #[error("User not found: {key}")]
    UnknownUser {
        /// Id or email that was looked up
        key: String,
    },

    /// No role with this id or name
    #[error("Role not found: {key}")]
    UnknownRole {
        /// Id or name that was looked up
        key: String,
    },

    /// No permission with this id or name
    #[error("Permission not found: {key}")]
    UnknownPermission {
        /// Id or name that was looked up
        key: String,
    },

    /// Unknown email or wrong password
    #[error("Invalid credential")]
    InvalidCredential,

    /// The account has no password credential (SSO-provisioned)
    #[error("No password credential")]
    NoPasswordCredential,

    /// Password changes are not available to SSO-linked accounts
    #[error("Password management is not available for accounts linked with SSO")]
    PasswordManagedBySso,

    /// The account is deactivated
    #[error("Account is inactive")]
    AccountInactive,

    /// The principal's role lacks the requested permission
    #[error("Missing required permission: {permission}")]
    PermissionNotGranted {
        /// `<resource>.<action>` that was requested
        permission: String,
    },

    /// The role is still assigned to at least one user
    #[error("Role '{name}' is assigned to {users} user(s)")]
    RoleInUse {
        /// Role name
        name: String,
        /// Number of users referencing it
        users: usize,
    },

    /// The superuser and default roles cannot be deleted or renamed
    #[error("Role '{name}' is protected")]
    ProtectedRole {
        /// Role name
        name: String,
    },

    /// Input failed validation
    #[error("Validation error: {message}")]
    Validation {
        /// Field or aspect that failed validation
        field: Option<String>,
        /// What went wrong
        message: String,
    },

    /// Hashing or parsing a password hash failed
    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// Persistence backend failure
    #[error("Store error: {message}")]
    Store {
        /// What went wrong
        message: String,
    },

    /// I/O error from a file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from bizops-core
    #[error("Core error: {0}")]
    Core(bizops_core::Error),
}

impl From<bizops_core::Error> for Error {
    fn from(err: bizops_core::Error) -> Self {
        match err {
            bizops_core::Error::Validation { field, message } => {
                Error::Validation { field, message }
            }
            other => Error::Core(other),
        }
    }
}

/// Stable, serializable name of an [`Error`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum ErrorKind {
    DuplicateEmail,
    DuplicateRole,
    DuplicatePermission,
    DuplicateSsoSubject,
    UnknownUser,
    UnknownRole,
    UnknownPermission,
    InvalidCredential,
    NoPasswordCredential,
    PasswordManagedBySso,
    AccountInactive,
    PermissionNotGranted,
    RoleInUse,
    ProtectedRole,
    Validation,
    Internal,
}

impl ErrorKind {
    /// The snake_case name used in logs and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateEmail => "duplicate_email",
            Self::DuplicateRole => "duplicate_role",
            Self::DuplicatePermission => "duplicate_permission",
            Self::DuplicateSsoSubject => "duplicate_sso_subject",
            Self::UnknownUser => "unknown_user",
            Self::UnknownRole => "unknown_role",
            Self::UnknownPermission => "unknown_permission",
            Self::InvalidCredential => "invalid_credential",
            Self::NoPasswordCredential => "no_password_credential",
            Self::PasswordManagedBySso => "password_managed_by_sso",
            Self::AccountInactive => "account_inactive",
            Self::PermissionNotGranted => "permission_not_granted",
            Self::RoleInUse => "role_in_use",
            Self::ProtectedRole => "protected_role",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DuplicateEmail { .. } => ErrorKind::DuplicateEmail,
            Error::DuplicateRole { .. } => ErrorKind::DuplicateRole,
            Error::DuplicatePermission { .. } => ErrorKind::DuplicatePermission,
            Error::DuplicateSsoSubject => ErrorKind::DuplicateSsoSubject,
            Error::UnknownUser { .. } => ErrorKind::UnknownUser,
            Error::UnknownRole { .. } => ErrorKind::UnknownRole,
            Error::UnknownPermission { .. } => ErrorKind::UnknownPermission,
            Error::InvalidCredential => ErrorKind::InvalidCredential,
            Error::NoPasswordCredential => ErrorKind::NoPasswordCredential,
            Error::PasswordManagedBySso => ErrorKind::PasswordManagedBySso,
            Error::AccountInactive => ErrorKind::AccountInactive,
            Error::PermissionNotGranted { .. } => ErrorKind::PermissionNotGranted,
            Error::RoleInUse { .. } => ErrorKind::RoleInUse,
            Error::ProtectedRole { .. } => ErrorKind::ProtectedRole,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::PasswordHash(_)
            | Error::Store { .. }
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Core(_) => ErrorKind::Internal,
        }
    }

    /// Whether a client should only ever see "authentication failed".
    ///
    /// Both credential failures collapse to this so callers cannot probe
    /// which accounts exist or which use SSO.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Error::InvalidCredential | Error::NoPasswordCredential)
    }

    /// Whether this is a failure of the store rather than of the request.
    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    /// Creates a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error with a field name.
    pub fn validation_field<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Creates a new store error.
    pub fn store<S: Into<String>>(message: S) -> Self {
        Error::Store {
            message: message.into(),
        }
    }
}
