//! Auth-boundary error types and their HTTP mapping.

use bizops_acl::ErrorKind;
use http::StatusCode;
use serde::Serialize;

/// Message returned to clients for every credential failure.
pub const AUTHENTICATION_FAILED: &str = "authentication failed";

/// Errors that can occur while turning a request identity into a principal.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No authenticated identity accompanies the request.
    #[error("missing authentication token")]
    MissingToken,

    /// The validated token carries no email.
    #[error("token missing email claim")]
    MissingEmail,

    /// The token identity has no account and provisioning was not requested.
    #[error("no account for '{email}'")]
    NotProvisioned {
        /// Email from the token.
        email: String,
    },

    /// Startup configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error from the identity store, registry or authorizer.
    #[error(transparent)]
    Acl(#[from] bizops_acl::Error),
}

impl From<bizops_core::Error> for AuthError {
    fn from(err: bizops_core::Error) -> Self {
        AuthError::Acl(err.into())
    }
}

impl AuthError {
    /// Whether this error should result in a 4xx (vs. a 500).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Whether the client must only learn that authentication failed.
    pub fn is_authentication_failure(&self) -> bool {
        match self {
            AuthError::MissingToken
            | AuthError::MissingEmail
            | AuthError::NotProvisioned { .. } => true,
            AuthError::Acl(e) => e.is_authentication_failure(),
            AuthError::Config(_) => false,
        }
    }

    /// The status code a request handler should answer with.
    pub fn status_code(&self) -> StatusCode {
        let kind = match self {
            AuthError::MissingToken
            | AuthError::MissingEmail
            | AuthError::NotProvisioned { .. } => return StatusCode::UNAUTHORIZED,
            AuthError::Config(_) => return StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Acl(e) => e.kind(),
        };
        status_for_kind(kind)
    }

    /// Stable error name for API payloads.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AuthError::Acl(e) if e.is_authentication_failure() => "authentication_failed",
            AuthError::Acl(e) => e.kind().as_str(),
            AuthError::Config(_) => "internal",
            _ => "authentication_failed",
        }
    }

    /// Client-safe message.
    ///
    /// Credential failures collapse into one message, and internal failures
    /// are not described at all.
    pub fn public_message(&self) -> String {
        if self.is_authentication_failure() {
            AUTHENTICATION_FAILED.to_string()
        } else if self.status_code().is_server_error() {
            "internal error".to_string()
        } else {
            self.to_string()
        }
    }

    /// JSON body for an error response.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind_name(),
            message: self.public_message(),
        }
    }
}

/// Serializable error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable error name.
    pub error: &'static str,
    /// Client-safe message.
    pub message: String,
}

/// Status code for an error kind.
pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::DuplicateEmail
        | ErrorKind::DuplicateRole
        | ErrorKind::DuplicatePermission
        | ErrorKind::DuplicateSsoSubject
        | ErrorKind::RoleInUse => StatusCode::CONFLICT,
        ErrorKind::UnknownUser | ErrorKind::UnknownRole | ErrorKind::UnknownPermission => {
            StatusCode::NOT_FOUND
        }
        ErrorKind::InvalidCredential | ErrorKind::NoPasswordCredential => StatusCode::UNAUTHORIZED,
        ErrorKind::AccountInactive
        | ErrorKind::PermissionNotGranted
        | ErrorKind::ProtectedRole
        | ErrorKind::PasswordManagedBySso => StatusCode::FORBIDDEN,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
