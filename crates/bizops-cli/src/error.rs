//! Error types for bizops-cli

use thiserror::Error;

/// Result type alias for bizops-cli operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bizops-cli
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error from bizops-core
    #[error(transparent)]
    Core(#[from] bizops_core::Error),

    /// Error from bizops-acl
    #[error(transparent)]
    Acl(#[from] bizops_acl::Error),

    /// Error from bizops-auth
    #[error(transparent)]
    Auth(#[from] bizops_auth::AuthError),

    /// Writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad command-line input
    #[error("{0}")]
    Usage(String),
}

impl Error {
    /// Creates a new usage error.
    pub fn usage<S: Into<String>>(message: S) -> Self {
        Error::Usage(message.into())
    }
}
