//! The subject of an authorization check.

use std::fmt;

use bizops_core::UserId;
use serde::{Deserialize, Serialize};

/// A user whose identity has already been established by the caller.
///
/// Carries only the user id. Role and active flag are read from the store
/// on every check so that changes apply to the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// The authenticated user.
    pub user_id: UserId,
}

impl Principal {
    /// Principal for `user_id`.
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

impl From<UserId> for Principal {
    fn from(user_id: UserId) -> Self {
        Self::new(user_id)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.user_id)
    }
}
