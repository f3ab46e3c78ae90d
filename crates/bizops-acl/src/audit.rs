//! Audit trail of administrative mutations.
//!
//! Records are appended inside the same transaction as the change they
//! describe, so the trail never shows a change that was rolled back.
//! Details never include credentials.

use bizops_core::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of record a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A user account.
    User,
    /// A role.
    Role,
    /// A permission.
    Permission,
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Record created.
    Create,
    /// Record fields changed.
    Update,
    /// Record removed.
    Delete,
    /// Permission granted to a role.
    Grant,
    /// Permission revoked from a role.
    Revoke,
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the change was committed.
    pub at: DateTime<Utc>,
    /// User who made the change, when known.
    pub actor: Option<UserId>,
    /// Kind of record changed.
    pub entity: EntityKind,
    /// Id of the record changed.
    pub entity_id: String,
    /// What happened.
    pub action: AuditAction,
    /// Change details, e.g. `{"role": {"old": .., "new": ..}}`.
    pub details: serde_json::Value,
}

/// Who is mutating, and when. Shared by every record of one transaction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Stamp {
    pub actor: Option<UserId>,
    pub at: DateTime<Utc>,
}

impl Stamp {
    pub fn now(actor: Option<UserId>) -> Self {
        Self {
            actor,
            at: Utc::now(),
        }
    }

    pub fn record(
        &self,
        entity: EntityKind,
        entity_id: impl ToString,
        action: AuditAction,
        details: serde_json::Value,
    ) -> AuditRecord {
        AuditRecord {
            at: self.at,
            actor: self.actor,
            entity,
            entity_id: entity_id.to_string(),
            action,
            details,
        }
    }
}
