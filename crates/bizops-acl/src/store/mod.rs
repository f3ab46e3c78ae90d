//! Persistence backends.
//!
//! A store publishes whole [`AclState`] snapshots. [`AclStore::transact`]
//! runs a mutation against a private copy and publishes it only if the
//! mutation succeeds, so a concurrent reader sees either the state before
//! or the state after, never a partial update.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::state::AclState;

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Backend for identity and registry state.
#[async_trait]
pub trait AclStore: Send + Sync + 'static {
    /// The current published state.
    async fn snapshot(&self) -> Result<Arc<AclState>>;

    /// Apply `op` atomically.
    ///
    /// Mutations are serialized. If `op` returns an error nothing is
    /// published and the error is returned unchanged.
    async fn transact<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut AclState) -> Result<T> + Send,
        T: Send;
}
