//! In-process store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::AclStore;
use crate::Result;
use crate::state::AclState;

/// Store that keeps state in memory only.
///
/// Reads clone an `Arc`; writers hold the write lock for the duration of
/// the mutation closure, which never performs I/O or hashing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Arc<AclState>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with `state`.
    pub fn with_state(state: AclState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
        }
    }
}

#[async_trait]
impl AclStore for MemoryStore {
    async fn snapshot(&self) -> Result<Arc<AclState>> {
        Ok(self.state.read().await.clone())
    }

    async fn transact<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut AclState) -> Result<T> + Send,
        T: Send,
    {
        let mut guard = self.state.write().await;
        let mut next = AclState::clone(&guard);
        let out = op(&mut next)?;
        *guard = Arc::new(next);
        Ok(out)
    }
}
