//! JSON file store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::AclStore;
use crate::state::AclState;
use crate::{Error, Result};

/// Store that persists the whole state as one JSON document.
///
/// Each committed transaction is written to `<path>.tmp` and renamed over
/// `path`; the in-memory copy is only replaced once the rename succeeds.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: RwLock<Arc<AclState>>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "state file not found, starting empty");
                AclState::default()
            }
            Err(e) => {
                return Err(Error::store(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        Ok(Self {
            path,
            state: RwLock::new(Arc::new(state)),
        })
    }

    /// Location of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &AclState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl AclStore for JsonFileStore {
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
        if let Err(e) = self.persist(&next).await {
            tracing::error!(path = %self.path.display(), error = %e, "failed to persist state");
            return Err(e);
        }
        *guard = Arc::new(next);
        Ok(out)
    }
}
