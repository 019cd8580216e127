use super::store::DomainState;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Persistence seam for the domain store.
///
/// `save` runs after every mutation; a failure is logged by the store and
/// never blocks in-memory operation.
pub trait StateStore: Send + Sync {
    /// Load the previously saved state, `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<DomainState>>;

    fn save(&self, state: &DomainState) -> Result<()>;
}

/// Whole-state JSON file persistence.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<Option<DomainState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read(&self.path)
            .with_context(|| format!("Failed to read state file: {:?}", self.path))?;
        let state = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse state file: {:?}", self.path))?;

        Ok(Some(state))
    }

    fn save(&self, state: &DomainState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create state directory: {:?}", parent))?;
            }
        }

        let data = serde_json::to_vec_pretty(state).context("Failed to serialize state")?;
        fs::write(&self.path, data)
            .with_context(|| format!("Failed to write state file: {:?}", self.path))?;

        Ok(())
    }
}
