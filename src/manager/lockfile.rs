use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::package::PackageDescription;
use crate::runtime::Runtime;

/// Durable record of installed packages: a JSON array of descriptions.
pub struct Lockfile {
    path: PathBuf,
    runtime: Arc<dyn Runtime>,
}

impl Lockfile {
    pub fn new(path: PathBuf, runtime: Arc<dyn Runtime>) -> Self {
        Self { path, runtime }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.runtime.exists(&self.path)
    }

    /// Replace the record with `descriptions`, keeping their order.
    pub fn dump(&self, descriptions: &[PackageDescription]) -> Result<()> {
        debug!("Writing {} entries to {:?}", descriptions.len(), self.path);
        let content = serde_json::to_string_pretty(descriptions)?;
        self.runtime
            .write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write lock record to {:?}", self.path))
    }

    /// Read the record. An empty file means nothing is installed.
    pub fn load(&self) -> Result<Vec<PackageDescription>> {
        let content = self
            .runtime
            .read_to_string(&self.path)
            .with_context(|| format!("Failed to read lock record from {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse lock record at {:?}", self.path))
    }
}
