use log::debug;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Environment variable overriding the storage root.
pub const STORAGE_ENV: &str = "HAPM_STORAGE";

pub const DEFAULT_STORAGE_ROOT: &str = ".hapm";
pub const DEFAULT_LOCKFILE_NAME: &str = "_lock.json";
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;

/// Settings of a [`PackageManager`](crate::manager::PackageManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directory holding artifacts and the lock record.
    pub storage_root: PathBuf,
    /// Lock record file name inside `storage_root`.
    pub lockfile_name: String,
    /// Upper bound of concurrently applied jobs.
    pub max_concurrency: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            lockfile_name: DEFAULT_LOCKFILE_NAME.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl ManagerConfig {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            ..Self::default()
        }
    }

    /// Defaults, with the storage root taken from `HAPM_STORAGE` when set.
    pub fn from_runtime(runtime: &dyn Runtime) -> Self {
        match runtime.env_var(STORAGE_ENV) {
            Ok(root) if !root.is_empty() => {
                debug!("Using storage root from {}: {}", STORAGE_ENV, root);
                Self::new(root)
            }
            _ => Self::default(),
        }
    }

    pub fn with_lockfile_name(mut self, name: impl Into<String>) -> Self {
        self.lockfile_name = name.into();
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.storage_root.join(&self.lockfile_name)
    }

    /// Worker count for `jobs` pending jobs. Never zero.
    pub fn workers_for(&self, jobs: usize) -> usize {
        jobs.min(self.max_concurrency).max(1)
    }
}
