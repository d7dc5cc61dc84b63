//! Package management module
//!
//! A package is one installed unit (an integration or a plugin) bound to a
//! [`PackageDescription`]. On disk it is exactly one artifact file in the
//! storage root. Kinds plug in through the [`Registry`].

mod base;
mod description;
mod integration;
mod plugin;
mod registry;
pub mod version;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::provider::Provider;
use crate::runtime::Runtime;

pub use base::BasePackage;
pub use description::{LATEST, PackageDescription};
pub use integration::{INTEGRATION_KIND, IntegrationPackage};
pub use plugin::{PLUGIN_KIND, PluginPackage};
pub use registry::{Constructor, KindEntry, PostExportHook, PreExportHook, Registry};
pub use version::{Version, find_latest};

/// Shared dependencies handed to every package constructor.
#[derive(Clone)]
pub struct PackageContext {
    /// Directory holding artifacts and the lock record.
    pub root: PathBuf,
    pub provider: Arc<dyn Provider>,
    pub runtime: Arc<dyn Runtime>,
}

impl PackageContext {
    pub fn new(root: PathBuf, provider: Arc<dyn Provider>, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            root,
            provider,
            runtime,
        }
    }
}

/// Artifact lifecycle of one installed package.
#[async_trait]
pub trait Package: Send + Sync {
    fn description(&self) -> PackageDescription;
    fn full_name(&self) -> &str;
    fn version(&self) -> &str;
    fn kind(&self) -> &str;

    /// Path of the artifact for the current version.
    fn artifact_path(&self) -> PathBuf;

    /// Fetch the artifact of the declared version for the first time.
    async fn setup(&mut self) -> Result<()>;

    /// Fetch `version`, then drop the previous artifact, then adopt `version`.
    /// A failed fetch leaves the package untouched.
    async fn switch(&mut self, version: &str) -> Result<()>;

    /// Remove the current artifact.
    fn destroy(&self) -> Result<()>;

    /// Place the artifact into the host's directory layout under `target`.
    fn export(&self, target: &Path) -> Result<()>;

    async fn latest_version(&self, stable_only: bool) -> Result<String>;
}
