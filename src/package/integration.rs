//! Custom integrations, shipped as the repository source tarball.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::archive::extract_marked_subtree;
use crate::runtime::Runtime;

use super::{BasePackage, Package, PackageContext, PackageDescription};

pub const INTEGRATION_KIND: &str = "integrations";

/// Folder the host loads integrations from; also the tarball marker.
const INTEGRATION_FOLDER: &str = "custom_components";

pub struct IntegrationPackage {
    base: BasePackage,
}

impl IntegrationPackage {
    pub fn new(description: PackageDescription, ctx: &PackageContext) -> Self {
        Self {
            base: BasePackage::new(description, ctx, "tar.gz", INTEGRATION_KIND),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn download_tarball(&self, version: &str) -> Result<()> {
        debug!("Fetching tarball of {}@{}", self.base.full_name(), version);
        let content = self
            .base
            .provider()
            .get_tarball(self.base.full_name(), version)
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch tarball of {}@{}",
                    self.base.full_name(),
                    version
                )
            })?;
        self.base.write_artifact(version, &content)
    }
}

#[async_trait]
impl Package for IntegrationPackage {
    fn description(&self) -> PackageDescription {
        self.base.description()
    }

    fn full_name(&self) -> &str {
        self.base.full_name()
    }

    fn version(&self) -> &str {
        self.base.version()
    }

    fn kind(&self) -> &str {
        self.base.kind()
    }

    fn artifact_path(&self) -> PathBuf {
        self.base.current_path()
    }

    async fn setup(&mut self) -> Result<()> {
        self.base.ensure_resolved()?;
        let version = self.base.version().to_string();
        self.download_tarball(&version).await
    }

    async fn switch(&mut self, version: &str) -> Result<()> {
        self.download_tarball(version).await?;
        self.base.replace_current(version)
    }

    fn destroy(&self) -> Result<()> {
        self.base.destroy()
    }

    fn export(&self, target: &Path) -> Result<()> {
        let written = extract_marked_subtree(
            self.base.runtime(),
            &self.base.current_path(),
            INTEGRATION_FOLDER,
            target,
        )
        .with_context(|| format!("Failed to export {}", self.base.description()))?;
        info!("Exported {} ({} files)", self.base.full_name(), written);
        Ok(())
    }

    async fn latest_version(&self, stable_only: bool) -> Result<String> {
        self.base.latest_version(stable_only).await
    }
}

pub fn integration_pre_export(runtime: &dyn Runtime, target: &Path) -> Result<()> {
    runtime.create_dir_all(&target.join(INTEGRATION_FOLDER))
}

/// Integrations need no follow-up from the user.
pub fn integration_post_export(_runtime: &dyn Runtime, _target: &Path) -> Result<Vec<String>> {
    Ok(Vec::new())
}
