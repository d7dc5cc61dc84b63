//! Lovelace plugins, shipped as a single JavaScript file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::error::RetrievalError;
use crate::runtime::Runtime;

use super::{BasePackage, Package, PackageContext, PackageDescription};

pub const PLUGIN_KIND: &str = "plugins";

/// Folder under the export root the host serves plugins from.
const PLUGIN_FOLDER: &str = "www/custom_lovelace";

/// Repositories are commonly named `lovelace-<plugin>` while the script is `<plugin>.js`.
const NAME_PREFIX: &str = "lovelace-";

/// Build output directory searched before the repository root.
const DIST_DIR: &str = "dist";

pub struct PluginPackage {
    base: BasePackage,
}

impl PluginPackage {
    pub fn new(description: PackageDescription, ctx: &PackageContext) -> Self {
        Self {
            base: BasePackage::new(description, ctx, "js", PLUGIN_KIND),
        }
    }

    /// Script names to look for, most preferred first.
    fn candidate_files(&self) -> [String; 2] {
        let name = self
            .base
            .name()
            .strip_prefix(NAME_PREFIX)
            .unwrap_or(self.base.name());
        [format!("{}.js", name), format!("{}-bundle.js", name)]
    }

    /// Try every candidate against the nested path, the bare path and the
    /// release assets, in that order. The first non-empty hit wins.
    #[tracing::instrument(skip(self))]
    async fn find_script(&self, version: &str) -> Result<Vec<u8>> {
        let provider = self.base.provider();
        let full_name = self.base.full_name();

        for file in self.candidate_files() {
            let nested = format!("{}/{}", DIST_DIR, file);
            match provider.get_tree_file(full_name, version, &nested).await {
                Ok(content) if !content.is_empty() => return Ok(content),
                Ok(_) => debug!("{} is empty in {}@{}", nested, full_name, version),
                Err(e) => debug!("{} unavailable in {}@{}: {}", nested, full_name, version, e),
            }
            match provider.get_tree_file(full_name, version, &file).await {
                Ok(content) if !content.is_empty() => return Ok(content),
                Ok(_) => debug!("{} is empty in {}@{}", file, full_name, version),
                Err(e) => debug!("{} unavailable in {}@{}: {}", file, full_name, version, e),
            }
            match provider.get_release_file(full_name, version, &file).await {
                Ok(content) if !content.is_empty() => return Ok(content),
                Ok(_) => debug!(
                    "Release asset {} of {}@{} is empty",
                    file, full_name, version
                ),
                Err(e) => debug!(
                    "Release asset {} of {}@{} unavailable: {}",
                    file, full_name, version, e
                ),
            }
        }

        let what = format!("plugin script of {}@{}", full_name, version);
        Err(RetrievalError::NotFound(what).into())
    }

    async fn download_script(&self, version: &str) -> Result<()> {
        let content = self.find_script(version).await?;
        self.base.write_artifact(version, &content)
    }
}

#[async_trait]
impl Package for PluginPackage {
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
        self.download_script(&version).await
    }

    async fn switch(&mut self, version: &str) -> Result<()> {
        self.download_script(version).await?;
        self.base.replace_current(version)
    }

    fn destroy(&self) -> Result<()> {
        self.base.destroy()
    }

    fn export(&self, target: &Path) -> Result<()> {
        let runtime = self.base.runtime();
        let destination = target
            .join(PLUGIN_FOLDER)
            .join(format!("{}.js", self.base.name()));
        let content = runtime
            .read(&self.base.current_path())
            .with_context(|| format!("Failed to read artifact of {}", self.base.description()))?;
        runtime
            .write(&destination, &content)
            .with_context(|| format!("Failed to export {}", self.base.description()))?;
        info!("Exported {} to {:?}", self.base.full_name(), destination);
        Ok(())
    }

    async fn latest_version(&self, stable_only: bool) -> Result<String> {
        self.base.latest_version(stable_only).await
    }
}

pub fn plugin_pre_export(runtime: &dyn Runtime, target: &Path) -> Result<()> {
    runtime.create_dir_all(&target.join(PLUGIN_FOLDER))
}

/// File names present in the plugin folder, sorted. The user has to register
/// each of them as a dashboard resource.
pub fn plugin_post_export(runtime: &dyn Runtime, target: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = runtime
        .read_dir(&target.join(PLUGIN_FOLDER))?
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
        .collect();
    names.sort();
    Ok(names)
}
