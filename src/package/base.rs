use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::provider::Provider;
use crate::runtime::Runtime;

use super::{LATEST, PackageContext, PackageDescription, find_latest};

/// State and behavior shared by every package kind.
///
/// Artifacts live at `<root>/<owner>-<repo>@<version>.<extension>`.
pub struct BasePackage {
    kind: &'static str,
    extension: &'static str,
    full_name: String,
    version: String,
    base_path: PathBuf,
    name: String,
    provider: Arc<dyn Provider>,
    runtime: Arc<dyn Runtime>,
}

impl BasePackage {
    pub fn new(
        description: PackageDescription,
        ctx: &PackageContext,
        extension: &'static str,
        kind: &'static str,
    ) -> Self {
        let base_path = ctx.root.join(description.full_name.replace('/', "-"));
        let name = description.short_name().to_string();
        Self {
            kind,
            extension,
            full_name: description.full_name,
            version: description.version,
            base_path,
            name,
            provider: ctx.provider.clone(),
            runtime: ctx.runtime.clone(),
        }
    }

    pub fn description(&self) -> PackageDescription {
        PackageDescription::new(&self.full_name, &self.version, self.kind)
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Repository name without owner.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn runtime(&self) -> &dyn Runtime {
        self.runtime.as_ref()
    }

    /// Artifact path for `version`.
    pub fn path(&self, version: &str) -> PathBuf {
        let mut file = self.base_path.clone().into_os_string();
        file.push(format!("@{}.{}", version, self.extension));
        PathBuf::from(file)
    }

    /// Artifact path for the current version.
    pub fn current_path(&self) -> PathBuf {
        self.path(&self.version)
    }

    /// Refuse to fetch while the version is still the `latest` sentinel.
    pub fn ensure_resolved(&self) -> Result<()> {
        if self.version == LATEST {
            let full_name = self.full_name.clone();
            return Err(ConfigurationError::UnresolvedVersion(full_name).into());
        }
        Ok(())
    }

    pub fn write_artifact(&self, version: &str, content: &[u8]) -> Result<()> {
        let path = self.path(version);
        debug!("Writing {} bytes to {:?}", content.len(), path);
        self.runtime
            .write(&path, content)
            .with_context(|| format!("Failed to store artifact of {}@{}", self.full_name, version))
    }

    /// Second half of a switch: the new artifact is already on disk.
    pub fn replace_current(&mut self, version: &str) -> Result<()> {
        self.runtime
            .remove_file(&self.current_path())
            .with_context(|| {
                format!(
                    "Failed to remove previous artifact of {}@{}",
                    self.full_name, self.version
                )
            })?;
        self.version = version.to_string();
        Ok(())
    }

    pub fn destroy(&self) -> Result<()> {
        self.runtime
            .remove_file(&self.current_path())
            .with_context(|| format!("Failed to remove {}@{}", self.full_name, self.version))
    }

    #[tracing::instrument(skip(self))]
    pub async fn latest_version(&self, stable_only: bool) -> Result<String> {
        let tags = self
            .provider
            .get_versions(&self.full_name)
            .await
            .with_context(|| format!("Failed to list versions of {}", self.full_name))?;
        Ok(find_latest(&tags, stable_only))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::path::Path;

    fn context(provider: MockProvider, runtime: MockRuntime) -> PackageContext {
        PackageContext::new(
            PathBuf::from("/storage"),
            Arc::new(provider),
            Arc::new(runtime),
        )
    }

    #[test]
    fn test_artifact_path() {
        let ctx = context(MockProvider::new(), MockRuntime::new());
        let base = BasePackage::new(
            PackageDescription::new("foo/bar", "v1.0.0", "integrations"),
            &ctx,
            "tar.gz",
            "integrations",
        );

        let current = Path::new("/storage/foo-bar@v1.0.0.tar.gz");
        let next = Path::new("/storage/foo-bar@v2.0.0.tar.gz");
        assert_eq!(base.current_path(), current);
        assert_eq!(base.path("v2.0.0"), next);
        assert_eq!(base.name(), "bar");
    }

    #[test]
    fn test_ensure_resolved_rejects_latest() {
        let ctx = context(MockProvider::new(), MockRuntime::new());
        let base = BasePackage::new(
            PackageDescription::new("foo/bar", "latest", "plugins"),
            &ctx,
            "js",
            "plugins",
        );

        let err = base.ensure_resolved().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigurationError>(),
            Some(&ConfigurationError::UnresolvedVersion("foo/bar".into()))
        );
    }

    #[test]
    fn test_replace_current_keeps_version_on_failure() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_remove_file()
            .with(eq(PathBuf::from("/storage/foo-bar@v1.0.0.js")))
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("permission denied")));
        let ctx = context(MockProvider::new(), runtime);
        let mut base = BasePackage::new(
            PackageDescription::new("foo/bar", "v1.0.0", "plugins"),
            &ctx,
            "js",
            "plugins",
        );

        assert!(base.replace_current("v2.0.0").is_err());
        assert_eq!(base.version(), "v1.0.0");
    }

    #[tokio::test]
    async fn test_latest_version_uses_tags() {
        let mut provider = MockProvider::new();
        provider
            .expect_get_versions()
            .with(eq("foo/bar"))
            .times(1)
            .returning(|_| Ok(vec!["v1.0.0".into(), "v1.1.0-beta".into(), "junk".into()]));
        let ctx = context(provider, MockRuntime::new());
        let base = BasePackage::new(
            PackageDescription::new("foo/bar", "v1.0.0", "integrations"),
            &ctx,
            "tar.gz",
            "integrations",
        );

        assert_eq!(base.latest_version(true).await.unwrap(), "v1.0.0");
    }
}
