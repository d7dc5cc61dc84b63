//! Kind registry.
//!
//! Maps a kind name to the constructor of its package variant and the hooks
//! run around an export. New kinds register an entry; the manager never
//! matches on kind names itself.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use super::integration::{integration_post_export, integration_pre_export};
use super::plugin::{plugin_post_export, plugin_pre_export};
use super::{
    INTEGRATION_KIND, IntegrationPackage, PLUGIN_KIND, Package, PackageContext, PackageDescription,
    PluginPackage,
};
use crate::error::ConfigurationError;
use crate::runtime::Runtime;

/// Builds a package bound to a description.
pub type Constructor = fn(PackageDescription, &PackageContext) -> Box<dyn Package>;

/// Prepares the export root before any package of the kind is exported.
pub type PreExportHook = fn(&dyn Runtime, &Path) -> Result<()>;

/// Runs once all packages are exported; returns informational file names.
pub type PostExportHook = fn(&dyn Runtime, &Path) -> Result<Vec<String>>;

/// Everything the manager needs to handle one kind.
#[derive(Clone, Copy)]
pub struct KindEntry {
    pub constructor: Constructor,
    pub pre_export: PreExportHook,
    pub post_export: PostExportHook,
}

fn new_integration(description: PackageDescription, ctx: &PackageContext) -> Box<dyn Package> {
    Box::new(IntegrationPackage::new(description, ctx))
}

fn new_plugin(description: PackageDescription, ctx: &PackageContext) -> Box<dyn Package> {
    Box::new(PluginPackage::new(description, ctx))
}

#[derive(Clone, Default)]
pub struct Registry {
    kinds: HashMap<String, KindEntry>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the integration and plugin kinds.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            INTEGRATION_KIND,
            KindEntry {
                constructor: new_integration,
                pre_export: integration_pre_export,
                post_export: integration_post_export,
            },
        );
        registry.register(
            PLUGIN_KIND,
            KindEntry {
                constructor: new_plugin,
                pre_export: plugin_pre_export,
                post_export: plugin_post_export,
            },
        );
        registry
    }

    /// Register a kind. An existing entry with the same name is replaced.
    pub fn register(&mut self, kind: impl Into<String>, entry: KindEntry) {
        self.kinds.insert(kind.into(), entry);
    }

    pub fn get(&self, kind: &str) -> Result<&KindEntry> {
        self.kinds
            .get(kind)
            .ok_or_else(|| ConfigurationError::UnknownKind(kind.to_string()).into())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.kinds.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Construct the package variant registered for `description.kind`.
    pub fn construct(
        &self,
        description: PackageDescription,
        ctx: &PackageContext,
    ) -> Result<Box<dyn Package>> {
        let entry = self.get(&description.kind)?;
        Ok((entry.constructor)(description, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use crate::runtime::MockRuntime;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn context() -> PackageContext {
        PackageContext::new(
            PathBuf::from("/storage"),
            Arc::new(MockProvider::new()),
            Arc::new(MockRuntime::new()),
        )
    }

    #[test]
    fn test_defaults_construct_each_kind() {
        let registry = Registry::with_defaults();
        let ctx = context();

        let integration = registry
            .construct(
                PackageDescription::new("foo/demo", "v1.0.0", INTEGRATION_KIND),
                &ctx,
            )
            .unwrap();
        assert_eq!(integration.kind(), INTEGRATION_KIND);
        assert_eq!(
            integration.artifact_path(),
            PathBuf::from("/storage/foo-demo@v1.0.0.tar.gz")
        );

        let plugin = registry
            .construct(
                PackageDescription::new("foo/lovelace-card", "v2.0.0", PLUGIN_KIND),
                &ctx,
            )
            .unwrap();
        assert_eq!(plugin.kind(), PLUGIN_KIND);
        assert_eq!(
            plugin.artifact_path(),
            PathBuf::from("/storage/foo-lovelace-card@v2.0.0.js")
        );
    }

    #[test]
    fn test_unknown_kind() {
        let registry = Registry::with_defaults();
        let result = registry.construct(
            PackageDescription::new("foo/demo", "v1.0.0", "themes"),
            &context(),
        );

        let err = result.err().unwrap();
        assert_eq!(
            err.downcast_ref::<ConfigurationError>(),
            Some(&ConfigurationError::UnknownKind("themes".into()))
        );
    }

    #[test]
    fn test_kinds_sorted() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.kinds(), vec!["integrations", "plugins"]);
        assert!(registry.contains("plugins"));
        assert!(!Registry::new().contains("plugins"));
    }

    #[test]
    fn test_register_replaces_entry() {
        fn custom_notices(_: &dyn Runtime, _: &Path) -> Result<Vec<String>> {
            Ok(vec!["custom".into()])
        }

        let mut registry = Registry::with_defaults();
        let mut entry = *registry.get(PLUGIN_KIND).unwrap();
        entry.post_export = custom_notices;
        registry.register(PLUGIN_KIND, entry);

        let hook = registry.get(PLUGIN_KIND).unwrap().post_export;
        assert_eq!(
            hook(&MockRuntime::new(), Path::new("/export")).unwrap(),
            vec!["custom"]
        );
    }
}
