//! Reconciliation engine.
//!
//! [`PackageManager`] owns the installed set, booted from the lock record.
//! It computes diffs against a desired list, applies them on a bounded worker
//! pool with all-or-nothing persistence, reports updates and exports the
//! installed packages into the host's directory layout.

mod apply;
mod diff;
mod lockfile;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ManagerConfig;
use crate::error::ConfigurationError;
use crate::package::{Package, PackageContext, PackageDescription, Registry, Version, find_latest};
use crate::provider::Provider;
use crate::runtime::Runtime;

use apply::{Job, run_jobs};

pub use diff::{Operation, PackageDiff};
pub use lockfile::Lockfile;

/// Informational output of an export, for the caller to report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportReport {
    /// Files the user has to act on, keyed by package kind.
    pub post_export_files: BTreeMap<String, Vec<String>>,
}

pub struct PackageManager {
    config: ManagerConfig,
    registry: Registry,
    context: PackageContext,
    lock: Lockfile,
    /// Live packages in lock order.
    packages: Vec<Box<dyn Package>>,
}

impl PackageManager {
    /// Open the storage root described by `config`.
    ///
    /// An existing lock record is loaded and every row instantiated through
    /// the registry. Without one, the storage root is created empty.
    #[tracing::instrument(skip(provider, runtime, registry))]
    pub fn new(
        config: ManagerConfig,
        provider: Arc<dyn Provider>,
        runtime: Arc<dyn Runtime>,
        registry: Registry,
    ) -> Result<Self> {
        let root = config.storage_root.clone();
        let lock = Lockfile::new(config.lockfile_path(), runtime.clone());
        let context = PackageContext::new(root.clone(), provider, runtime.clone());
        let mut manager = Self {
            config,
            registry,
            context,
            lock,
            packages: Vec::new(),
        };

        if runtime.is_dir(&root) && manager.lock.exists() {
            manager.boot_from_lock()?;
        } else {
            debug!("Creating storage root at {:?}", root);
            runtime
                .create_dir_all(&root)
                .with_context(|| format!("Failed to create storage root at {:?}", root))?;
        }

        Ok(manager)
    }

    fn boot_from_lock(&mut self) -> Result<()> {
        let descriptions = self.lock.load()?;
        debug!(
            "Booting {} packages from {:?}",
            descriptions.len(),
            self.lock.path()
        );
        for description in descriptions {
            let package = self.registry.construct(description, &self.context)?;
            self.packages.push(package);
        }
        Ok(())
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn storage_root(&self) -> &Path {
        &self.config.storage_root
    }

    /// Registered kind names, sorted.
    pub fn supported_kinds(&self) -> Vec<String> {
        self.registry.kinds()
    }

    /// Raw tag listing of a repository.
    pub async fn versions(&self, full_name: &str) -> Result<Vec<String>> {
        self.context
            .provider
            .get_versions(full_name)
            .await
            .with_context(|| format!("Failed to list versions of {}", full_name))
    }

    /// Installed packages in lock order.
    pub fn descriptions(&self) -> Vec<PackageDescription> {
        self.packages.iter().map(|p| p.description()).collect()
    }

    fn find(&self, full_name: &str) -> Option<&dyn Package> {
        self.packages
            .iter()
            .find(|p| p.full_name() == full_name)
            .map(|p| p.as_ref())
    }

    fn position(&self, full_name: &str) -> Option<usize> {
        self.packages
            .iter()
            .position(|p| p.full_name() == full_name)
    }

    /// Changes needed to turn the installed set into `desired`.
    ///
    /// `latest` versions are resolved against the provider first. Packages
    /// installed but not desired are deleted. Order is not meaningful.
    #[tracing::instrument(skip(self, desired))]
    pub async fn diff(
        &self,
        desired: &[PackageDescription],
        stable_only: bool,
    ) -> Result<Vec<PackageDiff>> {
        let mut wanted = HashSet::new();
        let mut diffs = Vec::new();

        for description in desired {
            if !self.registry.contains(&description.kind) {
                let kind = description.kind.clone();
                return Err(ConfigurationError::UnknownKind(kind).into());
            }
            let mut target = description.clone();
            if target.is_latest() {
                let tags = self.versions(&target.full_name).await?;
                target.version = find_latest(&tags, stable_only);
                debug!("Resolved {} to {}", description, target.version);
            }
            wanted.insert(target.full_name.clone());

            match self.find(&target.full_name) {
                None => diffs.push(PackageDiff::add(target)),
                Some(existing) if existing.version() != target.version => {
                    let current = existing.version().to_string();
                    diffs.push(PackageDiff::switch(target, current));
                }
                Some(_) => {}
            }
        }

        for package in &self.packages {
            if !wanted.contains(package.full_name()) {
                diffs.push(PackageDiff::delete(package.description()));
            }
        }

        Ok(diffs)
    }

    /// Carry out `diffs` and persist the result.
    ///
    /// On failure the installed set and the lock record stay exactly as they
    /// were; files already written by finished jobs are left in place.
    #[tracing::instrument(skip(self, diffs), fields(count = diffs.len()))]
    pub async fn apply(&mut self, diffs: &[PackageDiff]) -> Result<()> {
        let mut jobs = Vec::with_capacity(diffs.len());
        for (index, diff) in diffs.iter().enumerate() {
            let description = match diff.operation {
                Operation::Add => diff.description.clone(),
                Operation::Switch => match self.find(diff.full_name()) {
                    Some(existing) => existing.description(),
                    None => {
                        return Err(
                            ConfigurationError::NotInstalled(diff.full_name().to_string()).into(),
                        );
                    }
                },
                Operation::Delete => match self.find(diff.full_name()) {
                    Some(existing) => existing.description(),
                    None => {
                        debug!("Skipping delete of {}, not installed", diff.full_name());
                        continue;
                    }
                },
            };
            let package = self.registry.construct(description, &self.context)?;
            jobs.push(Job {
                index,
                diff: diff.clone(),
                package,
            });
        }

        if jobs.is_empty() {
            return self.lock.dump(&self.descriptions());
        }

        let workers = self.config.workers_for(jobs.len());
        info!("Applying {} changes on {} workers", jobs.len(), workers);
        let done = run_jobs(jobs, workers).await?;

        let next = self.committed_descriptions(&done);
        self.lock.dump(&next)?;

        for job in done {
            let position = self.position(job.diff.full_name());
            match (job.diff.operation, position) {
                (Operation::Add | Operation::Switch, Some(i)) => self.packages[i] = job.package,
                (Operation::Add, None) => self.packages.push(job.package),
                (Operation::Delete, Some(i)) => {
                    self.packages.remove(i);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Installed set after committing `done`, without touching it.
    fn committed_descriptions(&self, done: &[Job]) -> Vec<PackageDescription> {
        let mut next = self.descriptions();
        for job in done {
            let full_name = job.diff.full_name();
            let position = next.iter().position(|d| d.full_name == full_name);
            match (job.diff.operation, position) {
                (Operation::Add | Operation::Switch, Some(i)) => {
                    next[i] = job.package.description();
                }
                (Operation::Add, None) => next.push(job.package.description()),
                (Operation::Delete, Some(i)) => {
                    next.remove(i);
                }
                _ => {}
            }
        }
        next
    }

    /// A `switch` for every installed package with a newer tag.
    ///
    /// Packages whose current or latest version does not parse are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn updates(&self, stable_only: bool) -> Result<Vec<PackageDiff>> {
        let mut updates = Vec::new();
        for package in &self.packages {
            let latest = package.latest_version(stable_only).await?;
            let latest_parsed = latest.parse::<Version>();
            let current_parsed = package.version().parse::<Version>();
            let (Ok(latest_version), Ok(current_version)) = (latest_parsed, current_parsed) else {
                let full_name = package.full_name();
                debug!("Skipping {}, version is not comparable", full_name);
                continue;
            };
            if latest_version > current_version {
                let target = PackageDescription::new(package.full_name(), latest, package.kind());
                updates.push(PackageDiff::switch(target, package.version()));
            }
        }
        Ok(updates)
    }

    /// Recreate `target` and place every installed package in it.
    #[tracing::instrument(skip(self))]
    pub fn export(&self, target: &Path) -> Result<ExportReport> {
        let runtime = self.context.runtime.as_ref();
        if runtime.is_dir(target) {
            runtime
                .remove_dir_all(target)
                .with_context(|| format!("Failed to clear export directory {:?}", target))?;
        }
        runtime
            .create_dir_all(target)
            .with_context(|| format!("Failed to create export directory {:?}", target))?;

        let mut kinds = BTreeSet::new();
        for package in &self.packages {
            let kind = package.kind().to_string();
            let entry = self.registry.get(&kind)?;
            if !kinds.contains(&kind) {
                (entry.pre_export)(runtime, target)
                    .with_context(|| format!("Failed to prepare export of {}", kind))?;
                kinds.insert(kind);
            }
            package.export(target)?;
        }

        let mut report = ExportReport::default();
        for kind in kinds {
            let entry = self.registry.get(&kind)?;
            let files = (entry.post_export)(runtime, target)
                .with_context(|| format!("Failed to finish export of {}", kind))?;
            if !files.is_empty() {
                report.post_export_files.insert(kind, files);
            }
        }
        info!("Exported {} packages to {:?}", self.packages.len(), target);
        Ok(report)
    }

    /// Files in the storage root that are not the artifact of an installed
    /// package, e.g. left behind by an interrupted switch.
    pub fn stale_artifacts(&self) -> Result<Vec<PathBuf>> {
        let runtime = self.context.runtime.as_ref();
        let owned: HashSet<PathBuf> = self.packages.iter().map(|p| p.artifact_path()).collect();
        let lock_path = self.lock.path();

        let mut stale: Vec<PathBuf> = runtime
            .read_dir(self.storage_root())?
            .into_iter()
            .filter(|path| path != lock_path && !runtime.is_dir(path) && !owned.contains(path))
            .collect();
        stale.sort();
        Ok(stale)
    }

    /// Remove what [`stale_artifacts`](Self::stale_artifacts) reports.
    pub fn prune_stale_artifacts(&self) -> Result<Vec<PathBuf>> {
        let stale = self.stale_artifacts()?;
        for path in &stale {
            warn!("Removing stale artifact {:?}", path);
            self.context
                .runtime
                .remove_file(path)
                .with_context(|| format!("Failed to remove {:?}", path))?;
        }
        Ok(stale)
    }
}
