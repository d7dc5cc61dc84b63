use anyhow::Result;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use hapm::{
    ApplyError, ManagerConfig, Operation, PackageDescription, PackageDiff, PackageManager,
    Provider, RealRuntime, Registry, RetrievalError,
};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tar::Builder;
use tempfile::tempdir;

/// Forge double serving tags, tree files and tarballs from memory.
#[derive(Default)]
struct MemoryForge {
    tags: HashMap<String, Vec<String>>,
    tree: HashMap<String, Vec<u8>>,
    releases: HashMap<String, Vec<u8>>,
    tarballs: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryForge {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: String) {
        self.requests.lock().unwrap().push(request);
    }
}

fn lookup(map: &HashMap<String, Vec<u8>>, key: String) -> Result<Vec<u8>> {
    map.get(&key)
        .cloned()
        .ok_or_else(|| RetrievalError::NotFound(key).into())
}

#[async_trait]
impl Provider for MemoryForge {
    async fn get_versions(&self, full_name: &str) -> Result<Vec<String>> {
        self.record(format!("tags {}", full_name));
        self.tags
            .get(full_name)
            .cloned()
            .ok_or_else(|| RetrievalError::NotFound(full_name.to_string()).into())
    }

    async fn get_tree_file(&self, full_name: &str, git_ref: &str, path: &str) -> Result<Vec<u8>> {
        self.record(format!("tree {}@{}:{}", full_name, git_ref, path));
        lookup(&self.tree, format!("{}@{}:{}", full_name, git_ref, path))
    }

    async fn get_release_file(
        &self,
        full_name: &str,
        git_ref: &str,
        asset_name: &str,
    ) -> Result<Vec<u8>> {
        self.record(format!("release {}@{}:{}", full_name, git_ref, asset_name));
        let key = format!("{}@{}:{}", full_name, git_ref, asset_name);
        lookup(&self.releases, key)
    }

    async fn get_tarball(&self, full_name: &str, git_ref: &str) -> Result<Vec<u8>> {
        self.record(format!("tarball {}@{}", full_name, git_ref));
        lookup(&self.tarballs, format!("{}@{}", full_name, git_ref))
    }
}

fn create_tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut tar_builder = Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_path(name).unwrap();
        header.set_mode(0o644);
        header.set_cksum();
        tar_builder.append(&header, content.as_bytes()).unwrap();
    }
    let tar = tar_builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

fn forge() -> MemoryForge {
    let mut forge = MemoryForge::default();
    forge.tags.insert(
        "mishamyrt/dreame-vacuum".into(),
        vec!["v1.0.0".into(), "v1.0.1".into(), "v1.1.0-rc.1".into()],
    );
    forge.tarballs.insert(
        "mishamyrt/dreame-vacuum@v1.0.0".into(),
        create_tar_gz(&[
            ("abc/custom_components/dreame/manifest.json", "v1.0.0"),
            ("abc/custom_components/dreame/sensor.py", "pass"),
            ("abc/hacs.json", "{}"),
        ]),
    );
    forge.tarballs.insert(
        "mishamyrt/dreame-vacuum@v1.0.1".into(),
        create_tar_gz(&[("def/custom_components/dreame/manifest.json", "v1.0.1")]),
    );
    forge.tags.insert(
        "thomasloven/lovelace-card-mod".into(),
        vec!["3.4.0".into(), "3.4.1".into()],
    );
    forge.releases.insert(
        "thomasloven/lovelace-card-mod@3.4.1:card-mod.js".into(),
        b"release build".to_vec(),
    );
    forge.tree.insert(
        "thomasloven/lovelace-card-mod@3.4.1:dist/card-mod-bundle.js".into(),
        b"bundle build".to_vec(),
    );
    forge
}

fn vacuum(version: &str) -> PackageDescription {
    PackageDescription::new("mishamyrt/dreame-vacuum", version, "integrations")
}

fn card_mod(version: &str) -> PackageDescription {
    PackageDescription::new("thomasloven/lovelace-card-mod", version, "plugins")
}

fn open(storage: &Path, forge: Arc<MemoryForge>) -> PackageManager {
    PackageManager::new(
        ManagerConfig::new(storage),
        forge,
        Arc::new(RealRuntime),
        Registry::with_defaults(),
    )
    .unwrap()
}

#[test_log::test(tokio::test)]
async fn test_sync_update_and_export() {
    let dir = tempdir().unwrap();
    let storage = dir.path().join(".hapm");
    let forge = Arc::new(forge());
    let mut manager = open(&storage, forge.clone());

    let desired = vec![vacuum("v1.0.0"), card_mod("latest")];
    let diffs = manager.diff(&desired, true).await.unwrap();
    assert_eq!(diffs.len(), 2);
    assert!(diffs.iter().all(|d| d.operation == Operation::Add));
    assert!(diffs.contains(&PackageDiff::add(card_mod("3.4.1"))));

    manager.apply(&diffs).await.unwrap();
    let first_release = storage.join("mishamyrt-dreame-vacuum@v1.0.0.tar.gz");
    assert!(first_release.exists());
    assert_eq!(
        fs::read(storage.join("thomasloven-lovelace-card-mod@3.4.1.js")).unwrap(),
        b"release build"
    );
    // The regular script is preferred over the bundle that sits in dist/.
    let bundle = "tree thomasloven/lovelace-card-mod@3.4.1:dist/card-mod-bundle.js".to_string();
    assert!(!forge.requests().contains(&bundle));

    let updates = manager.updates(true).await.unwrap();
    let expected = vec![PackageDiff::switch(vacuum("v1.0.1"), "v1.0.0")];
    assert_eq!(updates, expected);
    manager.apply(&updates).await.unwrap();
    assert!(!first_release.exists());

    let export = dir.path().join("config");
    let report = manager.export(&export).unwrap();
    assert_eq!(
        fs::read_to_string(export.join("custom_components/dreame/manifest.json")).unwrap(),
        "v1.0.1"
    );
    assert!(!export.join("hacs.json").exists());
    assert_eq!(
        fs::read(export.join("www/custom_lovelace/lovelace-card-mod.js")).unwrap(),
        b"release build"
    );
    assert_eq!(
        report.post_export_files.get("plugins"),
        Some(&vec!["lovelace-card-mod.js".to_string()])
    );

    let reopened = open(&storage, forge);
    assert_eq!(
        reopened.descriptions(),
        vec![vacuum("v1.0.1"), card_mod("3.4.1")]
    );
}

#[test_log::test(tokio::test)]
async fn test_failed_apply_keeps_lock() {
    let dir = tempdir().unwrap();
    let storage = dir.path().join(".hapm");
    let forge = Arc::new(forge());
    let mut manager = open(&storage, forge.clone());
    manager
        .apply(&[PackageDiff::add(vacuum("v1.0.0"))])
        .await
        .unwrap();
    let lock_before = fs::read(storage.join("_lock.json")).unwrap();

    let diffs = manager
        .diff(&[vacuum("v1.0.0"), card_mod("9.9.9")], true)
        .await
        .unwrap();
    let err = manager.apply(&diffs).await.unwrap_err();

    let apply = err.downcast_ref::<ApplyError>().unwrap();
    assert_eq!(apply.operation, "add");
    assert_eq!(apply.full_name, "thomasloven/lovelace-card-mod");
    assert_eq!(fs::read(storage.join("_lock.json")).unwrap(), lock_before);
    assert_eq!(manager.descriptions(), vec![vacuum("v1.0.0")]);
}

#[test_log::test(tokio::test)]
async fn test_remove_everything() {
    let dir = tempdir().unwrap();
    let storage = dir.path().join(".hapm");
    let mut manager = open(&storage, Arc::new(forge()));
    manager
        .apply(&[
            PackageDiff::add(vacuum("v1.0.0")),
            PackageDiff::add(card_mod("3.4.1")),
        ])
        .await
        .unwrap();

    let diffs = manager.diff(&[], true).await.unwrap();
    assert_eq!(diffs.len(), 2);
    assert!(diffs.iter().all(|d| d.operation == Operation::Delete));

    manager.apply(&diffs).await.unwrap();
    assert!(manager.descriptions().is_empty());
    assert!(manager.stale_artifacts().unwrap().is_empty());
    assert_eq!(
        fs::read_to_string(storage.join("_lock.json")).unwrap(),
        "[]"
    );
}
