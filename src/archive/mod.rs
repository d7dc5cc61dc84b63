//! Streaming extraction of gzip-compressed tarballs.
//!
//! Forge tarballs wrap the repository in a generated top-level directory
//! (`owner-repo-<sha>/`). Only the subtree under a marker folder is wanted,
//! so entries are filtered and re-rooted at the marker while streaming.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use log::debug;
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};

use crate::runtime::Runtime;

/// Used when an entry header carries no readable mode.
const DEFAULT_DIR_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Extract every entry whose path contains `/<marker>/` into `dest`,
/// keeping the path from `<marker>/` onwards. Everything else is skipped.
///
/// Returns the number of regular files written.
#[tracing::instrument(skip(runtime, archive_path, dest))]
pub fn extract_marked_subtree(
    runtime: &dyn Runtime,
    archive_path: &Path,
    marker: &str,
    dest: &Path,
) -> Result<usize> {
    debug!("Extracting {:?} ({}) into {:?}", archive_path, marker, dest);
    let file = runtime
        .open(archive_path)
        .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let needle = format!("/{}/", marker);
    let mut written = 0;

    for entry in archive.entries().context("Failed to read tar entries")? {
        let mut entry = entry.context("Failed to read tar entry")?;
        let name = entry
            .path()
            .context("Failed to read tar entry path")?
            .to_string_lossy()
            .replace('\\', "/");

        let Some(relative) = marked_relative_path(&name, &needle) else {
            continue;
        };
        let target = dest.join(&relative);
        let mode = entry.header().mode().ok();

        match entry.header().entry_type() {
            EntryType::Directory => {
                let mode = mode.unwrap_or(DEFAULT_DIR_MODE);
                runtime.create_dir_all(&target)?;
                runtime.set_permissions(&target, mode)?;
            }
            EntryType::Regular | EntryType::Continuous => {
                let mode = mode.unwrap_or(DEFAULT_FILE_MODE);
                if let Some(parent) = target.parent() {
                    runtime.create_dir_all(parent)?;
                }
                let mut out = runtime.create_file(&target)?;
                io::copy(&mut entry, &mut out)
                    .with_context(|| format!("Failed to write {:?}", target))?;
                drop(out);
                runtime.set_permissions(&target, mode)?;
                written += 1;
            }
            other => {
                debug!("Skipping {:?} entry {}", other, name);
            }
        }
    }

    Ok(written)
}

/// `repo-abc/custom_components/demo/x.py` -> `custom_components/demo/x.py`.
/// Paths escaping the destination are rejected.
fn marked_relative_path(name: &str, needle: &str) -> Option<PathBuf> {
    let idx = name.find(needle)?;
    let relative = PathBuf::from(&name[idx + 1..]);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes { None } else { Some(relative) }
}
