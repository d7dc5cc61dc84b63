//! Provider abstraction for the git forge hosting packages.
//!
//! The manager and the package variants only need four read operations from
//! the forge. The concrete HTTP transport lives outside this crate and plugs
//! in by implementing [`Provider`].

use anyhow::Result;
use async_trait::async_trait;

/// Read access to repositories on a git forge.
///
/// Implementations should report missing repositories, refs, files or assets
/// as [`RetrievalError::NotFound`](crate::error::RetrievalError::NotFound)
/// and must not retry on behalf of the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// List tag names of a repository (`owner/repo`).
    async fn get_versions(&self, full_name: &str) -> Result<Vec<String>>;

    /// Fetch a file from the repository tree at `git_ref`.
    async fn get_tree_file(&self, full_name: &str, git_ref: &str, path: &str) -> Result<Vec<u8>>;

    /// Fetch a release asset by file name from the release tagged `git_ref`.
    async fn get_release_file(
        &self,
        full_name: &str,
        git_ref: &str,
        asset_name: &str,
    ) -> Result<Vec<u8>>;

    /// Fetch the gzip-compressed source tarball of `git_ref`.
    async fn get_tarball(&self, full_name: &str, git_ref: &str) -> Result<Vec<u8>>;
}
