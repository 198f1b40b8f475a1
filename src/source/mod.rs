//! Repository Source
//!
//! Read-only access to a remote source-control host: directory listings and
//! file bodies at a given ref. Implementations never retry; retry policy
//! belongs to the import orchestrator.

pub mod github;
pub mod memory;

pub use github::GitHubSource;
pub use memory::MemorySource;

use crate::error::SourceError;
use crate::tree::identity::RepoPath;
use async_trait::async_trait;
use std::fmt;

/// Repository coordinates on the source host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
    /// Branch or commit name
    pub git_ref: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            git_ref: git_ref.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.git_ref)
    }
}

/// Kind of a listing entry as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Submodule,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub path: RepoPath,
    pub kind: EntryKind,
    /// Blob or tree sha, when the host reports one
    pub sha: Option<String>,
    /// Size in bytes as listed; zero for directories
    pub size: u64,
}

/// Read contract of a source-control host.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// List the entries of the directory at `path`.
    ///
    /// Listing a file yields a single entry describing that file.
    async fn list_directory(
        &self,
        repo: &RepoRef,
        path: &RepoPath,
    ) -> Result<Vec<SourceEntry>, SourceError>;

    /// Read the raw bytes of the file at `path`.
    async fn read_file(&self, repo: &RepoRef, path: &RepoPath) -> Result<Vec<u8>, SourceError>;
}
