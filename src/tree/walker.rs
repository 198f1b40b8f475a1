//! Tree Walker
//!
//! Enumerates every file and directory reachable from the repository root and
//! drives the document builder as it goes. Directories fan out as tasks on a
//! `JoinSet`; each task lists one directory, registers its children, fetches
//! the file bodies, and hands its subdirectories back to the coordinator.

use crate::concurrency::CancelToken;
use crate::document::DocumentBuilder;
use crate::error::{SourceError, WalkError};
use crate::source::{EntryKind, RepoRef, RepositorySource};
use crate::tree::identity::{encode, NodeId, RepoPath};
use crate::tree::node::RepoNode;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A file whose body could not be fetched; it is imported with empty text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentWarning {
    pub path: RepoPath,
    pub reason: String,
}

/// Everything a completed walk discovered.
#[derive(Debug, Clone)]
pub struct WalkReport {
    pub nodes: Vec<RepoNode>,
    pub warnings: Vec<ContentWarning>,
}

/// Walker for one import attempt.
///
/// Cheap to clone; clones share the builder, the permit pool and the warning
/// list.
#[derive(Clone)]
pub struct TreeWalker {
    source: Arc<dyn RepositorySource>,
    repo: RepoRef,
    builder: Arc<DocumentBuilder>,
    permits: Arc<Semaphore>,
    cancel: CancelToken,
    halted: Arc<AtomicBool>,
    warnings: Arc<Mutex<Vec<ContentWarning>>>,
}

impl TreeWalker {
    pub fn new(
        source: Arc<dyn RepositorySource>,
        repo: RepoRef,
        builder: Arc<DocumentBuilder>,
        max_concurrency: usize,
        cancel: CancelToken,
    ) -> Self {
        Self {
            source,
            repo,
            builder,
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            cancel,
            halted: Arc::new(AtomicBool::new(false)),
            warnings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Walk the whole repository.
    ///
    /// The first failing directory task halts the walk: no new source calls
    /// are issued, in-flight ones are allowed to finish, and the first error
    /// is returned.
    pub async fn walk(&self) -> Result<WalkReport, WalkError> {
        info!(repo = %self.repo, "Walking repository");

        let mut jobs = JoinSet::new();
        jobs.spawn(self.clone().walk_directory(RepoPath::root()));

        let mut first_error: Option<WalkError> = None;
        while let Some(joined) = jobs.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(WalkError::Task(e.to_string())));
            match result {
                Ok(subdirs) if first_error.is_none() => {
                    for dir in subdirs {
                        jobs.spawn(self.clone().walk_directory(dir));
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if first_error.is_none() {
                        self.halted.store(true, Ordering::SeqCst);
                        first_error = Some(e);
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(WalkError::Cancelled);
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let mut warnings = self.warnings.lock().clone();
        warnings.sort_by(|a, b| a.path.cmp(&b.path));
        let nodes = self.builder.nodes();
        info!(
            repo = %self.repo,
            nodes = nodes.len(),
            warnings = warnings.len(),
            "Walk complete"
        );
        Ok(WalkReport { nodes, warnings })
    }

    /// List one (already registered) directory and import its entries.
    async fn walk_directory(self, dir: RepoPath) -> Result<Vec<RepoPath>, WalkError> {
        let dir_id = encode(&dir);
        let entries = {
            let _permit = self.acquire().await?;
            self.source.list_directory(&self.repo, &dir).await?
        };

        let mut children = Vec::with_capacity(entries.len());
        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        for entry in entries {
            match entry.kind {
                EntryKind::Directory => {
                    children.push(self.builder.register_directory(&entry.path, entry.sha));
                    subdirs.push(entry.path);
                }
                EntryKind::File => {
                    let id = self.builder.register_file(&entry.path, entry.sha);
                    children.push(id.clone());
                    files.push((id, entry.path, entry.size));
                }
                EntryKind::Symlink | EntryKind::Submodule => {
                    debug!(path = %entry.path, kind = ?entry.kind, "Skipping entry");
                }
            }
        }
        self.builder.set_children(&dir_id, children)?;
        debug!(
            path = %dir,
            files = files.len(),
            subdirs = subdirs.len(),
            "Listed directory"
        );

        let fetches = files
            .into_iter()
            .map(|(id, path, size)| self.fetch_file(id, path, size));
        for result in join_all(fetches).await {
            result?;
        }
        Ok(subdirs)
    }

    /// Fetch a file body into its (already created) text container.
    async fn fetch_file(&self, id: NodeId, path: RepoPath, size: u64) -> Result<(), WalkError> {
        let body = {
            let _permit = self.acquire().await?;
            self.source.read_file(&self.repo, &path).await
        };

        match body {
            Ok(bytes) => {
                if bytes.len() as u64 != size {
                    debug!(
                        path = %path,
                        listed = size,
                        read = bytes.len(),
                        "File size changed since listing"
                    );
                }
                let text = String::from_utf8_lossy(&bytes);
                self.builder.populate_file(&id, &text)?;
                Ok(())
            }
            Err(e @ SourceError::RateLimited { .. }) => Err(e.into()),
            Err(e) => {
                warn!(path = %path, error = %e, "Imported file without content");
                self.warnings.lock().push(ContentWarning {
                    path,
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }

    /// Take a source-call permit, refusing once the walk is cancelled or halted.
    async fn acquire(&self) -> Result<SemaphorePermit<'_>, WalkError> {
        self.checkpoint()?;
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| WalkError::Cancelled)?;
        self.checkpoint()?;
        Ok(permit)
    }

    fn checkpoint(&self) -> Result<(), WalkError> {
        if self.cancel.is_cancelled() || self.halted.load(Ordering::SeqCst) {
            return Err(WalkError::Cancelled);
        }
        Ok(())
    }
}
