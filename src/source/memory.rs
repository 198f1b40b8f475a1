//! In-memory implementation of `RepositorySource`, intended primarily for testing.

use super::{EntryKind, RepoRef, RepositorySource, SourceEntry};
use crate::error::SourceError;
use crate::tree::identity::RepoPath;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Operation recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceOp {
    List,
    Read,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    error: SourceError,
    /// Remaining failures; `None` fails forever
    remaining: Option<usize>,
}

/// A repository held in memory: one branch, files by path, implicit directories.
pub struct MemorySource {
    branch: String,
    files: RwLock<BTreeMap<RepoPath, Vec<u8>>>,
    directories: RwLock<BTreeSet<RepoPath>>,
    failures: Mutex<HashMap<(SourceOp, RepoPath), InjectedFailure>>,
    calls: Mutex<Vec<(SourceOp, RepoPath)>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemorySource {
    /// Create an empty repository whose only branch is `branch`.
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            files: RwLock::new(BTreeMap::new()),
            directories: RwLock::new(BTreeSet::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Simulated latency applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add a file; its ancestor directories come into existence implicitly.
    pub fn add_file(&self, path: &str, content: impl Into<Vec<u8>>) -> &Self {
        let path = parse(path);
        self.register_ancestors(&path);
        self.files.write().insert(path, content.into());
        self
    }

    /// Add a directory, which stays listed even when empty.
    pub fn add_directory(&self, path: &str) -> &Self {
        let path = parse(path);
        self.register_ancestors(&path);
        self.directories.write().insert(path);
        self
    }

    pub fn remove_file(&self, path: &str) -> &Self {
        self.files.write().remove(&parse(path));
        self
    }

    /// Fail every `op` on `path` with `error`.
    pub fn fail_always(&self, op: SourceOp, path: &str, error: SourceError) -> &Self {
        self.failures.lock().insert(
            (op, parse(path)),
            InjectedFailure {
                error,
                remaining: None,
            },
        );
        self
    }

    /// Fail the next `times` calls of `op` on `path` with `error`.
    pub fn fail_times(&self, op: SourceOp, path: &str, times: usize, error: SourceError) -> &Self {
        self.failures.lock().insert(
            (op, parse(path)),
            InjectedFailure {
                error,
                remaining: Some(times),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<(SourceOp, RepoPath)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, op: SourceOp) -> usize {
        self.calls.lock().iter().filter(|(o, _)| *o == op).count()
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn register_ancestors(&self, path: &RepoPath) {
        let mut dirs = self.directories.write();
        for ancestor in path.ancestors() {
            dirs.insert(ancestor);
        }
    }

    fn is_directory(&self, path: &RepoPath) -> bool {
        path.is_root() || self.directories.read().contains(path)
    }

    async fn begin(&self, op: SourceOp, repo: &RepoRef, path: &RepoPath) -> Result<(), SourceError> {
        self.calls.lock().push((op, path.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if repo.git_ref != self.branch {
            return Err(SourceError::NotFound(format!("ref {}", repo.git_ref)));
        }

        let mut failures = self.failures.lock();
        let key = (op, path.clone());
        if let Some(failure) = failures.get_mut(&key) {
            let error = failure.error.clone();
            match failure.remaining {
                None => return Err(error),
                Some(0) => {
                    failures.remove(&key);
                }
                Some(n) => {
                    failure.remaining = Some(n - 1);
                    if n == 1 {
                        failures.remove(&key);
                    }
                    return Err(error);
                }
            }
        }
        Ok(())
    }
}

fn parse(path: &str) -> RepoPath {
    RepoPath::parse(path).unwrap_or_else(|e| panic!("invalid test path {:?}: {}", path, e))
}

#[async_trait]
impl RepositorySource for MemorySource {
    async fn list_directory(
        &self,
        repo: &RepoRef,
        path: &RepoPath,
    ) -> Result<Vec<SourceEntry>, SourceError> {
        self.begin(SourceOp::List, repo, path).await?;

        if let Some(content) = self.files.read().get(path) {
            return Ok(vec![SourceEntry {
                name: path.name().to_string(),
                path: path.clone(),
                kind: EntryKind::File,
                sha: None,
                size: content.len() as u64,
            }]);
        }
        if !self.is_directory(path) {
            return Err(SourceError::NotFound(path.to_string()));
        }

        let is_child = |candidate: &RepoPath| candidate.parent().as_ref() == Some(path);
        let mut entries: Vec<SourceEntry> = self
            .directories
            .read()
            .iter()
            .filter(|d| is_child(d))
            .map(|d| SourceEntry {
                name: d.name().to_string(),
                path: d.clone(),
                kind: EntryKind::Directory,
                sha: None,
                size: 0,
            })
            .collect();
        entries.extend(
            self.files
                .read()
                .iter()
                .filter(|(f, _)| is_child(f))
                .map(|(f, content)| SourceEntry {
                    name: f.name().to_string(),
                    path: f.clone(),
                    kind: EntryKind::File,
                    sha: None,
                    size: content.len() as u64,
                }),
        );
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_file(&self, repo: &RepoRef, path: &RepoPath) -> Result<Vec<u8>, SourceError> {
        self.begin(SourceOp::Read, repo, path).await?;
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(path.to_string()))
    }
}
