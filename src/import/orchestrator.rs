//! Import Orchestrator
//!
//! Sequences one import: take the workspace lock, walk the repository (whole
//! walk retried on rate limits and transient failures), then publish. The
//! state of each workspace's latest import is kept for status queries.

use crate::concurrency::{CancelToken, WorkspaceLocks};
use crate::config::ImportConfig;
use crate::document::{BuiltDocument, DocumentBuilder, RepoMeta};
use crate::error::{ImportError, WalkError};
use crate::import::publish::Publisher;
use crate::import::request::ImportRequest;
use crate::source::RepositorySource;
use crate::store::DocumentStore;
use crate::tree::walker::{ContentWarning, TreeWalker, WalkReport};
use crate::types::WorkspaceId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Lifecycle of a workspace import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    NotStarted,
    Walking,
    Publishing,
    Done,
    Failed,
    Cancelled,
}

/// Result of a successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub workspace_id: WorkspaceId,
    pub imported_file_count: usize,
    pub directory_count: usize,
    pub warnings: Vec<ContentWarning>,
}

/// Import result as reported back to the CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: bool,
    pub imported_file_count: usize,
    /// Paths imported without content
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportReport {
    pub fn from_result(result: &Result<ImportOutcome, ImportError>) -> Self {
        match result {
            Ok(outcome) => Self {
                success: true,
                imported_file_count: outcome.imported_file_count,
                warnings: outcome
                    .warnings
                    .iter()
                    .map(|w| w.path.to_string())
                    .collect(),
                error: None,
            },
            Err(e) => Self {
                success: false,
                imported_file_count: 0,
                warnings: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

pub struct Importer {
    source: Arc<dyn RepositorySource>,
    publisher: Publisher,
    config: ImportConfig,
    locks: WorkspaceLocks,
    states: RwLock<HashMap<WorkspaceId, ImportState>>,
}

impl Importer {
    pub fn new(
        source: Arc<dyn RepositorySource>,
        store: Arc<dyn DocumentStore>,
        config: ImportConfig,
    ) -> Self {
        Self {
            source,
            publisher: Publisher::new(store, config.clone()),
            config,
            locks: WorkspaceLocks::new(),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// State of the most recent import of `workspace`.
    pub fn status(&self, workspace: &WorkspaceId) -> ImportState {
        self.states
            .read()
            .get(workspace)
            .copied()
            .unwrap_or(ImportState::NotStarted)
    }

    /// Import a repository into a workspace.
    ///
    /// Fails fast with `ConcurrentImportConflict` while another import of the
    /// same workspace is running. Cancelling `cancel` stops new source calls
    /// and suppresses publication; once publication has begun it runs to
    /// completion so the room is never left half-written.
    pub async fn import(
        &self,
        request: &ImportRequest,
        cancel: &CancelToken,
    ) -> Result<ImportOutcome, ImportError> {
        request.validate()?;
        let workspace = &request.workspace_id;
        let _guard = self.locks.try_acquire(workspace).ok_or_else(|| {
            warn!(workspace = %workspace, "Import already in progress");
            ImportError::ConcurrentImportConflict(workspace.clone())
        })?;

        let started = Instant::now();
        info!(
            workspace = %workspace,
            repo = %request.repo_ref(),
            "Starting import"
        );
        let result = self.run(request, cancel).await;

        let state = match &result {
            Ok(outcome) => {
                info!(
                    workspace = %workspace,
                    files = outcome.imported_file_count,
                    directories = outcome.directory_count,
                    warnings = outcome.warnings.len(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Import complete"
                );
                ImportState::Done
            }
            Err(ImportError::Cancelled) => {
                info!(workspace = %workspace, "Import cancelled");
                ImportState::Cancelled
            }
            Err(e) => {
                error!(workspace = %workspace, error = %e, "Import failed");
                ImportState::Failed
            }
        };
        self.set_state(workspace, state);
        result
    }

    /// Run an import and fold the result into the CRUD-facing report.
    pub async fn import_report(&self, request: &ImportRequest, cancel: &CancelToken) -> ImportReport {
        ImportReport::from_result(&self.import(request, cancel).await)
    }

    async fn run(
        &self,
        request: &ImportRequest,
        cancel: &CancelToken,
    ) -> Result<ImportOutcome, ImportError> {
        let workspace = &request.workspace_id;
        let (built, report) = self.walk_with_retry(request, cancel).await?;

        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        self.set_state(workspace, ImportState::Publishing);
        let repo_meta = RepoMeta {
            owner: request.repo_owner.clone(),
            name: request.repo_name.clone(),
            default_branch: request.branch.clone(),
        };
        self.publisher.publish(workspace, &built, &repo_meta).await?;

        Ok(ImportOutcome {
            workspace_id: workspace.clone(),
            imported_file_count: built.file_count,
            directory_count: built.directory_count,
            warnings: report.warnings,
        })
    }

    /// Walk from scratch until success, a fatal error, or the attempt cap.
    async fn walk_with_retry(
        &self,
        request: &ImportRequest,
        cancel: &CancelToken,
    ) -> Result<(BuiltDocument, WalkReport), ImportError> {
        let workspace = &request.workspace_id;
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }
            self.set_state(workspace, ImportState::Walking);

            let builder = Arc::new(DocumentBuilder::new());
            let walker = TreeWalker::new(
                Arc::clone(&self.source),
                request.repo_ref(),
                Arc::clone(&builder),
                self.config.effective_concurrency(),
                cancel.clone(),
            );

            let source_error = match walker.walk().await {
                Ok(report) => return Ok((builder.finish()?, report)),
                Err(WalkError::Cancelled) => return Err(ImportError::Cancelled),
                Err(WalkError::Document(e)) => return Err(e.into()),
                Err(WalkError::Task(msg)) => return Err(ImportError::Internal(msg)),
                Err(WalkError::Source(e)) => e,
            };

            if !source_error.is_retryable() || attempt >= max_attempts {
                return Err(ImportError::SourceUnavailable {
                    source: source_error,
                    attempts: attempt,
                });
            }

            let delay = self
                .config
                .backoff_delay(attempt)
                .max(source_error.retry_after().unwrap_or_default());
            warn!(
                workspace = %workspace,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %source_error,
                "Walk failed, retrying"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(ImportError::Cancelled),
            }
            attempt += 1;
        }
    }

    fn set_state(&self, workspace: &WorkspaceId, state: ImportState) {
        self.states.write().insert(workspace.clone(), state);
    }
}
