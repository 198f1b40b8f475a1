//! Error types for the import pipeline.

use crate::types::WorkspaceId;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a repository source (the remote source-control host).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited by source host{}", retry_after_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("transient source failure: {0}")]
    Transient(String),

    #[error("invalid source request: {0}")]
    Invalid(String),
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl SourceError {
    /// Whether restarting the walk may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited { .. } | SourceError::Transient(_)
        )
    }

    /// Minimum wait requested by the source host, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Errors reported by the Shared Document Store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("room not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("storage version conflict in room {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Errors converting between repository paths and node ids.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid repository path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("invalid node id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },
}

/// Errors maintaining the document model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("node {0} has not been registered")]
    UnknownNode(String),

    #[error("node {id} is a {actual}, expected a {expected}")]
    KindMismatch {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("malformed CRDT update: {0}")]
    MalformedUpdate(String),

    #[error("inconsistent file tree: {0}")]
    InconsistentTree(String),
}

/// Errors that abort a tree walk.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalkError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("walk task failed: {0}")]
    Task(String),

    #[error("walk cancelled")]
    Cancelled,
}

/// Which publication step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    /// Reading what the room held before the import
    Baseline,
    Snapshot,
    Content,
}

impl std::fmt::Display for PublishStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishStage::Baseline => f.write_str("room baseline"),
            PublishStage::Snapshot => f.write_str("structural snapshot"),
            PublishStage::Content => f.write_str("content update"),
        }
    }
}

/// Terminal failures of an import.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("source unavailable after {attempts} attempt(s): {source}")]
    SourceUnavailable {
        #[source]
        source: SourceError,
        attempts: usize,
    },

    #[error("failed to publish {stage}: {source}")]
    PublishFailure {
        stage: PublishStage,
        #[source]
        source: StoreError,
        /// True when the snapshot write committed before the content push failed.
        /// The snapshot has been rolled back; the whole import is safe to retry.
        snapshot_committed: bool,
    },

    #[error("an import is already in progress for workspace {0}")]
    ConcurrentImportConflict(WorkspaceId),

    #[error("import cancelled")]
    Cancelled,

    #[error("invalid import request: {0}")]
    InvalidRequest(String),

    #[error("document model error: {0}")]
    Document(#[from] DocumentError),

    #[error("import task failed: {0}")]
    Internal(String),
}

impl From<IdentityError> for ImportError {
    fn from(e: IdentityError) -> Self {
        ImportError::InvalidRequest(e.to_string())
    }
}

/// Errors surfaced by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("output error: {0}")]
    Output(String),
}

/// Errors setting up process-level facilities (logging, clients).
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Config(String),
}
