//! Concurrency primitives for the import pipeline
//!
//! Provides the per-workspace import lock, which rejects a second import of a
//! workspace instead of queueing it, and the cooperative cancellation token
//! shared by the orchestrator and the walker.

use crate::types::WorkspaceId;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Per-workspace import lock manager
///
/// At most one import per workspace is in flight. Imports of different
/// workspaces never contend.
#[derive(Clone, Default)]
pub struct WorkspaceLocks {
    /// Workspaces with an import in progress
    held: Arc<Mutex<HashSet<WorkspaceId>>>,
}

impl WorkspaceLocks {
    /// Create a new lock manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the import lock for a workspace
    ///
    /// Returns `None` when another import already holds it. The lock is
    /// released when the returned guard is dropped.
    pub fn try_acquire(&self, workspace: &WorkspaceId) -> Option<WorkspaceGuard> {
        let mut held = self.held.lock();
        if !held.insert(workspace.clone()) {
            return None;
        }
        Some(WorkspaceGuard {
            held: Arc::clone(&self.held),
            workspace: workspace.clone(),
        })
    }

    pub fn is_held(&self, workspace: &WorkspaceId) -> bool {
        self.held.lock().contains(workspace)
    }
}

/// Holds a workspace's import lock until dropped.
pub struct WorkspaceGuard {
    held: Arc<Mutex<HashSet<WorkspaceId>>>,
    workspace: WorkspaceId,
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        self.held.lock().remove(&self.workspace);
    }
}

/// Cooperative cancellation signal.
///
/// Clones observe the same signal. Cancelling is permanent.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
