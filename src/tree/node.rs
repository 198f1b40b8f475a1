//! Repository node types produced by the tree walker

use crate::tree::identity::{encode, NodeId, RepoPath};
use crate::types::NodeKind;

/// A file or directory discovered while walking a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoNode {
    pub id: NodeId,
    pub name: String,
    pub path: RepoPath,
    pub kind: NodeKind,
    /// Child ids for directories (possibly empty); `None` for files.
    pub children: Option<Vec<NodeId>>,
}

impl RepoNode {
    pub fn directory(path: RepoPath, children: Vec<NodeId>) -> Self {
        Self {
            id: encode(&path),
            name: path.name().to_string(),
            path,
            kind: NodeKind::Directory,
            children: Some(children),
        }
    }

    pub fn file(path: RepoPath) -> Self {
        Self {
            id: encode(&path),
            name: path.name().to_string(),
            path,
            kind: NodeKind::File,
            children: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}
