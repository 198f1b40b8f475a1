//! Structural snapshot types
//!
//! These are the records written to the Shared Document Store's structured
//! storage. Field names are camelCase because the editor reads them directly.

use crate::error::DocumentError;
use crate::tree::identity::{NodeId, RepoPath};
use crate::tree::node::RepoNode;
use crate::types::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Metadata for one node of the file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    pub id: NodeId,
    pub name: String,
    pub path: RepoPath,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
}

impl NodeMetadata {
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn to_node(&self) -> RepoNode {
        RepoNode {
            id: self.id.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            kind: self.kind,
            children: self.children.clone(),
        }
    }
}

/// The structural snapshot of an imported repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTreeSnapshot {
    pub files: BTreeMap<NodeId, NodeMetadata>,
    #[serde(default)]
    pub active_file_id: String,
    pub root_dir_id: NodeId,
    #[serde(default)]
    pub is_initialized: bool,
}

impl FileTreeSnapshot {
    pub fn root(&self) -> Option<&NodeMetadata> {
        self.files.get(&self.root_dir_id)
    }

    pub fn file_count(&self) -> usize {
        self.files.values().filter(|m| !m.is_directory()).count()
    }

    /// Directories other than the root.
    pub fn directory_count(&self) -> usize {
        self.files
            .values()
            .filter(|m| m.is_directory() && m.id != self.root_dir_id)
            .count()
    }

    /// Check the structural invariants of the tree.
    ///
    /// The root exists with an empty path, every child reference resolves to a
    /// key of `files`, and every other node has exactly one parent.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let inconsistent = |msg: String| Err(DocumentError::InconsistentTree(msg));

        let root = match self.root() {
            Some(root) => root,
            None => return inconsistent(format!("root {} missing", self.root_dir_id)),
        };
        if !root.path.is_root() || !root.is_directory() {
            return inconsistent("root must be a directory with an empty path".to_string());
        }

        let mut parents: HashMap<&NodeId, usize> = HashMap::new();
        for meta in self.files.values() {
            match (&meta.kind, &meta.children) {
                (NodeKind::File, Some(_)) => {
                    return inconsistent(format!("file {} has children", meta.path))
                }
                (NodeKind::Directory, None) => {
                    return inconsistent(format!("directory {} has no children list", meta.path))
                }
                _ => {}
            }
            for child in meta.children.iter().flatten() {
                if !self.files.contains_key(child) {
                    return inconsistent(format!("{} references unknown child {}", meta.path, child));
                }
                *parents.entry(child).or_insert(0) += 1;
            }
        }

        for id in self.files.keys() {
            let count = parents.get(id).copied().unwrap_or(0);
            if id == &self.root_dir_id {
                if count != 0 {
                    return inconsistent("root listed as a child".to_string());
                }
            } else if count != 1 {
                return inconsistent(format!("{} has {} parents", id, count));
            }
        }
        Ok(())
    }
}

/// Repository coordinates recorded next to the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoMeta {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
}

/// Structured storage of one room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStorage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_tree: Option<FileTreeSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_meta: Option<RepoMeta>,
}

impl RoomStorage {
    pub fn is_initialized(&self) -> bool {
        self.file_tree.as_ref().map(|t| t.is_initialized).unwrap_or(false)
    }
}
