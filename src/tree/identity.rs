//! Node identity: a reversible mapping between repository paths and node ids.
//!
//! Every node id is derived from its path alone, so re-importing an unchanged
//! path yields the same id and concurrent imports converge on the same keys.

use crate::error::IdentityError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of the repository root.
///
/// `"root"` base64-decodes to `[0xae, 0x8a, 0x2d]`, which is not UTF-8, so no
/// valid path encodes to it.
pub const ROOT_NODE_ID: &str = "root";

/// A validated path relative to the repository root.
///
/// Segments are separated by `/`; the empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    pub fn root() -> Self {
        RepoPath(String::new())
    }

    pub fn parse(path: impl Into<String>) -> Result<Self, IdentityError> {
        let path = path.into();
        if path.is_empty() {
            return Ok(RepoPath(path));
        }
        let invalid = |reason| IdentityError::InvalidPath {
            path: path.clone(),
            reason,
        };
        if path.starts_with('/') {
            return Err(invalid("must be relative"));
        }
        if path.ends_with('/') {
            return Err(invalid("trailing separator"));
        }
        for segment in path.split('/') {
            match segment {
                "" => return Err(invalid("empty segment")),
                "." | ".." => return Err(invalid("dot segment")),
                _ => {}
            }
        }
        Ok(RepoPath(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, or `"/"` for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "/";
        }
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn parent(&self) -> Option<RepoPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(RepoPath(self.0[..idx].to_string())),
            None => Some(RepoPath::root()),
        }
    }

    pub fn join(&self, name: &str) -> Result<RepoPath, IdentityError> {
        if self.is_root() {
            RepoPath::parse(name)
        } else {
            RepoPath::parse(format!("{}/{}", self.0, name))
        }
    }

    /// Proper ancestors from the topmost directory down, excluding the root.
    ///
    /// `a/b/c` yields `a`, `a/b`.
    pub fn ancestors(&self) -> Vec<RepoPath> {
        let mut out = Vec::new();
        let mut end = 0;
        while let Some(offset) = self.0[end..].find('/') {
            end += offset;
            out.push(RepoPath(self.0[..end].to_string()));
            end += 1;
        }
        out
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RepoPath {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RepoPath::parse(value)
    }
}

impl From<RepoPath> for String {
    fn from(value: RepoPath) -> Self {
        value.0
    }
}

/// Deterministic node identifier derived from a repository path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn root() -> Self {
        NodeId(ROOT_NODE_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_NODE_ID
    }

    /// Wraps a raw id string after checking that it decodes to a valid path.
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let id = NodeId(raw.into());
        decode(&id)?;
        Ok(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the node id for a path.
pub fn encode(path: &RepoPath) -> NodeId {
    if path.is_root() {
        return NodeId::root();
    }
    NodeId(STANDARD.encode(path.as_str().as_bytes()))
}

/// Recover the path a node id was derived from.
pub fn decode(id: &NodeId) -> Result<RepoPath, IdentityError> {
    if id.is_root() {
        return Ok(RepoPath::root());
    }
    let invalid = |reason: String| IdentityError::InvalidId {
        id: id.0.clone(),
        reason,
    };
    if id.0.is_empty() {
        return Err(invalid("empty id".to_string()));
    }
    let bytes = STANDARD
        .decode(id.0.as_bytes())
        .map_err(|e| invalid(format!("not base64: {}", e)))?;
    let path = String::from_utf8(bytes).map_err(|_| invalid("not UTF-8".to_string()))?;
    RepoPath::parse(path).map_err(|e| invalid(e.to_string()))
}
