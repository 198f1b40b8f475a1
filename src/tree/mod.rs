//! Repository tree: identity, node types and the walker.

pub mod identity;
pub mod language;
pub mod node;
pub mod walker;

pub use identity::{decode, encode, NodeId, RepoPath, ROOT_NODE_ID};
pub use node::RepoNode;
pub use walker::{ContentWarning, TreeWalker, WalkReport};
