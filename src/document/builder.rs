//! Document Model Builder
//!
//! Accumulates the CRDT document and the node-metadata index while the tree
//! walk is in progress. Shared across walker tasks behind an `Arc`; every
//! method takes a short-lived lock and no transaction outlives a call.

use crate::document::reader::{apply_updates, find_container, read_text, CONTENT_KEY, ROOT_MAP};
use crate::document::snapshot::{FileTreeSnapshot, NodeMetadata};
use crate::error::DocumentError;
use crate::tree::identity::{encode, NodeId, RepoPath};
use crate::tree::language::detect_language;
use crate::tree::node::RepoNode;
use crate::types::NodeKind;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use tracing::debug;
use yrs::{
    Any, Doc, GetString, Map, MapPrelim, MapRef, ReadTxn, Text, TextPrelim, TextRef, Transact,
    TransactionMut, Value, WriteTxn,
};

/// Result of a finished build.
#[derive(Debug, Clone)]
pub struct BuiltDocument {
    /// Snapshot with `is_initialized` still false; the publisher sets it.
    pub snapshot: FileTreeSnapshot,
    /// Text of every file, keyed by node id
    pub contents: BTreeMap<NodeId, String>,
    pub file_count: usize,
    pub directory_count: usize,
}

impl BuiltDocument {
    /// Encode this build as an update to a document that already holds `base`.
    ///
    /// Containers already in `base` are reused and their text replaced, so the
    /// result overwrites the room's content rather than merging with it as a
    /// concurrent insert. Containers of paths missing from the snapshot are
    /// removed. An empty `base` yields the full document state.
    pub fn encode_update<B: AsRef<[u8]>>(&self, base: &[B]) -> Result<Vec<u8>, DocumentError> {
        let doc = Doc::new();
        let state = {
            let mut txn = doc.transact_mut();
            apply_updates(&mut txn, base)?;
            let state = txn.state_vector();
            for meta in self.snapshot.files.values() {
                let container = ensure_container(&mut txn, &meta.path);
                match meta.kind {
                    NodeKind::Directory => {
                        if container.get(&txn, CONTENT_KEY).is_some() {
                            container.remove(&mut txn, CONTENT_KEY);
                        }
                    }
                    NodeKind::File => {
                        let content = self.contents.get(&meta.id).map(String::as_str);
                        write_text(&mut txn, &container, content.unwrap_or(""));
                    }
                }
            }
            let root = txn.get_or_insert_map(ROOT_MAP);
            prune_stale(&mut txn, &root, &self.snapshot.files);
            state
        };
        let txn = doc.transact();
        Ok(txn.encode_state_as_update_v1(&state))
    }
}

pub struct DocumentBuilder {
    doc: Mutex<Doc>,
    index: RwLock<BTreeMap<NodeId, NodeMetadata>>,
    imported_at: i64,
}

impl DocumentBuilder {
    /// Create a builder holding only the root directory.
    pub fn new() -> Self {
        Self::with_timestamp(chrono::Utc::now().timestamp_millis())
    }

    /// Create a builder that stamps nodes with `imported_at` (epoch millis).
    pub fn with_timestamp(imported_at: i64) -> Self {
        let builder = Self {
            doc: Mutex::new(Doc::new()),
            index: RwLock::new(BTreeMap::new()),
            imported_at,
        };
        builder.register_directory(&RepoPath::root(), None);
        builder
    }

    /// Register a directory container. Idempotent per path.
    pub fn register_directory(&self, path: &RepoPath, sha: Option<String>) -> NodeId {
        let id = encode(path);
        {
            let doc = self.doc.lock();
            let mut txn = doc.transact_mut();
            ensure_container(&mut txn, path);
        }
        self.index.write().entry(id.clone()).or_insert_with(|| NodeMetadata {
            id: id.clone(),
            name: path.name().to_string(),
            path: path.clone(),
            kind: NodeKind::Directory,
            children: Some(Vec::new()),
            language: None,
            sha,
            last_modified: Some(self.imported_at),
        });
        debug!(path = %path, id = %id, "Registered directory");
        id
    }

    /// Register a file container with empty text. Idempotent per path.
    pub fn register_file(&self, path: &RepoPath, sha: Option<String>) -> NodeId {
        let id = encode(path);
        {
            let doc = self.doc.lock();
            let mut txn = doc.transact_mut();
            let container = ensure_container(&mut txn, path);
            if !matches!(container.get(&txn, CONTENT_KEY), Some(Value::YText(_))) {
                container.insert(&mut txn, CONTENT_KEY, TextPrelim::new(""));
            }
        }
        self.index.write().entry(id.clone()).or_insert_with(|| NodeMetadata {
            id: id.clone(),
            name: path.name().to_string(),
            path: path.clone(),
            kind: NodeKind::File,
            children: None,
            language: Some(detect_language(path).to_string()),
            sha,
            last_modified: Some(self.imported_at),
        });
        debug!(path = %path, id = %id, "Registered file");
        id
    }

    /// Attach the listing of a directory. Every id must already be registered.
    pub fn set_children(&self, dir: &NodeId, children: Vec<NodeId>) -> Result<(), DocumentError> {
        let mut index = self.index.write();
        if let Some(missing) = children.iter().find(|c| !index.contains_key(*c)) {
            return Err(DocumentError::UnknownNode(missing.to_string()));
        }
        let meta = index
            .get_mut(dir)
            .ok_or_else(|| DocumentError::UnknownNode(dir.to_string()))?;
        expect_kind(meta, NodeKind::Directory)?;
        meta.children = Some(children);
        Ok(())
    }

    /// Replace the text of a registered file with `content`.
    pub fn populate_file(&self, id: &NodeId, content: &str) -> Result<(), DocumentError> {
        let path = {
            let index = self.index.read();
            let meta = index
                .get(id)
                .ok_or_else(|| DocumentError::UnknownNode(id.to_string()))?;
            expect_kind(meta, NodeKind::File)?;
            meta.path.clone()
        };

        let doc = self.doc.lock();
        let mut txn = doc.transact_mut();
        let text = find_container(&txn, &path)
            .and_then(|c| match c.get(&txn, CONTENT_KEY) {
                Some(Value::YText(text)) => Some(text),
                _ => None,
            })
            .ok_or_else(|| DocumentError::UnknownNode(id.to_string()))?;
        replace_text(&mut txn, &text, content);
        Ok(())
    }

    pub fn text_content(&self, id: &NodeId) -> Result<Option<String>, DocumentError> {
        let doc = self.doc.lock();
        let txn = doc.transact();
        read_text(&txn, id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Every registered node, ordered by id.
    pub fn nodes(&self) -> Vec<RepoNode> {
        self.index.read().values().map(NodeMetadata::to_node).collect()
    }

    /// Produce the snapshot and file texts, checking tree completeness.
    pub fn finish(&self) -> Result<BuiltDocument, DocumentError> {
        let snapshot = FileTreeSnapshot {
            files: self.index.read().clone(),
            active_file_id: String::new(),
            root_dir_id: NodeId::root(),
            is_initialized: false,
        };
        snapshot.validate()?;

        let mut contents = BTreeMap::new();
        {
            let doc = self.doc.lock();
            let txn = doc.transact();
            for meta in snapshot.files.values().filter(|m| m.kind == NodeKind::File) {
                let text = read_text(&txn, &meta.id)?.unwrap_or_default();
                contents.insert(meta.id.clone(), text);
            }
        }

        Ok(BuiltDocument {
            file_count: snapshot.file_count(),
            directory_count: snapshot.directory_count(),
            snapshot,
            contents,
        })
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_kind(meta: &NodeMetadata, expected: NodeKind) -> Result<(), DocumentError> {
    if meta.kind == expected {
        Ok(())
    } else {
        Err(DocumentError::KindMismatch {
            id: meta.id.to_string(),
            expected: expected.as_str(),
            actual: meta.kind.as_str(),
        })
    }
}

fn replace_text(txn: &mut TransactionMut, text: &TextRef, content: &str) {
    if text.get_string(&*txn) == content {
        return;
    }
    let existing = text.len(&*txn);
    if existing > 0 {
        text.remove_range(txn, 0, existing);
    }
    text.insert(txn, 0, content);
}

/// Set the text of a file container, creating the text if it has none.
fn write_text(txn: &mut TransactionMut, container: &MapRef, content: &str) {
    match container.get(&*txn, CONTENT_KEY) {
        Some(Value::YText(text)) => replace_text(txn, &text, content),
        _ => {
            container.insert(txn, CONTENT_KEY, TextPrelim::new(content));
        }
    }
}

/// Remove every container under `map` whose id is not in `keep`.
fn prune_stale(txn: &mut TransactionMut, map: &MapRef, keep: &BTreeMap<NodeId, NodeMetadata>) {
    let entries: Vec<(String, Value)> = map
        .iter(&*txn)
        .map(|(key, value)| (key.to_string(), value))
        .collect();
    for (key, value) in entries {
        if key == CONTENT_KEY {
            continue;
        }
        let known = NodeId::parse(key.as_str())
            .map(|id| keep.contains_key(&id))
            .unwrap_or(false);
        if !known {
            debug!(key = %key, "Removing stale container");
            map.remove(txn, &key);
        } else if let Value::YMap(child) = value {
            prune_stale(txn, &child, keep);
        }
    }
}

/// Container map for `path`, creating it and any missing ancestors.
fn ensure_container(txn: &mut TransactionMut, path: &RepoPath) -> MapRef {
    let mut current = txn.get_or_insert_map(ROOT_MAP);
    if path.is_root() {
        return current;
    }
    for step in path.ancestors().iter().chain(std::iter::once(path)) {
        let key = encode(step);
        current = match current.get(txn, key.as_str()) {
            Some(Value::YMap(map)) => map,
            _ => current.insert(txn, key.as_str(), MapPrelim::<Any>::new()),
        };
    }
    current
}
